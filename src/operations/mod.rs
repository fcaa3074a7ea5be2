//! Dashboard API operations grouped by resource
//!
//! Mutating RBD calls go through the [`OperationExecutor`](crate::engine::OperationExecutor);
//! reads and CephFS calls are plain request/response mappings.

pub mod block;
pub mod fs;
pub mod namespace;
pub mod snapshot;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use block::BlockOperations;
pub use fs::FsOperations;
pub use namespace::NamespaceOperations;
pub use snapshot::SnapshotOperations;
pub use task::TaskOperations;

use crate::error::Result;
use crate::error::handlers::{HttpErrorHandler, ValidationErrorHandler};
use crate::transport::{ApiRequest, Transport};
use serde::de::DeserializeOwned;

/// Join pool, optional namespace and name into `pool[/namespace]/name`
pub fn path_join(pool: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) => format!("{}/{}/{}", pool, ns, name),
        None => format!("{}/{}", pool, name),
    }
}

/// Image spec for an RBD image; pool and image name are required
pub fn image_spec(pool: &str, namespace: Option<&str>, image: &str) -> Result<String> {
    ValidationErrorHandler::require(pool, "poolName")?;
    ValidationErrorHandler::require(image, "imageName")?;
    Ok(path_join(pool, namespace, image))
}

/// GET-style call decoding a JSON body on success
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: &ApiRequest,
    operation: &str,
) -> Result<T> {
    let response = transport.execute(request).await?;
    if !response.is_success() {
        return Err(HttpErrorHandler::handle_api_error(
            response.status,
            &response.body,
            operation,
        ));
    }
    response.json()
}

/// Call whose answer is only a status code
pub(crate) async fn send_status(
    transport: &dyn Transport,
    request: &ApiRequest,
    operation: &str,
) -> Result<u16> {
    let response = transport.execute(request).await?;
    if !response.is_success() {
        return Err(HttpErrorHandler::handle_api_error(
            response.status,
            &response.body,
            operation,
        ));
    }
    Ok(response.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CephError;

    #[test]
    fn test_path_join() {
        assert_eq!(path_join("alpha", None, "gamma"), "alpha/gamma");
        assert_eq!(path_join("alpha", Some("beta"), "gamma"), "alpha/beta/gamma");
        assert_eq!(path_join("alpha", Some(""), "gamma"), "alpha/gamma");
    }

    #[test]
    fn test_image_spec_requires_pool_and_name() {
        assert_eq!(image_spec("rbd", Some("ns"), "img").unwrap(), "rbd/ns/img");
        match image_spec("", None, "img") {
            Err(CephError::Validation(msg)) => assert!(msg.contains("poolName")),
            other => panic!("expected validation error, got {:?}", other),
        }
        match image_spec("rbd", None, "") {
            Err(CephError::Validation(msg)) => assert!(msg.contains("imageName")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
