//! RBD namespace operations
//!
//! Namespace calls answer synchronously; they still run through the executor
//! so a 400 carrying `namespace_already_exists` surfaces as a conflict.

use crate::engine::{OperationExecutor, OperationSpec, TaskDescriptor};
use crate::error::Result;
use crate::error::handlers::ValidationErrorHandler;
use crate::logging::Logger;
use crate::operations::fetch_json;
use crate::transport::{ApiRequest, Transport, escape_segment};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSpace {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_images: Option<u64>,
}

#[derive(Clone)]
pub struct NamespaceOperations {
    transport: Arc<dyn Transport>,
    executor: OperationExecutor,
    output: Logger,
}

impl NamespaceOperations {
    pub fn new(transport: Arc<dyn Transport>, executor: OperationExecutor, output: Logger) -> Self {
        Self {
            transport,
            executor,
            output,
        }
    }

    pub async fn list_namespaces(&self, pool: &str) -> Result<Vec<NameSpace>> {
        ValidationErrorHandler::require(pool, "poolName")?;
        let request = ApiRequest::get(format!("block/pool/{}/namespace", escape_segment(pool))).with_retry();
        fetch_json(self.transport.as_ref(), &request, "list namespaces").await
    }

    pub async fn create_namespace(&self, pool: &str, namespace: &str) -> Result<u16> {
        ValidationErrorHandler::require(pool, "poolName")?;
        ValidationErrorHandler::require(namespace, "nameSpace")?;

        let spec = OperationSpec::synchronous(TaskDescriptor::for_resource(
            "rbd/namespace/create",
            format!("{}/{}", pool, namespace),
        ));
        let request = ApiRequest::post(format!("block/pool/{}/namespace", escape_segment(pool)))
            .with_json(&NameSpace {
                namespace: namespace.to_string(),
                num_images: None,
            })?
            .with_retry();

        self.output
            .step(&format!("Creating namespace {} in pool {}", namespace, pool));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }

    pub async fn delete_namespace(&self, pool: &str, namespace: &str) -> Result<u16> {
        ValidationErrorHandler::require(pool, "poolName")?;
        ValidationErrorHandler::require(namespace, "nameSpace")?;

        let spec = OperationSpec::synchronous(TaskDescriptor::for_resource(
            "rbd/namespace/delete",
            format!("{}/{}", pool, namespace),
        ));
        let request = ApiRequest::delete(format!(
            "block/pool/{}/namespace/{}",
            escape_segment(pool),
            escape_segment(namespace)
        ))
        .with_retry();

        self.output
            .step(&format!("Deleting namespace {} from pool {}", namespace, pool));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }
}
