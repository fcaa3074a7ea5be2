//! RBD snapshot operations (POST /api/block/image/{image_spec}/snap)

use crate::engine::{OperationExecutor, OperationSpec, TaskDescriptor};
use crate::error::Result;
use crate::error::handlers::ValidationErrorHandler;
use crate::logging::Logger;
use crate::operations::image_spec;
use crate::transport::{ApiRequest, Transport, escape_segment};
use serde::Serialize;
use std::sync::Arc;

pub const TASK_SNAP_CREATE: &str = "rbd/snap/create";

#[derive(Debug, Serialize)]
struct SnapshotBody<'a> {
    snapshot_name: &'a str,
}

#[derive(Clone)]
pub struct SnapshotOperations {
    transport: Arc<dyn Transport>,
    executor: OperationExecutor,
    output: Logger,
}

impl SnapshotOperations {
    pub fn new(transport: Arc<dyn Transport>, executor: OperationExecutor, output: Logger) -> Self {
        Self {
            transport,
            executor,
            output,
        }
    }

    /// Snapshot an image; returns 201 once the snapshot task succeeded
    pub async fn create_snapshot(
        &self,
        pool: &str,
        namespace: Option<&str>,
        image: &str,
        snapshot_name: &str,
    ) -> Result<u16> {
        ValidationErrorHandler::require(snapshot_name, "snapShotName")?;
        let target = image_spec(pool, namespace, image)?;

        let spec = OperationSpec::new(
            TaskDescriptor::for_resource(TASK_SNAP_CREATE, &target),
            &[201, 202, 400],
            201,
        );
        let request = ApiRequest::post(format!("block/image/{}/snap", escape_segment(&target)))
            .with_json(&SnapshotBody { snapshot_name })?
            .with_retry();

        self.output
            .step(&format!("Creating snapshot {}@{}", target, snapshot_name));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }
}
