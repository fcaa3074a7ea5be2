//! RBD image operations
//!
//! Implements the block image endpoints of the dashboard API:
//! - Image listing and lookup (GET /api/block/image[/{image_spec}])
//! - Create, copy, delete, move to trash and update, each tracked through the
//!   background task queue by the operation executor

use crate::engine::{CreationTarget, OperationExecutor, OperationSpec, TaskDescriptor};
use crate::error::Result;
use crate::error::handlers::ValidationErrorHandler;
use crate::logging::Logger;
use crate::operations::{fetch_json, image_spec};
use crate::transport::{ApiRequest, Transport, escape_segment};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const TASK_CREATE: &str = "rbd/create";
pub const TASK_COPY: &str = "rbd/copy";
pub const TASK_DELETE: &str = "rbd/delete";
pub const TASK_TRASH_MOVE: &str = "rbd/trash/move";
pub const TASK_EDIT: &str = "rbd/edit";

/// One RBD configuration value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbdConfiguration {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub source: i64,
}

/// Image as returned by `GET /api/block/image/{image_spec}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rbd {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub obj_size: u64,
    #[serde(default)]
    pub num_objs: u64,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub block_name_prefix: String,
    pub name: String,
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub image_format: i32,
    #[serde(default)]
    pub pool_name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub features: u64,
    #[serde(default)]
    pub features_name: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub stripe_count: Option<u32>,
    #[serde(default)]
    pub stripe_unit: Option<u64>,
    #[serde(default)]
    pub data_pool: Value,
    #[serde(default)]
    pub parent: Value,
    #[serde(default)]
    pub snapshots: Vec<Value>,
    #[serde(default)]
    pub total_disk_usage: Option<u64>,
    #[serde(default)]
    pub disk_usage: Option<u64>,
    #[serde(default)]
    pub configuration: Vec<RbdConfiguration>,
}

impl Rbd {
    pub fn spec(&self) -> String {
        crate::operations::path_join(&self.pool_name, self.namespace.as_deref(), &self.name)
    }
}

/// Images of one pool as returned by `GET /api/block/image`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbdPoolImages {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub value: Vec<Rbd>,
    pub pool_name: String,
}

/// QoS limits accepted by create and copy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbdQosConfig {
    pub rbd_qos_bps_limit: u64,
    pub rbd_qos_iops_limit: u64,
    pub rbd_qos_read_bps_limit: u64,
    pub rbd_qos_read_iops_limit: u64,
    pub rbd_qos_write_bps_limit: u64,
    pub rbd_qos_write_iops_limit: u64,
    pub rbd_qos_bps_burst: u64,
    pub rbd_qos_iops_burst: u64,
    pub rbd_qos_read_bps_burst: u64,
    pub rbd_qos_read_iops_burst: u64,
    pub rbd_qos_write_bps_burst: u64,
    pub rbd_qos_write_iops_burst: u64,
}

/// Body of `POST /api/block/image`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbdCreate {
    pub features: Vec<String>,
    pub pool_name: String,
    pub namespace: Option<String>,
    pub name: String,
    pub size: u64,
    pub obj_size: u64,
    pub stripe_unit: Option<u64>,
    pub stripe_count: Option<u32>,
    pub data_pool: Option<String>,
    pub configuration: Option<RbdQosConfig>,
}

impl RbdCreate {
    pub fn new(pool_name: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            pool_name: pool_name.into(),
            name: name.into(),
            size,
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    pub fn with_obj_size(mut self, obj_size: u64) -> Self {
        self.obj_size = obj_size;
        self
    }
}

/// Body of `POST /api/block/image/{image_spec}/copy`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbdCopy {
    pub configuration: Option<RbdQosConfig>,
    pub data_pool: Option<String>,
    pub dest_image_name: String,
    pub dest_namespace: Option<String>,
    pub dest_pool_name: String,
    pub features: Vec<String>,
    pub obj_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_name: Option<String>,
    pub stripe_count: Option<u32>,
    pub stripe_unit: Option<u64>,
}

impl RbdCopy {
    pub fn new(dest_pool_name: impl Into<String>, dest_image_name: impl Into<String>) -> Self {
        Self {
            dest_pool_name: dest_pool_name.into(),
            dest_image_name: dest_image_name.into(),
            ..Self::default()
        }
    }

    pub fn with_dest_namespace(mut self, namespace: Option<String>) -> Self {
        self.dest_namespace = namespace;
        self
    }
}

/// Body of `PUT /api/block/image/{image_spec}`; rename and resize both go here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbdUpdate {
    pub features: Vec<String>,
    pub name: String,
    pub size: u64,
    pub configuration: Map<String, Value>,
}

impl RbdUpdate {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            ..Self::default()
        }
    }

    /// Update carrying the image's current name, size and features
    pub fn from_image(image: &Rbd) -> Self {
        Self {
            features: image.features_name.clone(),
            name: image.name.clone(),
            size: image.size,
            configuration: Map::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrashDelay {
    delay: f64,
}

#[derive(Clone)]
pub struct BlockOperations {
    transport: Arc<dyn Transport>,
    executor: OperationExecutor,
    output: Logger,
}

impl BlockOperations {
    pub fn new(transport: Arc<dyn Transport>, executor: OperationExecutor, output: Logger) -> Self {
        Self {
            transport,
            executor,
            output,
        }
    }

    /// List images, optionally limited to one pool
    pub async fn list_images(&self, pool_name: Option<&str>) -> Result<Vec<RbdPoolImages>> {
        let mut request = ApiRequest::get("block/image");
        if let Some(pool) = pool_name.filter(|p| !p.is_empty()) {
            request = request.with_query("pool_name", pool);
        }

        let list: Vec<RbdPoolImages> = fetch_json(self.transport.as_ref(), &request, "list images").await?;
        self.output.verbose(&format!(
            "Found {} image(s) in {} pool(s)",
            list.iter().map(|p| p.value.len()).sum::<usize>(),
            list.len()
        ));
        Ok(list)
    }

    pub async fn get_image(&self, pool: &str, namespace: Option<&str>, image: &str) -> Result<Rbd> {
        let spec = image_spec(pool, namespace, image)?;
        let request = ApiRequest::get(format!("block/image/{}", escape_segment(&spec)));
        fetch_json(self.transport.as_ref(), &request, "get image").await
    }

    /// Create an image; returns 201 once the creation task succeeded
    pub async fn create_image(&self, create: &RbdCreate) -> Result<u16> {
        ValidationErrorHandler::require(&create.pool_name, "poolName")?;
        ValidationErrorHandler::require(&create.name, "imageName")?;

        let spec = OperationSpec::new(
            TaskDescriptor::for_creation(
                TASK_CREATE,
                CreationTarget {
                    pool_name: create.pool_name.clone(),
                    namespace: create.namespace.clone(),
                    image_name: create.name.clone(),
                },
            ),
            &[201, 202],
            201,
        );
        let request = ApiRequest::post("block/image").with_json(create)?.with_retry();

        self.output
            .step(&format!("Creating image {} ({} bytes)", spec.descriptor, create.size));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }

    /// Copy an image; returns 201 once the copy task succeeded
    pub async fn copy_image(
        &self,
        pool: &str,
        namespace: Option<&str>,
        image: &str,
        copy: &RbdCopy,
    ) -> Result<u16> {
        let source = image_spec(pool, namespace, image)?;
        ValidationErrorHandler::require(&copy.dest_pool_name, "destPoolName")?;
        ValidationErrorHandler::require(&copy.dest_image_name, "destImageName")?;

        let spec = OperationSpec::new(TaskDescriptor::for_resource(TASK_COPY, &source), &[201, 202], 201);
        let request = ApiRequest::post(format!("block/image/{}/copy", escape_segment(&source)))
            .with_json(copy)?
            .with_retry();

        self.output.step(&format!(
            "Copying {} to {}",
            source,
            crate::operations::path_join(
                &copy.dest_pool_name,
                copy.dest_namespace.as_deref(),
                &copy.dest_image_name
            )
        ));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }

    /// Delete an image; returns 204 once the delete task succeeded
    pub async fn delete_image(&self, pool: &str, namespace: Option<&str>, image: &str) -> Result<u16> {
        let target = image_spec(pool, namespace, image)?;
        let spec = OperationSpec::new(
            TaskDescriptor::for_resource(TASK_DELETE, &target),
            &[202, 204, 400],
            204,
        );
        let request = ApiRequest::delete(format!("block/image/{}", escape_segment(&target))).with_retry();

        self.output.step(&format!("Deleting image {}", target));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }

    /// Move an image to the trash. Some releases answer 200 where 201 is
    /// documented; both are tracked, 200 is reported on success.
    pub async fn move_image_to_trash(
        &self,
        pool: &str,
        namespace: Option<&str>,
        image: &str,
        delay: Duration,
    ) -> Result<u16> {
        let target = image_spec(pool, namespace, image)?;
        let spec = OperationSpec::new(
            TaskDescriptor::for_resource(TASK_TRASH_MOVE, &target),
            &[200, 201, 400],
            200,
        );
        let request = ApiRequest::post(format!("block/image/{}/move_trash", escape_segment(&target)))
            .with_json(&TrashDelay {
                delay: delay.as_secs_f64(),
            })?
            .with_retry();

        self.output.step(&format!(
            "Moving image {} to trash (delay {}s)",
            target,
            delay.as_secs()
        ));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }

    /// Update name, size or features of an image; returns 200 on success
    pub async fn update_image(
        &self,
        pool: &str,
        namespace: Option<&str>,
        image: &str,
        update: &RbdUpdate,
    ) -> Result<u16> {
        ValidationErrorHandler::require(&update.name, "imageName")?;
        let target = image_spec(pool, namespace, image)?;

        let spec = OperationSpec::new(
            TaskDescriptor::for_resource(TASK_EDIT, &target),
            &[200, 202, 400],
            200,
        );
        let request = ApiRequest::put(format!("block/image/{}", escape_segment(&target)))
            .with_json(update)?
            .with_retry();

        self.output.step(&format!("Updating image {}", target));
        self.executor
            .execute(&spec, || self.transport.execute(&request))
            .await
    }

    /// Rename keeping size and features
    pub async fn rename_image(
        &self,
        pool: &str,
        namespace: Option<&str>,
        image: &str,
        new_name: &str,
    ) -> Result<u16> {
        ValidationErrorHandler::require(new_name, "newName")?;
        let current = self.get_image(pool, namespace, image).await?;
        let update = RbdUpdate {
            name: new_name.to_string(),
            ..RbdUpdate::from_image(&current)
        };
        self.update_image(pool, namespace, image, &update).await
    }

    /// Resize keeping name and features
    pub async fn resize_image(
        &self,
        pool: &str,
        namespace: Option<&str>,
        image: &str,
        size: u64,
    ) -> Result<u16> {
        let current = self.get_image(pool, namespace, image).await?;
        let update = RbdUpdate {
            size,
            ..RbdUpdate::from_image(&current)
        };
        self.update_image(pool, namespace, image, &update).await
    }
}
