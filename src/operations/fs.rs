//! CephFS operations
//!
//! Plain request/response calls; none of them enqueue a background task.

use crate::error::Result;
use crate::error::handlers::ValidationErrorHandler;
use crate::logging::Logger;
use crate::operations::{fetch_json, send_status};
use crate::transport::{ApiRequest, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// MDS map of a filesystem; rarely used fields stay untyped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MdsMap {
    #[serde(default)]
    pub epoch: i64,
    #[serde(default)]
    pub flags: i64,
    #[serde(default)]
    pub root: i64,
    #[serde(default)]
    pub session_timeout: i64,
    #[serde(default)]
    pub session_autoclose: i64,
    #[serde(default)]
    pub max_file_size: i64,
    #[serde(default)]
    pub max_mds: i64,
    #[serde(default, rename = "in")]
    pub in_ranks: Vec<i64>,
    #[serde(default)]
    pub up: HashMap<String, Value>,
    #[serde(default)]
    pub failed: Vec<Value>,
    #[serde(default)]
    pub damaged: Vec<Value>,
    #[serde(default)]
    pub stopped: Vec<Value>,
    #[serde(default)]
    pub info: HashMap<String, Value>,
    #[serde(default)]
    pub data_pools: Vec<i64>,
    #[serde(default)]
    pub metadata_pool: i64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub fs_name: String,
    #[serde(default)]
    pub balancer: String,
    #[serde(default)]
    pub standby_count_wanted: i64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fs {
    pub id: i64,
    #[serde(default)]
    pub mdsmap: MdsMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub max_bytes: u64,
    #[serde(default)]
    pub max_files: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Quota {
    pub fn new(path: impl Into<String>, max_bytes: u64, max_files: u64) -> Self {
        Self {
            max_bytes,
            max_files,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub snapshots: Vec<Value>,
    #[serde(default)]
    pub quotas: Quota,
}

#[derive(Debug, Serialize)]
struct PathBody<'a> {
    path: &'a str,
}

#[derive(Clone)]
pub struct FsOperations {
    transport: Arc<dyn Transport>,
    output: Logger,
}

impl FsOperations {
    pub fn new(transport: Arc<dyn Transport>, output: Logger) -> Self {
        Self { transport, output }
    }

    pub async fn list_fs(&self) -> Result<Vec<Fs>> {
        fetch_json(self.transport.as_ref(), &ApiRequest::get("cephfs"), "list cephfs").await
    }

    /// Full filesystem details, left untyped
    pub async fn get_fs(&self, id: i64) -> Result<Value> {
        fetch_json(
            self.transport.as_ref(),
            &ApiRequest::get(format!("cephfs/{}", id)),
            "get cephfs",
        )
        .await
    }

    pub async fn root_directory(&self, id: i64) -> Result<Directory> {
        fetch_json(
            self.transport.as_ref(),
            &ApiRequest::get(format!("cephfs/{}/get_root_directory", id)),
            "get root directory",
        )
        .await
    }

    pub async fn ls_dir(&self, id: i64, path: &str, depth: u32) -> Result<Vec<Directory>> {
        let request = ApiRequest::get(format!("cephfs/{}/ls_dir", id))
            .with_query("path", path)
            .with_query("depth", depth.to_string());
        let dirs: Vec<Directory> = fetch_json(self.transport.as_ref(), &request, "list directory").await?;
        self.output
            .verbose(&format!("{} entr(ies) below {}", dirs.len(), path));
        Ok(dirs)
    }

    pub async fn create_dir(&self, id: i64, path: &str) -> Result<u16> {
        ValidationErrorHandler::require(path, "path")?;
        let request = ApiRequest::post(format!("cephfs/{}/tree", id)).with_json(&PathBody { path })?;
        self.output.step(&format!("Creating directory {}", path));
        send_status(self.transport.as_ref(), &request, "create directory").await
    }

    pub async fn delete_dir(&self, id: i64, path: &str) -> Result<u16> {
        ValidationErrorHandler::require(path, "path")?;
        let request = ApiRequest::delete(format!("cephfs/{}/tree", id)).with_query("path", path);
        self.output.step(&format!("Deleting directory {}", path));
        send_status(self.transport.as_ref(), &request, "delete directory").await
    }

    pub async fn get_quota(&self, id: i64, path: &str) -> Result<Quota> {
        let request = ApiRequest::get(format!("cephfs/{}/quota", id)).with_query("path", path);
        let mut quota: Quota = fetch_json(self.transport.as_ref(), &request, "get quota").await?;
        if quota.path.is_empty() {
            quota.path = path.to_string();
        }
        Ok(quota)
    }

    pub async fn set_quota(&self, id: i64, quota: &Quota) -> Result<u16> {
        ValidationErrorHandler::require(&quota.path, "path")?;
        let request = ApiRequest::put(format!("cephfs/{}/quota", id)).with_json(quota)?;
        self.output.step(&format!(
            "Setting quota on {} (max_bytes {}, max_files {})",
            quota.path, quota.max_bytes, quota.max_files
        ));
        send_status(self.transport.as_ref(), &request, "set quota").await
    }
}
