//! In-memory transport for operation tests

use crate::config::EngineConfig;
use crate::engine::{OperationExecutor, TaskTracker, TransportTaskSource};
use crate::error::Result;
use crate::logging::Logger;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers requests from per-route queues keyed by `"METHOD path"`.
/// The last response of a queue is repeated once the queue runs dry.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    pub requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: &str, path: &str, status: u16, body: Value) {
        let body = if body.is_null() {
            Vec::new()
        } else {
            body.to_string().into_bytes()
        };
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back(ApiResponse::new(status, body));
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method && r.path == path)
            .count()
    }

    pub fn last(&self, method: &str, path: &str) -> Option<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method.as_str() == method && r.path == path)
            .cloned()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let key = format!("{} {}", request.method, request.path);
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.entry(key.clone()).or_default();
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(response.unwrap_or_else(|| ApiResponse::new(404, format!("no route {}", key).into_bytes())))
    }
}

/// Executor polling the scripted transport's `task` route with no delay
pub fn executor(transport: Arc<ScriptedTransport>, max_attempts: u32) -> OperationExecutor {
    let config = EngineConfig::default()
        .with_max_attempts(max_attempts)
        .with_poll_interval(Duration::ZERO)
        .with_max_poll_cycles(5);
    let tracker = TaskTracker::new(
        Arc::new(TransportTaskSource::new(transport)),
        &config,
        Logger::new_quiet(),
    );
    OperationExecutor::new(Arc::new(tracker), &config, Logger::new_quiet())
}

pub fn finished(name: &str, metadata: Value, success: bool, code: Option<&str>) -> Value {
    serde_json::json!({
        "executing_tasks": [],
        "finished_tasks": [{
            "name": name,
            "metadata": metadata,
            "begin_time": "2022-03-01T10:00:00.000000Z",
            "end_time": "2022-03-01T10:00:01.000000Z",
            "duration": 1.0,
            "progress": 100,
            "success": success,
            "ret_value": null,
            "exception": code.map(|c| serde_json::json!({"code": c, "detail": "task error", "component": "rbd"}))
        }]
    })
}

pub fn executing(name: &str, metadata: Value) -> Value {
    serde_json::json!({
        "executing_tasks": [{
            "name": name,
            "metadata": metadata,
            "begin_time": "2022-03-01T10:00:00.000000Z",
            "progress": 40
        }],
        "finished_tasks": []
    })
}
