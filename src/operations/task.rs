//! Task queue queries (GET /api/task)

use crate::engine::TaskList;
use crate::error::Result;
use crate::operations::fetch_json;
use crate::transport::{ApiRequest, Transport};
use std::sync::Arc;

#[derive(Clone)]
pub struct TaskOperations {
    transport: Arc<dyn Transport>,
}

impl TaskOperations {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Running and finished tasks, optionally filtered by task name
    pub async fn list_tasks(&self, name: Option<&str>) -> Result<TaskList> {
        let mut request = ApiRequest::get("task");
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            request = request.with_query("name", name);
        }
        fetch_json(self.transport.as_ref(), &request, "task list").await
    }
}
