//! Background task correlation and polling
//!
//! The dashboard API does not hand out task ids when a mutating request is
//! accepted. A task is found again by its name plus the resource it works on,
//! which is what [`TaskDescriptor`] captures. [`TaskTracker`] polls the task
//! queue until the matching task reaches a terminal state or the cycle budget
//! runs out.

use crate::config::EngineConfig;
use crate::error::handlers::deserialize_code;
use crate::error::{CephError, ConflictKind, Result};
use crate::logging::Logger;
use crate::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Image a creation task will produce; creation tasks carry no resource spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationTarget {
    pub pool_name: String,
    pub namespace: Option<String>,
    pub image_name: String,
}

/// Identifies a server-side background task to watch.
///
/// Two descriptors reference the same logical task iff `name` and
/// `resource_spec` are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    pub resource_spec: String,
    pub creation: Option<CreationTarget>,
}

impl PartialEq for TaskDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.resource_spec == other.resource_spec
    }
}

impl Eq for TaskDescriptor {}

impl TaskDescriptor {
    /// Descriptor for a task acting on an existing resource
    pub fn for_resource(name: impl Into<String>, resource_spec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_spec: resource_spec.into(),
            creation: None,
        }
    }

    /// Descriptor for a creation task, correlated by pool/namespace/image name
    pub fn for_creation(name: impl Into<String>, target: CreationTarget) -> Self {
        Self {
            name: name.into(),
            resource_spec: String::new(),
            creation: Some(target),
        }
    }

    /// Whether a task entry from the queue belongs to this descriptor
    pub fn matches(&self, name: &str, metadata: &TaskMetadata) -> bool {
        if self.name != name {
            return false;
        }

        if !self.resource_spec.is_empty() {
            return metadata.image_spec.as_deref() == Some(self.resource_spec.as_str());
        }

        match &self.creation {
            Some(target) => {
                metadata.pool_name.as_deref() == Some(target.pool_name.as_str())
                    && metadata.image_name.as_deref() == Some(target.image_name.as_str())
                    && non_empty(metadata.namespace.as_deref()) == non_empty(target.namespace.as_deref())
            }
            None => true,
        }
    }
}

impl fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.resource_spec.is_empty() {
            return write!(f, "{} [{}]", self.name, self.resource_spec);
        }
        match &self.creation {
            Some(target) => write!(
                f,
                "{} [{}]",
                self.name,
                crate::operations::path_join(
                    &target.pool_name,
                    target.namespace.as_deref(),
                    &target.image_name
                )
            ),
            None => write!(f, "{}", self.name),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Metadata attached to a task in the queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub pool_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub image_spec: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Error payload of a failed task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
}

impl TaskFailure {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            detail: Some(detail.into()),
            component: None,
        }
    }

    /// Permanent conflict encoded in the failure code
    pub fn conflict(&self) -> Option<ConflictKind> {
        self.code.as_deref().and_then(ConflictKind::from_code)
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.detail) {
            (Some(code), Some(detail)) => write!(f, "{} ({})", detail, code),
            (Some(code), None) => write!(f, "code {}", code),
            (None, Some(detail)) => write!(f, "{}", detail),
            (None, None) => write!(f, "no error detail"),
        }
    }
}

/// Task still running on the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutingTask {
    pub name: String,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default)]
    pub begin_time: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Task that reached a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedTask {
    pub name: String,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default)]
    pub begin_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub progress: Option<f64>,
    pub success: bool,
    #[serde(default)]
    pub ret_value: Option<Value>,
    #[serde(default)]
    pub exception: Option<TaskFailure>,
}

/// Response of `GET /api/task`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub executing_tasks: Vec<ExecutingTask>,
    #[serde(default)]
    pub finished_tasks: Vec<FinishedTask>,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Pending,
    Succeeded,
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskOutcome::Pending)
    }

    /// Classify a task list against a descriptor; `None` if the task is in
    /// neither collection. A running entry wins over finished ones so that a
    /// stale result from an earlier attempt is not mistaken for this one.
    pub fn classify(descriptor: &TaskDescriptor, tasks: &TaskList) -> Option<TaskOutcome> {
        if tasks
            .executing_tasks
            .iter()
            .any(|t| descriptor.matches(&t.name, &t.metadata))
        {
            return Some(TaskOutcome::Pending);
        }

        let finished = tasks
            .finished_tasks
            .iter()
            .filter(|t| descriptor.matches(&t.name, &t.metadata))
            .max_by(|a, b| a.end_time.cmp(&b.end_time))?;

        if finished.success {
            Some(TaskOutcome::Succeeded)
        } else {
            Some(TaskOutcome::Failed(
                finished.exception.clone().unwrap_or_default(),
            ))
        }
    }
}

/// Where task lists come from
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn fetch_tasks(&self) -> Result<TaskList>;
}

/// Task queue read through the dashboard API
pub struct TransportTaskSource {
    transport: Arc<dyn Transport>,
}

impl TransportTaskSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TaskSource for TransportTaskSource {
    async fn fetch_tasks(&self) -> Result<TaskList> {
        let response = self
            .transport
            .execute(&ApiRequest::get("task").with_retry())
            .await?;
        if !response.is_success() {
            return Err(crate::error::handlers::HttpErrorHandler::handle_api_error(
                response.status,
                &response.body,
                "task list",
            ));
        }
        response.json()
    }
}

/// Waits for a described task to finish
#[async_trait]
pub trait TaskWatcher: Send + Sync {
    /// Returns `Succeeded` or `Failed`; never `Pending`
    async fn wait_for_completion(&self, descriptor: &TaskDescriptor) -> Result<TaskOutcome>;
}

/// Polls a [`TaskSource`] until a task is terminal or the budget is spent
pub struct TaskTracker {
    source: Arc<dyn TaskSource>,
    poll_interval: Duration,
    max_poll_cycles: u32,
    logger: Logger,
}

impl TaskTracker {
    pub fn new(source: Arc<dyn TaskSource>, config: &EngineConfig, logger: Logger) -> Self {
        Self {
            source,
            poll_interval: config.poll_interval,
            max_poll_cycles: config.max_poll_cycles,
            logger,
        }
    }

    /// One poll cycle; `None` means the task was not seen at all
    pub async fn poll_once(&self, descriptor: &TaskDescriptor) -> Result<Option<TaskOutcome>> {
        let tasks = self.source.fetch_tasks().await?;
        Ok(TaskOutcome::classify(descriptor, &tasks))
    }
}

#[async_trait]
impl TaskWatcher for TaskTracker {
    async fn wait_for_completion(&self, descriptor: &TaskDescriptor) -> Result<TaskOutcome> {
        for cycle in 1..=self.max_poll_cycles {
            match self.poll_once(descriptor).await? {
                Some(outcome @ TaskOutcome::Succeeded) => {
                    self.logger
                        .detail(&format!("task {} succeeded (cycle {})", descriptor, cycle));
                    return Ok(outcome);
                }
                Some(TaskOutcome::Failed(failure)) => {
                    self.logger.warning(&format!(
                        "task {} failed (cycle {}): {}",
                        descriptor, cycle, failure
                    ));
                    return Ok(TaskOutcome::Failed(failure));
                }
                Some(TaskOutcome::Pending) => {
                    self.logger.detail(&format!(
                        "task {} still running (cycle {}/{})",
                        descriptor, cycle, self.max_poll_cycles
                    ));
                }
                None => {
                    self.logger.detail(&format!(
                        "task {} not in queue yet (cycle {}/{})",
                        descriptor, cycle, self.max_poll_cycles
                    ));
                }
            }

            if cycle < self.max_poll_cycles {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        self.logger.error(&format!(
            "task {} not finished after {} poll cycles",
            descriptor, self.max_poll_cycles
        ));
        Err(CephError::TaskTimeout {
            operation: descriptor.name.clone(),
            resource_spec: descriptor.resource_spec.clone(),
            cycles: self.max_poll_cycles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedSource {
        lists: Mutex<VecDeque<TaskList>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(lists: Vec<TaskList>) -> Arc<Self> {
            Arc::new(Self {
                lists: Mutex::new(lists.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskSource for ScriptedSource {
        async fn fetch_tasks(&self) -> Result<TaskList> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut lists = self.lists.lock().unwrap();
            Ok(lists.pop_front().unwrap_or_default())
        }
    }

    fn spec_metadata(spec: &str) -> TaskMetadata {
        TaskMetadata {
            image_spec: Some(spec.to_string()),
            ..TaskMetadata::default()
        }
    }

    fn running(name: &str, spec: &str) -> TaskList {
        TaskList {
            executing_tasks: vec![ExecutingTask {
                name: name.to_string(),
                metadata: spec_metadata(spec),
                begin_time: None,
                progress: Some(10.0),
            }],
            finished_tasks: vec![],
        }
    }

    fn finished(name: &str, spec: &str, success: bool, end: &str) -> FinishedTask {
        FinishedTask {
            name: name.to_string(),
            metadata: spec_metadata(spec),
            begin_time: None,
            end_time: Some(end.to_string()),
            duration: None,
            progress: Some(100.0),
            success,
            ret_value: None,
            exception: if success {
                None
            } else {
                Some(TaskFailure::new("2", "No such file or directory"))
            },
        }
    }

    fn tracker(source: Arc<ScriptedSource>, cycles: u32) -> TaskTracker {
        let config = EngineConfig::default()
            .with_poll_interval(Duration::ZERO)
            .with_max_poll_cycles(cycles);
        TaskTracker::new(source, &config, Logger::new_quiet())
    }

    #[test]
    fn test_descriptor_equality_ignores_creation_target() {
        let a = TaskDescriptor::for_resource("rbd/delete", "pool/img");
        let b = TaskDescriptor::for_resource("rbd/delete", "pool/img");
        let c = TaskDescriptor::for_resource("rbd/delete", "pool/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_creation_descriptor_matches_by_metadata() {
        let descriptor = TaskDescriptor::for_creation(
            "rbd/create",
            CreationTarget {
                pool_name: "rbd".to_string(),
                namespace: None,
                image_name: "disk-1".to_string(),
            },
        );
        let metadata: TaskMetadata = serde_json::from_value(serde_json::json!({
            "pool_name": "rbd",
            "namespace": null,
            "image_name": "disk-1"
        }))
        .unwrap();
        assert!(descriptor.matches("rbd/create", &metadata));
        assert!(!descriptor.matches("rbd/delete", &metadata));

        let other: TaskMetadata = serde_json::from_value(serde_json::json!({
            "pool_name": "rbd",
            "namespace": "tenant-a",
            "image_name": "disk-1"
        }))
        .unwrap();
        assert!(!descriptor.matches("rbd/create", &other));
    }

    #[test]
    fn test_task_list_wire_format() {
        let json = serde_json::json!({
            "executing_tasks": [],
            "finished_tasks": [{
                "name": "rbd/create",
                "metadata": {"pool_name": "rbd", "namespace": null, "image_name": "a"},
                "begin_time": "2022-03-01T10:00:00.000000Z",
                "end_time": "2022-03-01T10:00:01.000000Z",
                "duration": 1.0,
                "progress": 100,
                "success": false,
                "ret_value": null,
                "exception": {"code": 17, "detail": "[errno 17] RBD image already exists", "component": "rbd"}
            }]
        });
        let list: TaskList = serde_json::from_value(json).unwrap();
        let failure = list.finished_tasks[0].exception.clone().unwrap();
        assert_eq!(failure.code.as_deref(), Some("17"));
        assert_eq!(failure.conflict(), Some(ConflictKind::ImageAlreadyExists));
    }

    #[test]
    fn test_latest_finished_entry_wins() {
        let descriptor = TaskDescriptor::for_resource("rbd/delete", "rbd/img");
        let list = TaskList {
            executing_tasks: vec![],
            finished_tasks: vec![
                finished("rbd/delete", "rbd/img", true, "2022-03-01T10:00:05Z"),
                finished("rbd/delete", "rbd/img", false, "2022-03-01T10:00:01Z"),
            ],
        };
        assert_eq!(
            TaskOutcome::classify(&descriptor, &list),
            Some(TaskOutcome::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_pending_then_succeeded() {
        let mut done = running("rbd/delete", "other/img");
        done.finished_tasks
            .push(finished("rbd/delete", "rbd/img", true, "2022-03-01T10:00:05Z"));
        let source = ScriptedSource::new(vec![running("rbd/delete", "rbd/img"), done]);
        let tracker = tracker(source.clone(), 10);

        let outcome = tracker
            .wait_for_completion(&TaskDescriptor::for_resource("rbd/delete", "rbd/img"))
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Succeeded);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fast_completion_found_on_first_poll() {
        let list = TaskList {
            executing_tasks: vec![],
            finished_tasks: vec![finished("rbd/edit", "rbd/img", false, "2022-03-01T10:00:05Z")],
        };
        let source = ScriptedSource::new(vec![list]);
        let tracker = tracker(source.clone(), 10);

        let outcome = tracker
            .wait_for_completion(&TaskDescriptor::for_resource("rbd/edit", "rbd/img"))
            .await
            .unwrap();
        assert!(matches!(outcome, TaskOutcome::Failed(ref f) if f.code.as_deref() == Some("2")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unseen_task_times_out() {
        let source = ScriptedSource::new(vec![]);
        let tracker = tracker(source.clone(), 3);

        let err = tracker
            .wait_for_completion(&TaskDescriptor::for_resource("rbd/copy", "rbd/img"))
            .await
            .unwrap_err();
        assert!(matches!(err, CephError::TaskTimeout { cycles: 3, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }
}
