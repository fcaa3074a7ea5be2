//! Completion engine for asynchronous mutating operations
//!
//! One logical operation runs as: submit, interpret the status, wait for the
//! background task when the status says the work is in flight, then decide.
//! A task failure without a conflict code resubmits the whole operation, since
//! the API offers no way to resume a failed task. The attempt counter is the
//! only guard against unbounded retries and lives here alone.

use crate::config::EngineConfig;
use crate::engine::task::{TaskDescriptor, TaskOutcome, TaskWatcher};
use crate::error::handlers::HttpErrorHandler;
use crate::error::{CephError, Result};
use crate::logging::Logger;
use crate::transport::ApiResponse;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Status classification and task correlation for one kind of operation
#[derive(Debug, Clone)]
pub struct OperationSpec {
    /// Statuses meaning "accepted, completion tracked by a task"
    pub in_flight: Vec<u16>,
    /// Status reported once the task succeeded
    pub success_status: u16,
    pub descriptor: TaskDescriptor,
}

impl OperationSpec {
    pub fn new(descriptor: TaskDescriptor, in_flight: &[u16], success_status: u16) -> Self {
        Self {
            in_flight: in_flight.to_vec(),
            success_status,
            descriptor,
        }
    }

    /// Operation that never enqueues a task
    pub fn synchronous(descriptor: TaskDescriptor) -> Self {
        Self {
            in_flight: Vec::new(),
            success_status: 200,
            descriptor,
        }
    }

    pub fn is_in_flight(&self, status: u16) -> bool {
        self.in_flight.contains(&status)
    }
}

/// One submission of a logical operation
#[derive(Debug, Clone)]
pub struct OperationAttempt {
    pub operation_id: Uuid,
    pub attempt_number: u32,
    pub submitted_at: SystemTime,
}

/// Runs operations end-to-end against a task watcher
#[derive(Clone)]
pub struct OperationExecutor {
    watcher: Arc<dyn TaskWatcher>,
    max_attempts: u32,
    logger: Logger,
}

impl OperationExecutor {
    pub fn new(watcher: Arc<dyn TaskWatcher>, config: &EngineConfig, logger: Logger) -> Self {
        Self {
            watcher,
            max_attempts: config.max_attempts,
            logger,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Same executor with a different attempt ceiling
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }

    /// Run `submit` until the operation is done, failed, or out of attempts.
    ///
    /// Returns the final status: the raw status for answers that need no
    /// task, `spec.success_status` after a successful task.
    pub async fn execute<F, Fut>(&self, spec: &OperationSpec, mut submit: F) -> Result<u16>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse>>,
    {
        let operation_id = Uuid::new_v4();
        let operation = spec.descriptor.name.clone();
        let mut last_failure = None;
        let mut attempt_number = 0u32;

        loop {
            attempt_number += 1;
            if attempt_number > self.max_attempts {
                self.logger.error(&format!(
                    "{} ({}) gave up after {} attempt(s)",
                    spec.descriptor, operation_id, self.max_attempts
                ));
                return Err(CephError::MaxAttemptsExceeded {
                    operation,
                    attempts: self.max_attempts,
                    last_failure,
                });
            }

            let attempt = OperationAttempt {
                operation_id,
                attempt_number,
                submitted_at: SystemTime::now(),
            };
            self.logger.debug(&format!(
                "submitting {} ({}) attempt {}/{} at {:?}",
                spec.descriptor,
                attempt.operation_id,
                attempt.attempt_number,
                self.max_attempts,
                attempt.submitted_at
            ));

            let response = submit().await?;
            let status = response.status;

            // a 400 carrying a conflict code is final no matter the classification
            if status == 400 {
                if let Some((kind, exception)) = HttpErrorHandler::conflict_in(&response.body) {
                    self.logger.debug(&format!(
                        "{} rejected: {} ({})",
                        spec.descriptor,
                        kind,
                        exception.detail.as_deref().unwrap_or("")
                    ));
                    return Err(CephError::Conflict {
                        kind,
                        status,
                        code: kind.code().to_string(),
                        detail: exception.detail.unwrap_or_default(),
                        operation,
                    });
                }
            }

            if !spec.is_in_flight(status) {
                if response.is_success() {
                    self.logger
                        .detail(&format!("{} done with status {}", spec.descriptor, status));
                    return Ok(status);
                }
                return Err(HttpErrorHandler::handle_api_error(
                    status,
                    &response.body,
                    &operation,
                ));
            }

            self.logger.detail(&format!(
                "{} accepted with status {}, waiting for task",
                spec.descriptor, status
            ));

            match self.watcher.wait_for_completion(&spec.descriptor).await? {
                TaskOutcome::Succeeded => {
                    self.logger.success(&format!(
                        "{} completed on attempt {}",
                        spec.descriptor, attempt_number
                    ));
                    return Ok(spec.success_status);
                }
                TaskOutcome::Failed(failure) => {
                    let error = match failure.conflict() {
                        Some(kind) => CephError::Conflict {
                            kind,
                            status,
                            code: kind.code().to_string(),
                            detail: failure.detail.clone().unwrap_or_default(),
                            operation: operation.clone(),
                        },
                        None => CephError::TaskFailed {
                            operation: operation.clone(),
                            failure: failure.clone(),
                        },
                    };
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    self.logger.warning(&format!(
                        "{} ({}) on attempt {}, resubmitting",
                        error, spec.descriptor, attempt_number
                    ));
                    last_failure = Some(failure);
                }
                TaskOutcome::Pending => {
                    return Err(CephError::TaskTimeout {
                        operation,
                        resource_spec: spec.descriptor.resource_spec.clone(),
                        cycles: 0,
                    });
                }
            }
        }
    }
}
