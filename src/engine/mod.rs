//! Asynchronous operation completion engine
//!
//! - [`retry_policy`]: transport-level retry decision per HTTP exchange
//! - [`task`]: task descriptors, task queue types and the polling tracker
//! - [`executor`]: submit / wait / decide loop with bounded resubmission

pub mod executor;
pub mod retry_policy;
pub mod task;

pub use executor::{OperationAttempt, OperationExecutor, OperationSpec};
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use task::{
    CreationTarget, TaskDescriptor, TaskFailure, TaskList, TaskOutcome, TaskSource, TaskTracker,
    TaskWatcher, TransportTaskSource,
};
