//! Command line interface module
//!
//! Argument parsing for the `ceph-rest` binary and the runner that logs in,
//! executes one command and logs out again.

pub mod args;
pub mod runner;

pub use args::{Args, Command};
pub use runner::Runner;
