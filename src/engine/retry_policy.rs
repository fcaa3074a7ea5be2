//! Transport-level retry decision for completed HTTP exchanges

use crate::config::RetryConfig;
use crate::logging::Logger;
use std::time::Duration;

/// Statuses that carry a definitive answer about the request and are handed
/// upward untouched. A 400 here usually encodes a domain conflict the caller
/// has to interpret.
pub const ACCEPTED_STATUSES: [u16; 6] = [200, 201, 202, 204, 400, 404];

/// Outcome of evaluating one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryNow,
    Accept,
}

/// Decides whether the transport repeats a request before returning it
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    logger: Logger,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, logger: Logger) -> Self {
        Self { config, logger }
    }

    /// Retry budget: how many extra requests are allowed after the first one
    pub fn max_retries(&self) -> u32 {
        self.config.retry_count
    }

    /// Fixed wait between attempts
    pub fn wait(&self) -> Duration {
        self.config.retry_wait
    }

    pub fn should_retry(&self, status: u16) -> bool {
        self.decide(status, "") == RetryDecision::RetryNow
    }

    /// Classify a status and log the decision
    pub fn decide(&self, status: u16, url: &str) -> RetryDecision {
        if ACCEPTED_STATUSES.contains(&status) {
            self.logger
                .debug(&format!("http status: {} --> no retry for {}", status, url));
            RetryDecision::Accept
        } else {
            self.logger
                .debug(&format!("http status: {} --> retry for {} needed", status, url));
            RetryDecision::RetryNow
        }
    }
}
