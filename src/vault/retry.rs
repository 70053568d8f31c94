//! Status-driven retries for single HTTP calls.
//!
//! Each failed attempt is classified by its HTTP status into one of three
//! buckets: `continue` (stop and report the status as an accepted outcome),
//! `retry` (back off and try again) or `abort` (return the error as-is).
//! Statuses that are not classified are retried unless the policy aborts on
//! them. Failures that carry no status, such as transport or parse errors, are
//! returned as-is.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::vault::VaultError;

/// How a single call should be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the second attempt; doubled after every further attempt.
    pub initial_backoff_secs: u64,
    pub max_attempts: u32,
    pub continue_on: HashSet<u16>,
    pub retry_on: HashSet<u16>,
    pub abort_on: Option<HashSet<u16>>,
    /// Treat every status outside `continue_on` and `retry_on` as `abort`.
    pub abort_unclassified: bool,
}

impl RetryPolicy {
    pub fn new(initial_backoff_secs: u64, max_attempts: u32) -> Self {
        Self {
            initial_backoff_secs,
            max_attempts,
            continue_on: HashSet::new(),
            retry_on: HashSet::new(),
            abort_on: None,
            abort_unclassified: false,
        }
    }

    pub fn continue_on(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.continue_on.extend(statuses);
        self
    }

    pub fn retry_on(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_on.extend(statuses);
        self
    }

    pub fn abort_on(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.abort_on
            .get_or_insert_with(HashSet::new)
            .extend(statuses);
        self
    }

    pub fn abort_unclassified(mut self) -> Self {
        self.abort_unclassified = true;
        self
    }

    fn classify(&self, status: u16) -> RetryDecision {
        if self.continue_on.contains(&status) {
            RetryDecision::Continue
        } else if self.retry_on.contains(&status) {
            RetryDecision::Retry
        } else if self
            .abort_on
            .as_ref()
            .is_some_and(|abort| abort.contains(&status))
        {
            RetryDecision::Abort
        } else if self.abort_unclassified {
            RetryDecision::Abort
        } else {
            RetryDecision::Unspecified
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryDecision {
    Continue,
    Retry,
    Abort,
    Unspecified,
}

/// Outcome of a retried call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Completed(T),
    /// The call failed with a status designated `continue`.
    Continued(u16),
}

/// Runs `operation` until it succeeds, hits a `continue` or `abort` status, or
/// `max_attempts` is exhausted. Aborted and exhausted calls return the
/// operation's own error.
pub async fn retry_http_request<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
    policy: &RetryPolicy,
) -> Result<RetryOutcome<T>, VaultError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VaultError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff_secs;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(RetryOutcome::Completed(value)),
            Err(err) => err,
        };

        let Some(status) = err.status() else {
            return Err(err);
        };
        info!(
            "attempt #{} to {} returned status {}",
            attempt, operation_name, status
        );

        match policy.classify(status) {
            RetryDecision::Continue => {
                info!("{} is expected for {}, continuing", status, operation_name);
                return Ok(RetryOutcome::Continued(status));
            }
            RetryDecision::Abort => {
                debug!("{} is designated 'abort' for {}", status, operation_name);
                return Err(err);
            }
            RetryDecision::Retry | RetryDecision::Unspecified if attempt == attempts => {
                debug!("{} failed after {} attempts", operation_name, attempts);
                return Err(err);
            }
            decision => {
                if decision == RetryDecision::Unspecified {
                    warn!("handling of {} is unspecified; retrying", status);
                }
                info!("retrying {} after {}s", operation_name, backoff);
                sleep(Duration::from_secs(backoff)).await;
                backoff = backoff.saturating_mul(2);
            }
        }
    }
}
