//! Bounded retry for transient store failures.
//!
//! Conflicts (duplicate-key races on conversation creation or sequence
//! assignment) are retried immediately; unavailability backs off between
//! attempts. Either way the budget is bounded and the last error is
//! returned once it is spent, so a caller sees `NotFound` untouched,
//! conflicts never, and a persistent outage as unavailability.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::StoreError;

#[derive(Clone, Copy, Debug)]
pub struct StoreRetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl StoreRetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Run a store operation under this policy. `op` must be safe to issue
    /// again with the same arguments (all repository operations are).
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(StoreError::Conflict(key)) if attempt < self.attempts => {
                    attempt += 1;
                    debug!(operation, attempt, key = %key, "store conflict, retrying");
                }
                Err(StoreError::Unavailable(reason)) if attempt < self.attempts => {
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        reason = %reason,
                        "store unavailable, backing off"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
