/// Per-request deadline propagated into every backend call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::AppError;

/// A point in time after which in-flight work is abandoned.
///
/// Created once per inbound request and passed by reference down the call
/// chain, so nested store calls share the remaining budget instead of each
/// getting a fresh timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `future` until it completes or the deadline passes.
    ///
    /// # Errors
    /// `AppError::Timeout(operation)` if the deadline was already expired or
    /// expires while the future is pending; otherwise the future's own result.
    pub async fn run<F, T>(&self, operation: &'static str, future: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        if self.is_expired() {
            return Err(AppError::Timeout(operation));
        }

        match tokio::time::timeout_at(self.at, future).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(operation)),
        }
    }

    /// Run CPU-bound work on the blocking pool, bounded by the deadline.
    pub async fn run_blocking<F, T>(&self, operation: &'static str, work: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        self.run(operation, async move {
            tokio::task::spawn_blocking(work)
                .await
                .map_err(|e| AppError::Internal(format!("{} task failed: {}", operation, e)))?
        })
        .await
    }
}
