use std::future::Future;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::RetryPolicy;
use crate::errors::AppError;

/// Run one task, re-running it from scratch after `retry_delay` when it fails
/// with a retryable error, up to `retries` extra attempts.
pub async fn run_with_retry<T, F, Fut>(task: &str, policy: RetryPolicy, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 1;
    let max_attempts = policy.retries + 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    "🔁 Task {} failed (attempt {}/{}): {}. Retrying in {}s",
                    task,
                    attempt,
                    max_attempts,
                    e,
                    policy.retry_delay.as_secs()
                );
                sleep(policy.retry_delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("❌ Task {} failed (attempt {}/{}): {}", task, attempt, max_attempts, e);
                return Err(e);
            }
        }
    }
}
