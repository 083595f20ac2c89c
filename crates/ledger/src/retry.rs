use std::fmt::Display;

use crate::{RetrySettings, error::Transient};

/// Runs `op` until it succeeds, fails with a permanent error or runs out of
/// attempts, sleeping with exponential backoff in between.
pub async fn retry<T, E, F, Fut>(policy: &RetrySettings, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{label}: attempt {attempt}/{max_attempts} failed: {err}, retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!("{label}: giving up after {attempt} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}
