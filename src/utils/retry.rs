//! Retry helper for operations that may lose a unique-key race.

use std::future::Future;

use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;

use crate::error::AppError;

/// Delay before the single retry after a [`AppError::Conflict`].
const CONFLICT_RETRY_DELAY_MS: u64 = 25;

/// Runs `operation`, retrying exactly once with a fresh attempt if it fails
/// with [`AppError::Conflict`]. Any other error is returned immediately.
pub async fn retry_once_on_conflict<T, F, Fut>(operation: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let strategy = FixedInterval::from_millis(CONFLICT_RETRY_DELAY_MS).take(1);

    RetryIf::start(strategy, operation, |e: &AppError| {
        if e.is_conflict() {
            tracing::warn!(error = %e, "conflict detected, retrying with a fresh transaction");
            true
        } else {
            false
        }
    })
    .await
}
