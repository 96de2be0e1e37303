//! Bounded retry of delete calls the control plane briefly rejects.

use std::future::Future;

use tracing::warn;

use crate::config::RetrySettings;
use crate::context::Context;
use crate::error::{Result, SkyforgeError};

/// Returns true when a failed delete may succeed if issued again.
///
/// Covers transient transport failures and the conflicts reported while a
/// sibling operation on the same resource settles.
#[must_use]
pub fn is_delete_retryable(error: &SkyforgeError) -> bool {
    error.is_retryable()
        || error.api_status() == Some(409)
        || error.to_string().contains("resourceNotReady")
}

/// Issues `call` until it succeeds, fails permanently, or the attempt
/// budget in `settings` is spent.
///
/// # Errors
///
/// Returns the last error, or a cancellation error when `ctx` finishes
/// during a call or a retry delay.
pub async fn retry_delete<T, F, Fut>(
    ctx: &Context,
    settings: &RetrySettings,
    activity: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
    T: Send,
{
    let attempts = settings.attempts.max(1);
    let mut attempt = 1_u32;
    loop {
        match ctx.run(activity, call()).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_delete_retryable(&e) => {
                warn!("Attempt {attempt} of {attempts} failed while {activity}: {e}");
                ctx.sleep(activity, settings.delay(attempt)).await?;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
