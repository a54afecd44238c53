//! Bounded, panic-contained execution of adapter and sink calls.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use notifier_core::error::{NotifierError, Result};

/// Run `fut` with a deadline, turning both a timeout and a panic into an
/// ordinary error for `operation`.
pub(crate) async fn guarded<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(fut).catch_unwind()).await {
        Err(_) => Err(NotifierError::Timeout {
            operation: operation.to_string(),
            after: limit,
        }),
        Ok(Err(panic)) => Err(NotifierError::Panicked {
            operation: operation.to_string(),
            message: panic_message(panic.as_ref()),
        }),
        Ok(Ok(result)) => result,
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
