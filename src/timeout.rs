/// Deadline race over arbitrary operations
///
/// Most RPC client stacks cannot cancel an in-flight call, so losing the
/// race only means the result is no longer awaited - the operation may
/// still have had side effects. Callers must treat a timeout as "outcome
/// unknown", never "did not happen".
use std::future::Future;
use std::time::Duration;

use crate::errors::RpcError;

/// Race a future against a deadline
///
/// Returns the future's output, or a `Timeout`-kinded error if the deadline
/// elapses first. Used to bound read calls and individual confirmation
/// polls so one stalled call cannot block a whole batch or the UI.
pub async fn with_timeout<F: Future>(deadline: Duration, fut: F) -> Result<F::Output, RpcError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(output) => Ok(output),
        Err(_) => Err(RpcError::timeout(deadline)),
    }
}
