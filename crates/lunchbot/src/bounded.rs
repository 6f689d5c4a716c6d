//! Every store call and every outbound send is bounded by [`CALL_TIMEOUT`].
//!
//! Store calls are synchronous redb transactions and run on the blocking
//! pool. A timed-out blocking call keeps running to completion in the
//! background; only the caller stops waiting for it.

use std::time::Duration;

use lunchbot_core::LunchError;
use thiserror::Error;

use crate::gateway::{Gateway, GatewayError, OutgoingMessage};

pub const CALL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Domain(#[from] LunchError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("call did not finish within {0:?}")]
    Timeout(Duration),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CallError {
    pub fn domain(&self) -> Option<&LunchError> {
        match self {
            CallError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_deadline(&self) -> bool {
        matches!(self, CallError::Domain(LunchError::DeadlineExceeded))
    }
}

/// Run a synchronous store operation on the blocking pool.
pub async fn store_call<T, F>(f: F) -> Result<T, CallError>
where
    F: FnOnce() -> lunchbot_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(CALL_TIMEOUT, tokio::task::spawn_blocking(f)).await {
        Ok(joined) => Ok(joined??),
        Err(_) => Err(CallError::Timeout(CALL_TIMEOUT)),
    }
}

pub async fn send<G: Gateway>(gateway: &G, msg: OutgoingMessage) -> Result<(), CallError> {
    match tokio::time::timeout(CALL_TIMEOUT, gateway.send(msg)).await {
        Ok(sent) => Ok(sent?),
        Err(_) => Err(CallError::Timeout(CALL_TIMEOUT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    struct Stalled;

    impl Gateway for Stalled {
        fn send(
            &self,
            _msg: OutgoingMessage,
        ) -> impl Future<Output = Result<(), GatewayError>> + Send {
            std::future::pending()
        }
    }

    #[tokio::test]
    async fn store_errors_pass_through() {
        let err = store_call(|| -> lunchbot_core::Result<()> { Err(LunchError::DeadlineExceeded) })
            .await
            .unwrap_err();
        assert!(err.is_deadline());
        assert_eq!(store_call(|| Ok(7)).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_send_times_out() {
        let err = send(&Stalled, OutgoingMessage::text(1, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Timeout(_)));
    }
}
