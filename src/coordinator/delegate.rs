//! Delegation wrappers
//!
//! Operations that mean nothing without a real consensus store are skipped in
//! static mode, and a quorum loss reported by the store is turned into a
//! success. Both wrappers take the un-awaited store call, so a skipped call
//! never reaches the store.

use std::future::Future;

use super::mode::Mode;
use crate::common::metrics::METRICS;
use crate::common::{Error, Result};

/// Await `call`; a quorum loss counts as success.
pub async fn delegate_or_swallow_quorum_loss<F>(op: &'static str, call: F) -> Result<bool>
where
    F: Future<Output = Result<bool>>,
{
    match call.await {
        Err(Error::QuorumLoss(reason)) => {
            tracing::warn!("{}: no DCS cluster leader ({})", op, reason);
            METRICS.record_absorbed_quorum_loss(op);
            Ok(true)
        }
        other => other,
    }
}

/// In static mode report success without touching the store, otherwise
/// delegate and absorb quorum loss.
pub async fn delegate_or_noop<F>(mode: Mode, op: &'static str, call: F) -> Result<bool>
where
    F: Future<Output = Result<bool>>,
{
    if mode.is_static() {
        tracing::debug!("{}: skipped in static mode", op);
        return Ok(true);
    }
    delegate_or_swallow_quorum_loss(op, call).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_quorum_loss_becomes_success() {
        let result = delegate_or_swallow_quorum_loss("test_absorb", async {
            Err(Error::QuorumLoss("no leader".into()))
        })
        .await;
        assert!(result.unwrap());
        assert_eq!(METRICS.absorbed_quorum_loss("test_absorb"), 1);
    }

    #[tokio::test]
    async fn test_other_results_pass_through() {
        let failed = delegate_or_swallow_quorum_loss("test_pass_through", async {
            Err(Error::ConnectionFailed("refused".into()))
        })
        .await;
        assert!(matches!(failed, Err(Error::ConnectionFailed(_))));

        let refused = delegate_or_swallow_quorum_loss("test_pass_through", async { Ok(false) }).await;
        assert!(!refused.unwrap());
        assert_eq!(METRICS.absorbed_quorum_loss("test_pass_through"), 0);
    }

    #[tokio::test]
    async fn test_static_mode_never_polls_the_call() {
        let polled = AtomicBool::new(false);
        let result = delegate_or_noop(Mode::Static, "test_noop", async {
            polled.store(true, Ordering::SeqCst);
            Err(Error::ConnectionFailed("refused".into()))
        })
        .await;
        assert!(result.unwrap());
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_normal_mode_delegates() {
        let polled = AtomicBool::new(false);
        let result = delegate_or_noop(Mode::Normal, "test_delegate", async {
            polled.store(true, Ordering::SeqCst);
            Ok(false)
        })
        .await;
        assert!(!result.unwrap());
        assert!(polled.load(Ordering::SeqCst));
    }
}
