//! Checkout events and their channel.
//!
//! Components never talk to the front-end directly. They push
//! [`CheckoutEvent`]s into one mpsc channel that the front-end drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default buffer size for the checkout event channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Something the buyer should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// The wallet accepted the transaction.
    TransactionSubmitted { tx_hash: String },
    /// The session is paid (or its information was submitted).
    Success { session_id: String },
    /// Navigate to the merchant's success page.
    Redirect { url: String },
}

/// Sender handle for checkout events.
pub type CheckoutEventSender = mpsc::Sender<CheckoutEvent>;
/// Receiver handle for checkout events.
pub type CheckoutEventReceiver = mpsc::Receiver<CheckoutEvent>;

/// Create a new checkout event channel.
pub fn checkout_event_channel() -> (CheckoutEventSender, CheckoutEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// One-shot latch making sure success is announced once per checkout, no
/// matter whether the payment flow or the status poller sees it first.
#[derive(Debug, Clone, Default)]
pub struct Completion(Arc<AtomicBool>);

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller only.
    pub fn claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Emit `Success`, wait `redirect_delay`, then emit `Redirect`.
///
/// Does nothing if another task already announced completion. Cancelling
/// `cancel` during the delay suppresses the redirect.
pub async fn announce_completion(
    completion: &Completion,
    events: &CheckoutEventSender,
    session_id: &str,
    success_url: &str,
    redirect_delay: Duration,
    cancel: &CancellationToken,
) {
    if !completion.claim() {
        return;
    }

    info!(session_id, "Checkout completed");
    let success = CheckoutEvent::Success {
        session_id: session_id.to_owned(),
    };
    if let Err(e) = events.send(success).await {
        warn!(error = %e, "Failed to send success event, receiver dropped");
        return;
    }

    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!(session_id, "Redirect cancelled");
        }

        _ = tokio::time::sleep(redirect_delay) => {
            let redirect = CheckoutEvent::Redirect {
                url: success_url.to_owned(),
            };
            if let Err(e) = events.send(redirect).await {
                warn!(error = %e, "Failed to send redirect event, receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn completion_is_claimed_once() {
        let completion = Completion::new();
        let other = completion.clone();
        assert!(completion.claim());
        assert!(!other.claim());
        assert!(other.is_claimed());
    }

    #[tokio::test(start_paused = true)]
    async fn success_then_redirect_after_delay() {
        let (tx, mut rx) = checkout_event_channel();
        let completion = Completion::new();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        announce_completion(
            &completion,
            &tx,
            "cs_1",
            "https://shop.example/ok",
            Duration::from_secs(5),
            &cancel,
        )
        .await;

        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(
            rx.recv().await,
            Some(CheckoutEvent::Success {
                session_id: "cs_1".into()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(CheckoutEvent::Redirect {
                url: "https://shop.example/ok".into()
            })
        );

        // A second announcement is swallowed.
        announce_completion(&completion, &tx, "cs_1", "x", Duration::ZERO, &cancel).await;
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_suppresses_redirect() {
        let (tx, mut rx) = checkout_event_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        announce_completion(&Completion::new(), &tx, "cs_1", "u", Duration::from_secs(5), &cancel)
            .await;
        drop(tx);

        assert!(matches!(rx.recv().await, Some(CheckoutEvent::Success { .. })));
        assert_eq!(rx.recv().await, None);
    }
}
