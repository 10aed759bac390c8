//! Session status poller.
//!
//! Polls the backend on a fixed interval until the session is paid, then
//! announces success and, after the redirect delay, the redirect.

use std::sync::Arc;
use std::time::Duration;
use swapck_sdk::objects::SessionStatus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{CheckoutEventSender, Completion, announce_completion};
use crate::sources::SessionSource;
use crate::utils::intervals::fixed_ticker;

pub struct StatusPoller {
    source: Arc<dyn SessionSource>,
    session_id: String,
    success_url: String,
    interval: Duration,
    redirect_delay: Duration,
    events: CheckoutEventSender,
    completion: Completion,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn SessionSource>,
        session_id: impl Into<String>,
        success_url: impl Into<String>,
        interval: Duration,
        redirect_delay: Duration,
        events: CheckoutEventSender,
        completion: Completion,
    ) -> Self {
        Self {
            source,
            session_id: session_id.into(),
            success_url: success_url.into(),
            interval,
            redirect_delay,
            events,
            completion,
        }
    }

    /// Poll until the session completes or `cancel` fires.
    ///
    /// Failed polls are logged and retried on the next tick.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = fixed_ticker(self.interval);
        info!(session_id = %self.session_id, "Status poller started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(session_id = %self.session_id, "Status poller cancelled");
                    return;
                }

                _ = ticker.tick() => {}
            }

            if self.completion.is_claimed() {
                debug!(session_id = %self.session_id, "Completion already announced, poller done");
                return;
            }

            match self.source.status(&self.session_id).await {
                Ok(SessionStatus::Completed) => {
                    announce_completion(
                        &self.completion,
                        &self.events,
                        &self.session_id,
                        &self.success_url,
                        self.redirect_delay,
                        &cancel,
                    )
                    .await;
                    return;
                }
                Ok(status) => {
                    debug!(session_id = %self.session_id, %status, "Session not paid yet");
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Status poll failed");
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
