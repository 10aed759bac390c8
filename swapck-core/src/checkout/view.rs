//! State of one checkout, from session load to redirect.

use rust_decimal::Decimal;
use std::sync::Arc;
use swapck_sdk::objects::{
    AddBillingAddressRequest, Balance, Felt, RecurringPayload, Session, SessionStatus, TokenList,
};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::CheckoutError;
use super::pipeline::{
    BillingDetails, PaymentOutcome, report_billing, submit, validate_required_fields,
};
use crate::calls::CallBuilder;
use crate::config::CheckoutConfig;
use crate::events::{CheckoutEvent, CheckoutEventSender, Completion, announce_completion};
use crate::poller::StatusPoller;
use crate::pricing::{SettlementPrice, resolve_settlement_price};
use crate::quotes::{QuoteBook, QuoteParams, QuoteRefresher, QuoteSnapshot};
use crate::selection::{Selection, SelectionContext, SelectionError};
use crate::sources::{BalanceSource, QuoteSource, SessionSource, WalletConnector, fetch_balances};

/// The remote dependencies of a checkout.
#[derive(Clone)]
pub struct CheckoutSources {
    pub sessions: Arc<dyn SessionSource>,
    pub quotes: Arc<dyn QuoteSource>,
    pub balances: Arc<dyn BalanceSource>,
    pub wallet: Arc<dyn WalletConnector>,
}

/// A background task and the token that stops it.
struct Timer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Timer {
    fn stop(self) {
        self.cancel.cancel();
        drop(self.handle);
    }
}

/// Owned state of one checkout.
///
/// Every background task (quote refresher, status poller, redirect) runs
/// under a child of the view's cancellation token. Replacing a task cancels
/// its predecessor first, and dropping the view cancels them all.
pub struct CheckoutView {
    config: CheckoutConfig,
    sources: CheckoutSources,
    tokens: Arc<TokenList>,
    session: Session,
    price: SettlementPrice,
    address: Option<Felt>,
    balances: Arc<[Balance]>,
    book: QuoteBook,
    /// Cycle of the snapshot published when the current account was set.
    quotes_since: u64,
    selection: Selection,
    events: CheckoutEventSender,
    completion: Completion,
    /// Set once a payment or the info-only details went out.
    submitted: bool,
    cancel: CancellationToken,
    refresher: Option<Timer>,
    poller: Option<Timer>,
    redirect: Option<Timer>,
}

fn selection_context<'a>(
    price: &SettlementPrice,
    quotes: &'a QuoteSnapshot,
    balances: &'a [Balance],
) -> SelectionContext<'a> {
    SelectionContext {
        settlement_token: price.settlement_address(),
        settlement_amount: price.base_units,
        quotes,
        balances,
    }
}

impl CheckoutView {
    /// Fetch and price the session, then start polling its status.
    ///
    /// A session that is already completed is reported as
    /// [`CheckoutError::AlreadyPaid`] and nothing is started.
    pub async fn load(
        session_id: &str,
        sources: CheckoutSources,
        tokens: Arc<TokenList>,
        config: CheckoutConfig,
        events: CheckoutEventSender,
    ) -> Result<Self, CheckoutError> {
        let session = sources
            .sessions
            .session(session_id)
            .await
            .map_err(CheckoutError::Session)?;
        if session.is_completed() {
            info!(session_id, "Session already paid");
            return Err(CheckoutError::AlreadyPaid);
        }

        let price = resolve_settlement_price(
            &session,
            &tokens,
            sources.quotes.as_ref(),
            &config.usd_ticker,
        )
        .await?;
        let selection = Selection::new(
            session.total_price,
            config.slider_step,
            config.selection_error_ttl,
        );

        let mut view = Self {
            config,
            sources,
            tokens,
            session,
            price,
            address: None,
            balances: Arc::from(Vec::new()),
            book: QuoteBook::new(),
            quotes_since: 0,
            selection,
            events,
            completion: Completion::new(),
            submitted: false,
            cancel: CancellationToken::new(),
            refresher: None,
            poller: None,
            redirect: None,
        };
        view.start_poller();
        info!(
            session_id,
            status = %view.session.status,
            total = %view.session.total_price,
            currency = %view.session.total_price_token,
            "Checkout loaded"
        );
        Ok(view)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn price(&self) -> &SettlementPrice {
        &self.price
    }

    pub fn tokens(&self) -> &TokenList {
        &self.tokens
    }

    pub fn address(&self) -> Option<Felt> {
        self.address
    }

    pub fn balances(&self) -> &[Balance] {
        &self.balances
    }

    pub fn quotes(&self) -> Arc<QuoteSnapshot> {
        self.book.current()
    }

    pub fn quote_stream(&self) -> WatchStream<Arc<QuoteSnapshot>> {
        self.book.stream()
    }

    /// Wait for the first refresh cycle of the current account.
    pub async fn wait_for_quotes(&self) -> Arc<QuoteSnapshot> {
        let mut rx = self.book.subscribe();
        let since = self.quotes_since;
        if let Ok(snapshot) = rx.wait_for(|snapshot| snapshot.cycle() > since).await {
            return snapshot.clone();
        }
        self.book.current()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn recurring_payload(&self) -> Option<RecurringPayload> {
        self.price.recurring_payload(&self.session)
    }

    /// Select or deselect a token to pay with.
    pub fn toggle_token(&mut self, token: Felt) -> Result<(), SelectionError> {
        let quotes = self.book.current();
        let ctx = selection_context(&self.price, &quotes, &self.balances);
        self.selection.toggle(token, &ctx)
    }

    /// Set the first selected token's contribution.
    pub fn set_split(&mut self, first: Decimal) -> Result<Decimal, SelectionError> {
        self.selection.set_split(first)
    }

    pub fn is_confirmable(&self) -> bool {
        if self.submitted {
            return false;
        }
        let quotes = self.book.current();
        let ctx = selection_context(&self.price, &quotes, &self.balances);
        self.selection.can_confirm(&ctx, self.config.confirm_policy)
    }

    /// Connect the wallet and start pricing its tokens.
    pub async fn connect_wallet(&mut self) -> Result<Felt, CheckoutError> {
        let address = self
            .sources
            .wallet
            .connect()
            .await
            .map_err(CheckoutError::Wallet)?;
        self.change_address(address).await;
        Ok(address)
    }

    /// Switch to another wallet account.
    ///
    /// The previous refresher is cancelled before the new one starts, and
    /// the selection and quotes of the old account are dropped.
    pub async fn change_address(&mut self, address: Felt) {
        self.stop_refresher();
        self.selection.clear();
        self.book.clear();
        self.quotes_since = self.book.current().cycle();
        self.address = Some(address);

        let balances = fetch_balances(self.sources.balances.as_ref(), &self.tokens, address).await;
        self.balances = Arc::from(balances);
        info!(%address, tokens = self.balances.len(), "Wallet account changed");
        self.start_refresher(address);
    }

    pub async fn disconnect_wallet(&mut self) {
        self.stop_refresher();
        self.selection.clear();
        self.book.clear();
        self.address = None;
        self.balances = Arc::from(Vec::new());
        self.sources.wallet.disconnect().await;
        info!("Wallet disconnected");
    }

    /// Run one quote cycle now, outside the timer.
    pub async fn refresh_quotes(&self) -> bool {
        let Some(address) = self.address else {
            return false;
        };
        self.refresher_for(address).refresh_once().await
    }

    /// Run the payment pipeline.
    ///
    /// On success the outcome is returned immediately; the success and
    /// redirect events follow on the event channel. Once a transaction went
    /// out, later calls fail with [`CheckoutError::AlreadyPaid`].
    pub async fn pay(&mut self, details: &BillingDetails) -> Result<PaymentOutcome, CheckoutError> {
        if self.submitted || self.completion.is_claimed() {
            return Err(CheckoutError::AlreadyPaid);
        }
        validate_required_fields(&self.session, details)?;

        if self.session.status == SessionStatus::JustRequiringInfo {
            self.submitted = true;
            let billing_reported = self
                .report(details, AddBillingAddressRequest::MANUAL_TX_HASH)
                .await;
            self.start_redirect();
            return Ok(PaymentOutcome::InfoSubmitted { billing_reported });
        }

        let taker = self.address.ok_or(CheckoutError::WalletNotConnected)?;
        let quotes = self.book.current();
        let ctx = selection_context(&self.price, &quotes, &self.balances);
        let confirmed = self.selection.confirm(&ctx, self.config.confirm_policy)?;

        let builder = CallBuilder {
            source: self.sources.quotes.as_ref(),
            price: &self.price,
            deposit_address: self.session.deposit_address,
            taker,
            slippage: self.config.slippage,
            include_approve: self.config.include_approve,
        };
        let prepared = builder
            .build(&confirmed, &quotes, self.session.total_price)
            .await?;

        let tx_hash = submit(self.sources.wallet.as_ref(), &prepared.calls()).await?;
        self.submitted = true;
        self.stop_refresher();
        let submitted = CheckoutEvent::TransactionSubmitted {
            tx_hash: tx_hash.clone(),
        };
        if let Err(e) = self.events.send(submitted).await {
            warn!(error = %e, "Failed to send TransactionSubmitted, receiver dropped");
        }

        let billing_reported = self.report(details, &tx_hash).await;
        self.start_redirect();
        Ok(PaymentOutcome::Paid {
            tx_hash,
            billing_reported,
        })
    }

    /// Cancel every background task.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.refresher = None;
        self.poller = None;
        self.redirect = None;
    }

    // -- Private helpers ----------------------------------------------------

    async fn report(&self, details: &BillingDetails, tx_hash: &str) -> bool {
        if details.is_empty() {
            debug!(session_id = %self.session.session_id, "No billing details entered, skipping report");
            return false;
        }
        match report_billing(
            self.sources.sessions.as_ref(),
            &self.session.session_id,
            details,
            tx_hash,
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(session_id = %self.session.session_id, error = %e, "Billing report failed");
                false
            }
        }
    }

    fn refresher_for(&self, taker: Felt) -> QuoteRefresher {
        QuoteRefresher::new(
            self.sources.quotes.clone(),
            self.book.clone(),
            QuoteParams {
                settlement_token: self.price.settlement_address(),
                settlement_amount: self.price.base_units,
                taker,
                buffer_bps: self.config.quote_buffer_bps,
            },
            self.balances.clone(),
            self.tokens.clone(),
            self.config.quote_refresh_interval,
        )
    }

    fn start_refresher(&mut self, taker: Felt) {
        let cancel = self.cancel.child_token();
        let handle = self.refresher_for(taker).spawn(cancel.clone());
        self.refresher = Some(Timer { cancel, handle });
    }

    fn stop_refresher(&mut self) {
        if let Some(timer) = self.refresher.take() {
            timer.stop();
        }
    }

    fn start_poller(&mut self) {
        let cancel = self.cancel.child_token();
        let poller = StatusPoller::new(
            self.sources.sessions.clone(),
            self.session.session_id.clone(),
            self.session.success_url.clone(),
            self.config.status_poll_interval,
            self.config.redirect_delay,
            self.events.clone(),
            self.completion.clone(),
        );
        let handle = poller.spawn(cancel.clone());
        self.poller = Some(Timer { cancel, handle });
    }

    fn start_redirect(&mut self) {
        let cancel = self.cancel.child_token();
        let completion = self.completion.clone();
        let events = self.events.clone();
        let session_id = self.session.session_id.clone();
        let success_url = self.session.success_url.clone();
        let delay = self.config.redirect_delay;
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            announce_completion(
                &completion,
                &events,
                &session_id,
                &success_url,
                delay,
                &task_cancel,
            )
            .await;
        });
        self.redirect = Some(Timer { cancel, handle });
    }
}

impl Drop for CheckoutView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
