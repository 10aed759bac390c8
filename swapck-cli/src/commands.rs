//! Subcommands. Each one drives a [`CheckoutView`] (or a single client call)
//! and prints what a checkout page would show.

use anyhow::{Context as _, bail};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use swapck_core::checkout::{BillingDetails, CheckoutError, CheckoutSources, CheckoutView, PaymentOutcome};
use swapck_core::config::CheckoutConfig;
use swapck_core::events::{CheckoutEvent, CheckoutEventReceiver, checkout_event_channel};
use swapck_core::pricing::{SettlementPrice, resolve_settlement_price};
use swapck_core::quotes::QuoteSnapshot;
use swapck_sdk::client::{AggregatorClient, SessionClient, StarknetRpcClient};
use swapck_sdk::objects::{ContactInformation, Felt, SessionStatus, ShippingAddress, Token, TokenList, U256};
use swapck_sdk::units::{format_significant, from_base_units};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::LoadedConfig;
use crate::wallet::ManualWallet;

/// Significant digits shown for token amounts.
const DISPLAY_DIGITS: u32 = 6;

/// Everything a command needs, built once from the loaded configuration.
pub struct Context {
    pub sessions: SessionClient,
    pub aggregator: AggregatorClient,
    pub rpc: StarknetRpcClient,
    pub tokens: Arc<TokenList>,
    pub checkout: CheckoutConfig,
    pub default_address: Option<Felt>,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: LoadedConfig, cancel: CancellationToken) -> Self {
        Self {
            sessions: SessionClient::new(config.api_url, config.db_name),
            aggregator: AggregatorClient::new(config.aggregator_url),
            rpc: StarknetRpcClient::new(config.rpc_url),
            tokens: Arc::new(config.tokens),
            checkout: config.checkout,
            default_address: config.wallet_address,
            cancel,
        }
    }

    fn sources(&self, wallet: ManualWallet) -> CheckoutSources {
        CheckoutSources {
            sessions: Arc::new(self.sessions.clone()),
            quotes: Arc::new(self.aggregator.clone()),
            balances: Arc::new(self.rpc.clone()),
            wallet: Arc::new(wallet),
        }
    }

    fn address(&self, given: Option<Felt>) -> anyhow::Result<Felt> {
        given
            .or(self.default_address)
            .context("no wallet address, pass --address or set [wallet].address")
    }

    /// Load a checkout, or `None` when the session is already paid.
    async fn open(
        &self,
        session_id: &str,
        wallet: ManualWallet,
    ) -> anyhow::Result<Option<(CheckoutView, CheckoutEventReceiver)>> {
        let (events, rx) = checkout_event_channel();
        match CheckoutView::load(
            session_id,
            self.sources(wallet),
            self.tokens.clone(),
            self.checkout.clone(),
            events,
        )
        .await
        {
            Ok(view) => Ok(Some((view, rx))),
            Err(CheckoutError::AlreadyPaid) => {
                println!("Session {session_id} is already paid.");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Print the session and its price.
pub async fn show(ctx: &Context, session_id: &str) -> anyhow::Result<()> {
    let session = ctx.sessions.get_session(session_id).await?;
    let price =
        resolve_settlement_price(&session, &ctx.tokens, &ctx.aggregator, &ctx.checkout.usd_ticker)
            .await?;

    println!("Session  {}", session.session_id);
    println!("Status   {}", session.status);
    for item in &session.line_items {
        println!(
            "  {} x{}  {} {}",
            item.name,
            item.quantity,
            item.subtotal(),
            item.currency
        );
    }
    print_total(&price, &ctx.checkout.usd_ticker);
    if session.requires_shipping() {
        println!("Shipping address required");
    }
    if session.requires_contact() {
        println!("Contact information required");
    }
    if session.is_recurring() {
        println!("Recurring payment, run `swapck qr {session_id}` for the subscription code");
    }
    Ok(())
}

/// Print the amount of every held token needed to pay, refreshed each cycle.
pub async fn quotes(
    ctx: &Context,
    session_id: &str,
    address: Option<Felt>,
    once: bool,
) -> anyhow::Result<()> {
    let address = ctx.address(address)?;
    let Some((mut view, _events)) = ctx
        .open(session_id, ManualWallet::stdio(address, true))
        .await?
    else {
        return Ok(());
    };
    view.change_address(address).await;
    print_total(view.price(), &ctx.checkout.usd_ticker);

    let first = tokio::select! {
        _ = ctx.cancel.cancelled() => return Ok(()),
        snapshot = view.wait_for_quotes() => snapshot,
    };
    print_quotes(&view, &first);
    if once {
        return Ok(());
    }

    let mut last = first.cycle();
    let mut stream = view.quote_stream();
    loop {
        let snapshot = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(snapshot) => snapshot,
                None => break,
            },
        };
        if snapshot.cycle() > last {
            last = snapshot.cycle();
            print_quotes(&view, &snapshot);
        }
    }
    view.shutdown();
    Ok(())
}

/// Options of the `pay` command.
#[derive(Debug, Clone, Default)]
pub struct PayOptions {
    pub address: Option<Felt>,
    /// Tickers or addresses, at most two.
    pub tokens: Vec<String>,
    /// Contribution of the first token when paying with two.
    pub split: Option<Decimal>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// JSON file holding the shipping address.
    pub shipping: Option<PathBuf>,
    pub dry_run: bool,
}

/// Select tokens, confirm, submit and wait for the redirect.
pub async fn pay(ctx: &Context, session_id: &str, options: PayOptions) -> anyhow::Result<()> {
    let details = billing_details(&options).await?;

    let status = ctx.sessions.get_session_status(session_id).await?;
    let info_only = status == SessionStatus::JustRequiringInfo;
    let wallet_address = if info_only {
        options.address.or(ctx.default_address).unwrap_or(Felt::ZERO)
    } else {
        ctx.address(options.address)?
    };

    let Some((mut view, mut events)) = ctx
        .open(session_id, ManualWallet::stdio(wallet_address, options.dry_run))
        .await?
    else {
        return Ok(());
    };

    if !info_only {
        if options.tokens.is_empty() {
            bail!("choose what to pay with, e.g. --tokens USDC or --tokens ETH,USDC");
        }
        view.connect_wallet().await?;
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(()),
            snapshot = view.wait_for_quotes() => print_quotes(&view, &snapshot),
        }

        for arg in &options.tokens {
            let token = resolve_token(&ctx.tokens, arg)?;
            view.toggle_token(token.address)
                .with_context(|| format!("cannot pay with {}", token.ticker))?;
        }
        if let Some(first) = options.split {
            let second = view.set_split(first)?;
            tracing::debug!(%first, %second, "Split set");
        }
        for (token, amount) in view.selection().contributions() {
            let ticker = ctx
                .tokens
                .by_address(token)
                .map(|t| t.ticker.as_str())
                .unwrap_or("?");
            println!(
                "Paying {amount} {} with {ticker}",
                view.session().total_price_token
            );
        }
    }

    match view.pay(&details).await? {
        PaymentOutcome::Paid {
            tx_hash,
            billing_reported,
        } => {
            println!("Transaction {tx_hash}");
            if !billing_reported && !details.is_empty() {
                println!("Paid, but the billing details could not be recorded.");
            }
        }
        PaymentOutcome::InfoSubmitted { billing_reported } => {
            if !billing_reported && !details.is_empty() {
                bail!("failed to submit your details, please try again");
            }
            println!("Details submitted.");
        }
    }

    if let Some(url) = follow_events(&mut events, &ctx.cancel).await {
        println!("Continue at {url}");
    }
    view.shutdown();
    Ok(())
}

/// Wait for the session to be paid from anywhere, then print the redirect.
pub async fn watch(ctx: &Context, session_id: &str) -> anyhow::Result<()> {
    let address = ctx.default_address.unwrap_or(Felt::ZERO);
    let Some((mut view, mut events)) = ctx
        .open(session_id, ManualWallet::stdio(address, true))
        .await?
    else {
        return Ok(());
    };
    println!("Waiting for session {session_id} to be paid...");
    if let Some(url) = follow_events(&mut events, &ctx.cancel).await {
        println!("Continue at {url}");
    }
    view.shutdown();
    Ok(())
}

/// Print the subscription QR payload of a recurring session.
pub async fn qr(ctx: &Context, session_id: &str) -> anyhow::Result<()> {
    let session = ctx.sessions.get_session(session_id).await?;
    let price = SettlementPrice::from_session(&session, &ctx.tokens)?;
    let Some(payload) = price.recurring_payload(&session) else {
        bail!("session {session_id} is not a recurring payment");
    };
    println!("{}", payload.to_qr_content()?);
    Ok(())
}

// -- Helpers ------------------------------------------------------------------

async fn follow_events(
    events: &mut CheckoutEventReceiver,
    cancel: &CancellationToken,
) -> Option<String> {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return None,
            event = events.recv() => event?,
        };
        match event {
            CheckoutEvent::TransactionSubmitted { tx_hash } => {
                tracing::info!(%tx_hash, "Waiting for the payment to be confirmed");
            }
            CheckoutEvent::Success { session_id } => {
                println!("Payment successful for session {session_id}");
            }
            CheckoutEvent::Redirect { url } => return Some(url),
        }
    }
}

async fn billing_details(options: &PayOptions) -> anyhow::Result<BillingDetails> {
    let shipping_address = match &options.shipping {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {path:?}"))?;
            Some(
                serde_json::from_str::<ShippingAddress>(&raw)
                    .with_context(|| format!("invalid shipping address in {path:?}"))?,
            )
        }
        None => None,
    };
    let contact_information = options.email.as_ref().map(|email| ContactInformation {
        email: email.clone(),
        phone: options.phone.clone(),
    });
    Ok(BillingDetails {
        shipping_address,
        contact_information,
    })
}

fn resolve_token<'a>(tokens: &'a TokenList, arg: &str) -> anyhow::Result<&'a Token> {
    if let Some(token) = tokens.by_ticker(arg) {
        return Ok(token);
    }
    let address: Felt = arg
        .parse()
        .with_context(|| format!("{arg} is neither a listed ticker nor an address"))?;
    tokens
        .by_address(address)
        .with_context(|| format!("token {address} is not in the token list"))
}

fn human(amount: U256, token: &Token) -> String {
    match from_base_units(amount, token.decimals) {
        Ok(value) => format_significant(value, DISPLAY_DIGITS),
        Err(_) => format!("{amount} base units"),
    }
}

fn print_total(price: &SettlementPrice, usd_ticker: &str) {
    match price.usd {
        Some(usd) if price.token.ticker != usd_ticker => println!(
            "Total    {} {} (~${})",
            price.total,
            price.token.ticker,
            usd.round_dp(2)
        ),
        _ => println!("Total    {} {}", price.total, price.token.ticker),
    }
}

fn print_quotes(view: &CheckoutView, snapshot: &QuoteSnapshot) {
    let settlement = view.price().settlement_address();
    println!("Quotes (cycle {}, {})", snapshot.cycle(), snapshot.fetched_at());
    for balance in view.balances() {
        let Some(token) = view.tokens().by_address(balance.address) else {
            continue;
        };
        let required = if balance.address == settlement {
            Some(view.price().base_units)
        } else {
            snapshot.get(&balance.address).map(|q| q.sell_amount)
        };
        let status = match required {
            Some(required) if balance.balance >= required => {
                format!("needs {}", human(required, token))
            }
            Some(required) => format!("needs {} (insufficient)", human(required, token)),
            None => "no quote".to_owned(),
        };
        println!(
            "  {:<6} balance {:<14} {status}",
            token.ticker,
            human(balance.balance, token)
        );
    }
}
