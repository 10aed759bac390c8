//! Settlement pricing: what the session costs in the settlement token.

use compact_str::CompactString;
use rust_decimal::Decimal;
use swapck_sdk::objects::{Call, Felt, QuoteRequest, RecurringPayload, Session, Token, TokenList, U256};
use swapck_sdk::units::{UnitError, from_base_units, to_base_units};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sources::QuoteSource;

/// Identifier passed to the deposit contract's `deposit` entry point.
pub const DEPOSIT_ID: u64 = 1;

#[derive(Debug, Error)]
pub enum PricingError {
    /// The session is priced in a token missing from the token list
    #[error("session currency {0} is not in the token list")]
    UnknownCurrency(CompactString),

    #[error("cannot express the total in base units: {0}")]
    Units(#[from] UnitError),
}

/// The session total expressed in the settlement token.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPrice {
    pub token: Token,
    /// Human amount, as stated by the session.
    pub total: Decimal,
    /// `total * 10^decimals`.
    pub base_units: U256,
    /// USD equivalent, when it could be quoted.
    pub usd: Option<Decimal>,
}

impl SettlementPrice {
    /// Price the session without any USD lookup.
    pub fn from_session(session: &Session, tokens: &TokenList) -> Result<Self, PricingError> {
        let token = tokens
            .by_ticker(&session.total_price_token)
            .ok_or_else(|| PricingError::UnknownCurrency(session.total_price_token.clone()))?;
        let base_units = to_base_units(session.total_price, token.decimals)?;
        Ok(Self {
            token: token.clone(),
            total: session.total_price,
            base_units,
            usd: None,
        })
    }

    pub fn settlement_address(&self) -> Felt {
        self.token.address
    }

    /// `approve(spender, total)` on the settlement token.
    pub fn approve_call(&self, spender: Felt) -> Call {
        Call::approve(self.token.address, spender, self.base_units)
    }

    /// `deposit(DEPOSIT_ID, total)` on the deposit contract.
    pub fn deposit_call(&self, deposit_address: Felt) -> Call {
        Call::deposit(deposit_address, DEPOSIT_ID, self.base_units)
    }

    /// QR payload for recurring sessions; `None` for one-time payments.
    pub fn recurring_payload(&self, session: &Session) -> Option<RecurringPayload> {
        session.is_recurring().then(|| {
            RecurringPayload::monthly(
                session.session_id.clone(),
                self.deposit_call(session.deposit_address),
            )
        })
    }
}

/// Price the session and look up its USD equivalent.
///
/// When the settlement token is the USD token itself the total is its own
/// USD value. Otherwise one settlement -> USD quote is requested; a failed
/// lookup only leaves `usd` empty.
pub async fn resolve_settlement_price(
    session: &Session,
    tokens: &TokenList,
    quotes: &dyn QuoteSource,
    usd_ticker: &str,
) -> Result<SettlementPrice, PricingError> {
    let mut price = SettlementPrice::from_session(session, tokens)?;

    if price.token.ticker == usd_ticker {
        price.usd = Some(price.total);
        return Ok(price);
    }

    let Some(usd_token) = tokens.by_ticker(usd_ticker) else {
        warn!(usd_ticker, "USD token not in token list, skipping USD equivalent");
        return Ok(price);
    };

    let request = QuoteRequest::new(price.token.address, usd_token.address, price.base_units);
    price.usd = match quotes.best_quote(&request).await {
        Ok(quote) => match from_base_units(quote.buy_amount, usd_token.decimals) {
            Ok(usd) => Some(usd),
            Err(e) => {
                warn!(error = %e, "USD quote out of range");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "Failed to quote USD equivalent");
            None
        }
    };
    debug!(
        session_id = %session.session_id,
        token = %price.token.ticker,
        base_units = %price.base_units,
        usd = ?price.usd,
        "Resolved settlement price"
    );
    Ok(price)
}
