//! Transaction call builder.
//!
//! Turns a confirmed selection into the ordered call list submitted as one
//! multi-call: swap calls for every non-settlement token, then `approve` on
//! the settlement token, then `deposit` on the deposit contract.

use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use swapck_sdk::objects::{BuildRequest, Call, Felt, QuoteId, QuoteRequest};
use thiserror::Error;
use tracing::{debug, info};

use crate::pricing::SettlementPrice;
use crate::quotes::QuoteSnapshot;
use crate::selection::{TokenToPayWith, proportional_ceil};
use crate::sources::{QuoteSource, SourceError};

#[derive(Debug, Error)]
pub enum CallBuildError {
    #[error("nothing selected to pay with")]
    Empty,

    #[error("no quote for token {0}")]
    MissingQuote(Felt),

    #[error("cannot size the swap for token {0}")]
    Arithmetic(Felt),

    #[error("aggregator error: {0}")]
    Source(#[from] SourceError),
}

/// The calls of one payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    /// Aggregator swap calls, empty when paying in the settlement token.
    pub prepended_swap_calls: Vec<Call>,
    pub approve: Call,
    pub deposit: Call,
}

impl PreparedTransaction {
    /// Every call, in execution order.
    pub fn calls(&self) -> Vec<Call> {
        let mut calls = self.prepended_swap_calls.clone();
        calls.push(self.approve.clone());
        calls.push(self.deposit.clone());
        calls
    }
}

pub struct CallBuilder<'a> {
    pub source: &'a dyn QuoteSource,
    pub price: &'a SettlementPrice,
    pub deposit_address: Felt,
    pub taker: Felt,
    pub slippage: Decimal,
    pub include_approve: bool,
}

impl CallBuilder<'_> {
    /// Build the call list for `selection`.
    ///
    /// `total` is the session total the contributions add up to.
    pub async fn build(
        &self,
        selection: &[TokenToPayWith],
        quotes: &QuoteSnapshot,
        total: Decimal,
    ) -> Result<PreparedTransaction, CallBuildError> {
        if selection.is_empty() {
            return Err(CallBuildError::Empty);
        }

        let settlement = self.price.settlement_address();
        let swaps = selection
            .iter()
            .filter(|entry| entry.token != settlement)
            .map(|entry| self.swap_calls(entry, quotes, total));
        let prepended_swap_calls: Vec<Call> =
            try_join_all(swaps).await?.into_iter().flatten().collect();

        let prepared = PreparedTransaction {
            prepended_swap_calls,
            approve: self.price.approve_call(self.deposit_address),
            deposit: self.price.deposit_call(self.deposit_address),
        };
        info!(
            swaps = prepared.prepended_swap_calls.len(),
            amount = %self.price.base_units,
            "Prepared payment calls"
        );
        Ok(prepared)
    }

    async fn swap_calls(
        &self,
        entry: &TokenToPayWith,
        quotes: &QuoteSnapshot,
        total: Decimal,
    ) -> Result<Vec<Call>, CallBuildError> {
        let quote_id = self.quote_for(entry, quotes, total).await?;
        let built = self
            .source
            .build(&BuildRequest {
                quote_id,
                taker_address: self.taker,
                slippage: self.slippage,
                include_approve: self.include_approve,
            })
            .await?;
        Ok(built.calls)
    }

    /// The refreshed quote covers the whole total. A token paying only part
    /// of it is re-quoted for its proportional sell amount.
    async fn quote_for(
        &self,
        entry: &TokenToPayWith,
        quotes: &QuoteSnapshot,
        total: Decimal,
    ) -> Result<QuoteId, CallBuildError> {
        let token = entry.token;
        let full = quotes
            .get(&token)
            .ok_or(CallBuildError::MissingQuote(token))?;

        if entry.amount >= total {
            return Ok(entry
                .quote_id
                .clone()
                .unwrap_or_else(|| full.quote_id.clone()));
        }

        let sell_amount = proportional_ceil(full.sell_amount, entry.amount, total)
            .ok_or(CallBuildError::Arithmetic(token))?;
        let request = QuoteRequest::new(token, self.price.settlement_address(), sell_amount)
            .with_taker(self.taker);
        let partial = self.source.best_quote(&request).await?;
        debug!(%token, %sell_amount, quote_id = %partial.quote_id, "Re-quoted partial contribution");
        Ok(partial.quote_id)
    }
}
