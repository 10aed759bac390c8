//! Quote refresher.
//!
//! For every token the wallet holds (other than the settlement token) the
//! refresher asks the aggregator two chained questions:
//!
//! 1. how much of the token does the settlement amount, plus a small buffer,
//!    buy?
//! 2. what does selling exactly that much of the token return in the
//!    settlement token?
//!
//! The second quote is the one kept: its `sell_amount` is what the buyer must
//! spend to cover the price, and its id can be built into swap calls.

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swapck_sdk::objects::{Balance, Felt, Quote, QuoteRequest, TokenList, U256};
use swapck_sdk::units::apply_buffer_bps;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{QuoteBook, QuoteSnapshot};
use crate::sources::{QuoteSource, SourceError};
use crate::utils::intervals::fixed_ticker;

/// What every quote of a cycle is priced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteParams {
    pub settlement_token: Felt,
    /// Session total in settlement base units.
    pub settlement_amount: U256,
    /// The connected wallet.
    pub taker: Felt,
    pub buffer_bps: u32,
}

/// Run the two chained quote requests for one token.
pub async fn quote_token(
    source: &dyn QuoteSource,
    params: &QuoteParams,
    token: Felt,
) -> Result<Quote, SourceError> {
    let forward = QuoteRequest::new(
        params.settlement_token,
        token,
        apply_buffer_bps(params.settlement_amount, params.buffer_bps),
    )
    .with_taker(params.taker);
    let amount_needed = source.best_quote(&forward).await?.buy_amount;

    let reverse =
        QuoteRequest::new(token, params.settlement_token, amount_needed).with_taker(params.taker);
    source.best_quote(&reverse).await
}

/// Quote every held, listed, non-settlement token concurrently.
///
/// Tokens whose requests fail are logged and simply have no quote.
pub async fn fetch_cycle(
    source: &dyn QuoteSource,
    params: &QuoteParams,
    balances: &[Balance],
    tokens: &TokenList,
) -> HashMap<Felt, Quote> {
    let candidates = balances.iter().filter(|b| {
        b.address != params.settlement_token
            && !b.is_empty()
            && tokens.by_address(b.address).is_some()
    });

    let requests = candidates.map(|b| async move {
        let result = quote_token(source, params, b.address).await;
        (b.address, result)
    });

    let mut quotes = HashMap::new();
    for (token, result) in join_all(requests).await {
        match result {
            Ok(quote) => {
                quotes.insert(token, quote);
            }
            Err(e) => {
                warn!(%token, error = %e, "Failed to quote token, leaving it unpriced");
            }
        }
    }
    quotes
}

/// Periodically refreshes a [`QuoteBook`] for one wallet.
///
/// A refresher is bound to one wallet address and balance set. When either
/// changes the owner cancels it and starts a new one.
pub struct QuoteRefresher {
    source: Arc<dyn QuoteSource>,
    book: QuoteBook,
    params: QuoteParams,
    balances: Arc<[Balance]>,
    tokens: Arc<TokenList>,
    interval: Duration,
}

impl QuoteRefresher {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        book: QuoteBook,
        params: QuoteParams,
        balances: Arc<[Balance]>,
        tokens: Arc<TokenList>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            book,
            params,
            balances,
            tokens,
            interval,
        }
    }

    /// Run one refresh cycle and publish it. Returns whether the result was
    /// newer than the book's current snapshot.
    pub async fn refresh_once(&self) -> bool {
        let cycle = self.book.begin_cycle();
        let quotes = fetch_cycle(
            self.source.as_ref(),
            &self.params,
            &self.balances,
            &self.tokens,
        )
        .await;
        let quoted = quotes.len();
        let published = self.book.publish(QuoteSnapshot::new(cycle, quotes));
        debug!(cycle, quoted, published, taker = %self.params.taker, "Quote refresh cycle done");
        published
    }

    /// Refresh immediately, then every `interval`, until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = fixed_ticker(self.interval);
        info!(
            taker = %self.params.taker,
            interval_ms = self.interval.as_millis() as u64,
            "Quote refresher started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    // A cancel arriving mid-cycle drops the cycle unpublished.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.refresh_once() => {}
                    }
                }
            }
        }

        info!(taker = %self.params.taker, "Quote refresher stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BUYER, FakeQuotes, eth, strk, token_list, usdc};

    // 1 USDC = 5e8 wei, i.e. 2000 USDC per ETH.
    fn market() -> FakeQuotes {
        FakeQuotes::default()
            .with_rate(usdc().address, eth().address, 500_000_000, 1)
            .with_rate(eth().address, usdc().address, 1, 500_000_000)
    }

    fn params() -> QuoteParams {
        QuoteParams {
            settlement_token: usdc().address,
            settlement_amount: U256::from(100_000_000u64),
            taker: Felt::from(BUYER),
            buffer_bps: 100,
        }
    }

    fn balance(token: Felt, amount: u64) -> Balance {
        Balance {
            address: token,
            balance: U256::from(amount),
        }
    }

    #[tokio::test]
    async fn chained_quote_uses_buffered_amount() {
        let source = market();
        let quote = quote_token(&source, &params(), eth().address).await.unwrap();

        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        // 100 USDC + 1 %
        assert_eq!(requests[0].sell_amount, U256::from(101_000_000u64));
        assert_eq!(requests[0].sell_token_address, usdc().address);
        assert_eq!(requests[1].sell_token_address, eth().address);
        assert_eq!(requests[1].sell_amount, U256::from(50_500_000_000_000_000u64));
        assert_eq!(requests[1].taker_address, Some(Felt::from(BUYER)));

        assert_eq!(quote.sell_amount, U256::from(50_500_000_000_000_000u64));
        assert_eq!(quote.buy_amount, U256::from(101_000_000u64));
    }

    #[tokio::test]
    async fn cycle_skips_settlement_empty_and_unlisted_tokens() {
        let source = market();
        let balances = [
            balance(usdc().address, 1_000),
            balance(eth().address, 1_000),
            balance(strk().address, 0),
            balance(Felt::from(0x777u64), 1_000),
        ];

        let quotes = fetch_cycle(&source, &params(), &balances, &token_list()).await;

        assert_eq!(quotes.len(), 1);
        assert!(quotes.contains_key(&eth().address));
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn failing_token_degrades_to_no_quote() {
        let source = market().failing(strk().address);
        let balances = [balance(eth().address, 1), balance(strk().address, 1)];

        let quotes = fetch_cycle(&source, &params(), &balances, &token_list()).await;

        assert!(quotes.contains_key(&eth().address));
        assert!(!quotes.contains_key(&strk().address));
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_interval_until_cancelled() {
        let source = Arc::new(market());
        let book = QuoteBook::new();
        let refresher = QuoteRefresher::new(
            source.clone(),
            book.clone(),
            params(),
            Arc::from(vec![balance(eth().address, 1)]),
            Arc::new(token_list()),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        let handle = refresher.spawn(cancel.clone());

        // Cycles at 0 s, 5 s and 10 s.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(source.requests().len(), 6);
        assert_eq!(book.current().cycle(), 3);
        assert!(book.current().get(&eth().address).is_some());

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.requests().len(), 6);
    }
}
