//! Seams between the checkout logic and the outside world.
//!
//! Every remote dependency is reached through one of these traits so the
//! reconciler can run against the real HTTP clients or against in-memory
//! fakes.

use async_trait::async_trait;
use futures_util::future::join_all;
use swapck_sdk::client::{AggregatorClient, ClientError, SessionClient, StarknetRpcClient};
use swapck_sdk::objects::{
    AddBillingAddressRequest, Balance, BuildRequest, BuiltTransaction, Call, Felt, Quote,
    QuoteRequest, Session, SessionStatus, TokenList, U256,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// SDK client failure
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The aggregator returned no route
    #[error("no quote available")]
    NoQuote,

    /// No wallet is connected
    #[error("wallet not connected")]
    NotConnected,

    /// The wallet refused to execute
    #[error("wallet rejected the request: {0}")]
    Rejected(String),

    /// Anything else a source cannot fulfil
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Checkout backend: sessions, billing details and invoices.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn session(&self, session_id: &str) -> Result<Session, SourceError>;

    async fn status(&self, session_id: &str) -> Result<SessionStatus, SourceError>;

    async fn add_billing_address(
        &self,
        request: &AddBillingAddressRequest,
    ) -> Result<(), SourceError>;

    async fn send_email_invoice(&self, session_id: &str) -> Result<(), SourceError>;
}

/// Swap aggregator: quotes and executable swap calls.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// All routes for a pair, best first.
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, SourceError>;

    async fn build(&self, request: &BuildRequest) -> Result<BuiltTransaction, SourceError>;

    /// The first route, or [`SourceError::NoQuote`].
    async fn best_quote(&self, request: &QuoteRequest) -> Result<Quote, SourceError> {
        self.quotes(request)
            .await?
            .into_iter()
            .next()
            .ok_or(SourceError::NoQuote)
    }
}

/// On-chain token balances.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance_of(&self, token: Felt, owner: Felt) -> Result<U256, SourceError>;
}

/// The buyer's wallet.
///
/// Signing and account management stay inside the wallet; the checkout only
/// learns the address and hands over the ordered call list.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Ask the wallet to connect and return the account address.
    async fn connect(&self) -> Result<Felt, SourceError>;

    async fn disconnect(&self);

    fn address(&self) -> Option<Felt>;

    /// Execute `calls` as one multi-call and return the transaction hash.
    async fn execute(&self, calls: &[Call]) -> Result<String, SourceError>;
}

#[async_trait]
impl SessionSource for SessionClient {
    async fn session(&self, session_id: &str) -> Result<Session, SourceError> {
        Ok(self.get_session(session_id).await?)
    }

    async fn status(&self, session_id: &str) -> Result<SessionStatus, SourceError> {
        Ok(self.get_session_status(session_id).await?)
    }

    async fn add_billing_address(
        &self,
        request: &AddBillingAddressRequest,
    ) -> Result<(), SourceError> {
        Ok(SessionClient::add_billing_address(self, request).await?)
    }

    async fn send_email_invoice(&self, session_id: &str) -> Result<(), SourceError> {
        Ok(SessionClient::send_email_invoice(self, session_id).await?)
    }
}

#[async_trait]
impl QuoteSource for AggregatorClient {
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, SourceError> {
        Ok(self.fetch_quotes(request).await?)
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuiltTransaction, SourceError> {
        Ok(self.build_transaction(request).await?)
    }
}

#[async_trait]
impl BalanceSource for StarknetRpcClient {
    async fn balance_of(&self, token: Felt, owner: Felt) -> Result<U256, SourceError> {
        Ok(StarknetRpcClient::balance_of(self, token, owner).await?)
    }
}

/// Read the owner's balance of every listed token concurrently.
///
/// A failed read is logged and the token is left out, so one broken token
/// contract does not hide the others.
pub async fn fetch_balances(
    source: &dyn BalanceSource,
    tokens: &TokenList,
    owner: Felt,
) -> Vec<Balance> {
    let reads = tokens.iter().map(|token| async move {
        match source.balance_of(token.address, owner).await {
            Ok(balance) => Some(Balance {
                address: token.address,
                balance,
            }),
            Err(e) => {
                warn!(token = %token.ticker, error = %e, "Failed to read balance");
                None
            }
        }
    });

    let balances: Vec<Balance> = join_all(reads).await.into_iter().flatten().collect();
    debug!(%owner, count = balances.len(), "Fetched wallet balances");
    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBalances, token_list};

    #[tokio::test]
    async fn failed_balance_reads_are_skipped() {
        let tokens = token_list();
        let source = FakeBalances::default()
            .with(tokens.iter().next().unwrap().address, U256::from(5u8))
            .failing(tokens.iter().nth(1).unwrap().address);

        let balances = fetch_balances(&source, &tokens, Felt::from(0x99u64)).await;

        assert_eq!(balances.len(), tokens.len() - 1);
        assert_eq!(balances[0].balance, U256::from(5u8));
        assert!(
            balances
                .iter()
                .all(|b| b.address != tokens.iter().nth(1).unwrap().address)
        );
    }
}
