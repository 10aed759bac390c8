//! DEX aggregator client (quotes and executable swap calls).

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::quote::{BuildRequest, BuiltTransaction, Quote, QuoteRequest};

/// Public Starknet mainnet endpoint of the aggregator.
pub const DEFAULT_AGGREGATOR_URL: &str = "https://starknet.api.avnu.fi";

/// Typed HTTP client for the swap aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    http: Client,
    base_url: Url,
}

impl AggregatorClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /swap/v2/quotes` – all routes for a sell/buy pair, best first.
    #[tracing::instrument(
        skip_all,
        fields(sell = %request.sell_token_address, buy = %request.buy_token_address),
        err,
        level = "debug"
    )]
    pub async fn fetch_quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, ClientError> {
        let url = self.base_url.join("/swap/v2/quotes")?;

        let resp = self.http.get(url).query(request).send().await?;

        parse_response(resp).await
    }

    /// The best quote for a pair, or [`ClientError::NoQuote`] when the
    /// aggregator returns an empty list.
    pub async fn best_quote(&self, request: &QuoteRequest) -> Result<Quote, ClientError> {
        self.fetch_quotes(request)
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::NoQuote)
    }

    /// `POST /swap/v2/build` – the calls that execute a quote.
    #[tracing::instrument(skip_all, fields(quote_id = %request.quote_id), err)]
    pub async fn build_transaction(
        &self,
        request: &BuildRequest,
    ) -> Result<BuiltTransaction, ClientError> {
        let url = self.base_url.join("/swap/v2/build")?;

        let resp = self.http.post(url).json(request).send().await?;

        parse_response(resp).await
    }
}
