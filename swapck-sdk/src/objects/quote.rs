//! Swap aggregator quote and build payloads.

use alloy_primitives::U256;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Call, Felt};

/// Opaque aggregator identifier for a priced route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub CompactString);

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuoteId {
    fn from(value: &str) -> Self {
        Self(CompactString::new(value))
    }
}

/// Query of `GET /swap/v2/quotes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub sell_token_address: Felt,
    pub buy_token_address: Felt,
    pub sell_amount: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker_address: Option<Felt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl QuoteRequest {
    pub fn new(sell_token_address: Felt, buy_token_address: Felt, sell_amount: U256) -> Self {
        Self {
            sell_token_address,
            buy_token_address,
            sell_amount,
            taker_address: None,
            size: None,
        }
    }

    pub fn with_taker(mut self, taker: Felt) -> Self {
        self.taker_address = Some(taker);
        self
    }
}

/// A priced exchange between two tokens, valid for a short window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: QuoteId,
    pub sell_token_address: Felt,
    pub sell_amount: U256,
    #[serde(default)]
    pub sell_amount_in_usd: Option<Decimal>,
    pub buy_token_address: Felt,
    pub buy_amount: U256,
    #[serde(default)]
    pub buy_amount_in_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Unix timestamp (milliseconds) after which the aggregator refuses to
    /// build the quote, when it says so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
}

/// Body of `POST /swap/v2/build`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub quote_id: QuoteId,
    pub taker_address: Felt,
    #[serde(with = "rust_decimal::serde::float")]
    pub slippage: Decimal,
    pub include_approve: bool,
}

/// The executable calls for a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub calls: Vec<Call>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_aggregator_quote() {
        let json = r#"{
            "quoteId": "b1f5a0e2-7c1d-4c52-9d7e-1a2b3c4d5e6f",
            "sellTokenAddress": "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7",
            "sellAmount": "0x2386f26fc10000",
            "sellAmountInUsd": 31.27,
            "buyTokenAddress": "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8",
            "buyAmount": "0x1dcd650",
            "buyAmountInUsd": 31.25,
            "chainId": "0x534e5f4d41494e",
            "routes": []
        }"#;
        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.sell_amount, U256::from(10_000_000_000_000_000u64));
        assert_eq!(quote.buy_amount, U256::from(31_250_000u64));
        assert_eq!(quote.sell_amount_in_usd, Some(dec!(31.27)));
        assert_eq!(quote.expiry, None);
    }

    #[test]
    fn build_request_sends_slippage_as_number() {
        let req = BuildRequest {
            quote_id: QuoteId::from("q-1"),
            taker_address: Felt::from(7u64),
            slippage: dec!(0.005),
            include_approve: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["slippage"], serde_json::json!(0.005));
        assert_eq!(json["quoteId"], "q-1");
        assert_eq!(json["takerAddress"], "0x7");
        assert_eq!(json["includeApprove"], true);
    }
}
