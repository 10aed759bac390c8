//! Token reference list and wallet balances.

use alloy_primitives::U256;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::Felt;

/// A token the checkout knows how to display and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Felt,
    pub ticker: CompactString,
    pub decimals: u8,
    /// Icon URL or asset path.
    #[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// The static token reference list, loaded once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenList(Vec<Token>);

impl TokenList {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// Parse a JSON array of tokens.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn by_address(&self, address: Felt) -> Option<&Token> {
        self.0.iter().find(|t| t.address == address)
    }

    pub fn by_ticker(&self, ticker: &str) -> Option<&Token> {
        self.0.iter().find(|t| t.ticker == ticker)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a TokenList {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Quantity of one token held by the connected wallet, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: Felt,
    pub balance: U256,
}

impl Balance {
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero()
    }
}
