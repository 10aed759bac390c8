pub mod billing;
pub mod call;
pub mod quote;
pub mod recurring;
pub mod session;
pub mod token;

pub use billing::{AddBillingAddressRequest, ContactInformation, SendEmailInvoiceRequest, ShippingAddress};
pub use call::{Call, entry_point_selector, uint256_calldata};
pub use quote::{BuildRequest, BuiltTransaction, Quote, QuoteId, QuoteRequest};
pub use recurring::RecurringPayload;
pub use session::{FieldCollection, LineItem, PaymentType, Session, SessionStatus};
pub use token::{Balance, Token, TokenList};

pub use alloy_primitives::U256;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A Starknet field element.
///
/// Contract addresses, entry point selectors and calldata words are all
/// felts. They travel as `0x`-prefixed hex strings and are compared by
/// value, so `0x04` and `0x0000004` are the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Felt(U256);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeltParseError {
    #[error("invalid felt literal {input:?}: {reason}")]
    Invalid { input: String, reason: String },
    #[error("value {0} is outside the Stark field")]
    OutOfRange(String),
}

impl Felt {
    pub const ZERO: Felt = Felt(U256::ZERO);

    /// The Stark field prime, `2^251 + 17 * 2^192 + 1`.
    pub fn field_prime() -> U256 {
        (U256::from(1u8) << 251) + (U256::from(17u8) << 192) + U256::from(1u8)
    }

    /// Wrap a raw integer, rejecting values outside the field.
    pub fn new(value: U256) -> Result<Self, FeltParseError> {
        if value >= Self::field_prime() {
            return Err(FeltParseError::OutOfRange(format!("{value:#x}")));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for Felt {
    type Err = FeltParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some("") => Ok(U256::ZERO),
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(trimmed, 10),
        };
        let value = parsed.map_err(|e| FeltParseError::Invalid {
            input: s.to_owned(),
            reason: e.to_string(),
        })?;
        Self::new(value)
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
