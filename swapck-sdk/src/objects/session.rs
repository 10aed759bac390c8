//! Checkout session as served by `GET /api/session`.

use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Felt;

/// The server-side record describing what is being purchased.
///
/// Everything except `status` is fixed once the session is fetched; the
/// status is refreshed by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub total_price: Decimal,
    /// Ticker of the currency `total_price` is denominated in.
    #[serde(default = "default_price_token")]
    pub total_price_token: CompactString,
    pub deposit_address: Felt,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(rename = "shipping_address_collection", default)]
    pub shipping_address_collection: FieldCollection,
    #[serde(rename = "contact_information_collection", default)]
    pub contact_information_collection: FieldCollection,
    #[serde(rename = "payment_type", default)]
    pub payment_type: PaymentType,
}

fn default_price_token() -> CompactString {
    CompactString::const_new("USDC")
}

impl Session {
    pub fn requires_shipping(&self) -> bool {
        self.shipping_address_collection == FieldCollection::Required
    }

    /// Contact details are collected together with the shipping address, so
    /// a required shipping address implies required contact details.
    pub fn requires_contact(&self) -> bool {
        self.contact_information_collection == FieldCollection::Required
            || self.requires_shipping()
    }

    pub fn is_recurring(&self) -> bool {
        self.payment_type == PaymentType::Recurring
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

/// A purchased item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: CompactString,
    pub quantity: u32,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Pending,
    Completed,
    /// The session only collects shipping/contact details; nothing is paid
    /// on-chain.
    JustRequiringInfo,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::JustRequiringInfo => write!(f, "justRequiringInfo"),
            SessionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Whether a form section must be filled before paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCollection {
    Required,
    #[default]
    #[serde(other)]
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Recurring,
    #[default]
    #[serde(other)]
    OneTime,
}
