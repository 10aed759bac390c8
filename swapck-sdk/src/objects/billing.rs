//! Shipping / contact details and the billing endpoints' request bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// All mandatory lines are present (ignoring whitespace).
    pub fn is_filled(&self) -> bool {
        [
            &self.full_name,
            &self.address_line1,
            &self.city,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInformation {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactInformation {
    pub fn is_filled(&self) -> bool {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        }
    }
}

/// Body of `POST /api/add-billing-address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBillingAddressRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "shippingAddress")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(rename = "contactInformation")]
    pub contact_information: Option<ContactInformation>,
    pub tx_hash: String,
}

impl AddBillingAddressRequest {
    /// Placeholder transaction hash for sessions that are not paid on-chain.
    pub const MANUAL_TX_HASH: &'static str = "to add manually";
}

/// Body of `POST /api/sendEmailInvoice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailInvoiceRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}
