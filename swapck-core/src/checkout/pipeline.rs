//! Payment stages.
//!
//! A payment runs `validate_required_fields`, selection confirm, call
//! building, [`submit`] and [`report_billing`] in that order. Sessions that
//! only collect information skip the three on-chain stages.

use swapck_sdk::objects::{AddBillingAddressRequest, Call, ContactInformation, Session, ShippingAddress};
use thiserror::Error;
use tracing::{info, instrument};

use crate::sources::{SessionSource, SourceError, WalletConnector};

/// Shipping and contact details entered by the buyer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillingDetails {
    pub shipping_address: Option<ShippingAddress>,
    pub contact_information: Option<ContactInformation>,
}

impl BillingDetails {
    /// Nothing was entered, so there is nothing to record or invoice.
    pub fn is_empty(&self) -> bool {
        self.shipping_address.is_none() && self.contact_information.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequiredFieldsError {
    #[error("please fill in your shipping address")]
    MissingShipping,

    #[error("please fill in your contact information")]
    MissingContact,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no wallet connected")]
    NotConnected,

    #[error("no calls to submit")]
    Empty,

    #[error("wallet failed to execute the transaction: {0}")]
    Wallet(#[source] SourceError),
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("failed to record billing details: {0}")]
    Billing(#[source] SourceError),

    #[error("failed to send the invoice e-mail: {0}")]
    Invoice(#[source] SourceError),
}

/// How a checkout ended.
///
/// `billing_reported` is `false` when no details were entered or when the
/// backend did not accept them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Paid on-chain.
    Paid {
        tx_hash: String,
        billing_reported: bool,
    },
    /// Information-only session; nothing was paid.
    InfoSubmitted { billing_reported: bool },
}

/// Block payment while a required form section is missing or incomplete.
pub fn validate_required_fields(
    session: &Session,
    details: &BillingDetails,
) -> Result<(), RequiredFieldsError> {
    if session.requires_shipping()
        && !details
            .shipping_address
            .as_ref()
            .is_some_and(ShippingAddress::is_filled)
    {
        return Err(RequiredFieldsError::MissingShipping);
    }
    if session.requires_contact()
        && !details
            .contact_information
            .as_ref()
            .is_some_and(ContactInformation::is_filled)
    {
        return Err(RequiredFieldsError::MissingContact);
    }
    Ok(())
}

/// Hand the calls to the wallet and return the transaction hash.
pub async fn submit(wallet: &dyn WalletConnector, calls: &[Call]) -> Result<String, SubmitError> {
    if wallet.address().is_none() {
        return Err(SubmitError::NotConnected);
    }
    if calls.is_empty() {
        return Err(SubmitError::Empty);
    }
    let tx_hash = wallet.execute(calls).await.map_err(|e| match e {
        SourceError::NotConnected => SubmitError::NotConnected,
        other => SubmitError::Wallet(other),
    })?;
    info!(%tx_hash, calls = calls.len(), "Transaction submitted");
    Ok(tx_hash)
}

/// Attach the buyer's details and transaction hash to the session, then ask
/// for the invoice e-mail.
#[instrument(skip(sessions, details), err)]
pub async fn report_billing(
    sessions: &dyn SessionSource,
    session_id: &str,
    details: &BillingDetails,
    tx_hash: &str,
) -> Result<(), BillingError> {
    let request = AddBillingAddressRequest {
        session_id: session_id.to_owned(),
        shipping_address: details.shipping_address.clone(),
        contact_information: details.contact_information.clone(),
        tx_hash: tx_hash.to_owned(),
    };
    sessions
        .add_billing_address(&request)
        .await
        .map_err(BillingError::Billing)?;
    sessions
        .send_email_invoice(session_id)
        .await
        .map_err(BillingError::Invoice)?;
    Ok(())
}
