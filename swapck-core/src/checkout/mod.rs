//! Checkout orchestration.
//!
//! [`pipeline`] holds the individual payment stages, each with its own error
//! type. [`view`] owns the state of one checkout and drives the stages and
//! the background timers.

pub mod pipeline;
pub mod view;

pub use pipeline::{
    BillingDetails, BillingError, PaymentOutcome, RequiredFieldsError, SubmitError,
    report_billing, submit, validate_required_fields,
};
pub use view::{CheckoutSources, CheckoutView};

use thiserror::Error;

use crate::calls::CallBuildError;
use crate::pricing::PricingError;
use crate::selection::SelectionError;
use crate::sources::SourceError;

#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The session was completed, or this checkout already sent its payment
    #[error("this session is already paid")]
    AlreadyPaid,

    #[error("failed to load session: {0}")]
    Session(#[source] SourceError),

    #[error("no wallet connected")]
    WalletNotConnected,

    #[error("failed to connect wallet: {0}")]
    Wallet(#[source] SourceError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    RequiredFields(#[from] RequiredFieldsError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    CallBuild(#[from] CallBuildError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}
