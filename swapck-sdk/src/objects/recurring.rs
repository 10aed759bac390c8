//! QR payload for recurring payments, scanned by the companion mobile app.

use serde::{Deserialize, Serialize};

use super::Call;

/// One month, in seconds.
pub const MONTHLY_PERIODICITY_SECS: u64 = 2_678_400;
/// Billing epochs the subscriber commits to up front.
pub const DEFAULT_MINIMUM_EPOCHS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringPayload {
    pub transfer_call: Call,
    pub periodicity: u64,
    pub minimum_epochs: u32,
    pub session_id: String,
}

impl RecurringPayload {
    pub fn monthly(session_id: impl Into<String>, deposit_call: Call) -> Self {
        Self {
            transfer_call: deposit_call,
            periodicity: MONTHLY_PERIODICITY_SECS,
            minimum_epochs: DEFAULT_MINIMUM_EPOCHS,
            session_id: session_id.into(),
        }
    }

    /// The string encoded into the QR code.
    pub fn to_qr_content(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
