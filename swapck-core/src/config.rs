//! Runtime knobs of a checkout.

use compact_str::CompactString;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::utils::intervals::{
    QUOTE_REFRESH_INTERVAL, REDIRECT_DELAY, SELECTION_ERROR_TTL, STATUS_POLL_INTERVAL,
};

/// Rule deciding when a selection may be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmPolicy {
    /// Any non-empty selection.
    NonEmpty,
    /// Contributions must add up to the total exactly.
    ExactSum,
    /// Contributions must add up to the total within `epsilon`.
    Tolerant { epsilon: Decimal },
}

impl ConfirmPolicy {
    pub fn accepts(&self, sum: Decimal, total: Decimal) -> bool {
        match self {
            ConfirmPolicy::NonEmpty => true,
            ConfirmPolicy::ExactSum => sum == total,
            ConfirmPolicy::Tolerant { epsilon } => (sum - total).abs() <= *epsilon,
        }
    }
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        ConfirmPolicy::Tolerant {
            epsilon: Decimal::new(1, 2),
        }
    }
}

/// Configuration shared by every component of one checkout.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub quote_refresh_interval: Duration,
    pub status_poll_interval: Duration,
    pub redirect_delay: Duration,
    pub selection_error_ttl: Duration,
    /// Headroom added to the settlement amount when sizing the forward quote,
    /// in basis points.
    pub quote_buffer_bps: u32,
    /// Maximum slippage accepted by swap calls, as a fraction (0.005 = 0.5 %).
    pub slippage: Decimal,
    pub include_approve: bool,
    /// Granularity of the split slider.
    pub slider_step: Decimal,
    pub confirm_policy: ConfirmPolicy,
    /// Ticker of the token used to display USD equivalents.
    pub usd_ticker: CompactString,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            quote_refresh_interval: QUOTE_REFRESH_INTERVAL,
            status_poll_interval: STATUS_POLL_INTERVAL,
            redirect_delay: REDIRECT_DELAY,
            selection_error_ttl: SELECTION_ERROR_TTL,
            quote_buffer_bps: 100,
            slippage: Decimal::new(5, 3),
            include_approve: true,
            slider_step: Decimal::new(1, 2),
            confirm_policy: ConfirmPolicy::default(),
            usd_ticker: CompactString::const_new("USDC"),
        }
    }
}
