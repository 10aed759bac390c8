use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// How often payment quotes are re-fetched while a wallet is connected.
pub const QUOTE_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// How often the session status is polled once a session is loaded.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Delay between the success event and the redirect to the merchant.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(5);

/// Lifetime of a transient selection error shown to the buyer.
pub const SELECTION_ERROR_TTL: Duration = Duration::from_secs(3);

/// A fixed-period ticker whose first tick completes immediately.
///
/// Slow iterations skip the ticks they overlapped instead of bursting to
/// catch up, so a stalled request never turns into back-to-back requests.
pub fn fixed_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
