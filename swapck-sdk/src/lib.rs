//! Wire types and HTTP clients for SwapCheckout.
//!
//! The `objects` module holds every JSON shape exchanged with the checkout
//! backend, the swap aggregator and the wallet. The `client` module (behind
//! the `client` feature) wraps those endpoints in typed `reqwest` clients.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod units;
