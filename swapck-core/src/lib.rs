#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod calls;
pub mod checkout;
pub mod config;
pub mod events;
pub mod poller;
pub mod pricing;
pub mod quotes;
pub mod selection;
pub mod sources;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
