//! TOML file configuration structures.
//!
//! These structs directly map to the `swapck.toml` file format.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use swapck_sdk::objects::Felt;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    pub rpc: RpcConfig,
    pub tokens: TokensConfig,
    #[serde(default)]
    pub checkout: CheckoutSection,
    #[serde(default)]
    pub wallet: WalletSection,
}

/// Checkout backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root URL of the checkout site, e.g. "https://pay.example.com".
    pub base_url: Url,
    /// Session database of the active network.
    #[serde(default = "default_db_name")]
    pub db_name: String,
}

fn default_db_name() -> String {
    "mainnet".to_owned()
}

/// Swap aggregator. Falls back to the public mainnet endpoint when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub url: Option<Url>,
}

/// Starknet JSON-RPC node used for balance reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    /// JSON token list; relative paths resolve against the config file.
    pub path: PathBuf,
}

/// Timers and amounts of the payment flow. Durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSection {
    pub quote_refresh_ms: u64,
    pub status_poll_ms: u64,
    pub redirect_delay_ms: u64,
    pub selection_error_ms: u64,
    pub quote_buffer_bps: u32,
    pub slippage: Decimal,
    pub include_approve: bool,
    pub slider_step: Decimal,
    pub usd_ticker: String,
    pub confirm: ConfirmSection,
}

impl Default for CheckoutSection {
    fn default() -> Self {
        Self {
            quote_refresh_ms: 5_000,
            status_poll_ms: 3_000,
            redirect_delay_ms: 5_000,
            selection_error_ms: 3_000,
            quote_buffer_bps: 100,
            slippage: Decimal::new(5, 3),
            include_approve: true,
            slider_step: Decimal::new(1, 2),
            usd_ticker: "USDC".to_owned(),
            confirm: ConfirmSection::default(),
        }
    }
}

/// When a selection may be confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ConfirmSection {
    NonEmpty,
    ExactSum,
    Tolerant {
        #[serde(default = "default_epsilon")]
        epsilon: Decimal,
    },
}

impl Default for ConfirmSection {
    fn default() -> Self {
        ConfirmSection::Tolerant {
            epsilon: default_epsilon(),
        }
    }
}

fn default_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletSection {
    /// Account to pay from when `--address` is not given.
    #[serde(default)]
    pub address: Option<Felt>,
}
