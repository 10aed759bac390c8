//! Configuration module for the swapck CLI.
//!
//! Handles loading configuration from the TOML file, applying CLI
//! overrides and reading the token reference list.

pub mod file;

use crate::config::file::{CheckoutSection, ConfirmSection, FileConfig};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swapck_core::config::{CheckoutConfig, ConfirmPolicy};
use swapck_sdk::client::DEFAULT_AGGREGATOR_URL;
use swapck_sdk::objects::{Felt, TokenList};
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to parse token list: {0}")]
    TokenListError(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Values given on the command line, taking precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<Url>,
    pub aggregator_url: Option<Url>,
    pub rpc_url: Option<Url>,
    pub db_name: Option<String>,
    pub tokens: Option<PathBuf>,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub api_url: Url,
    pub db_name: String,
    pub aggregator_url: Url,
    pub rpc_url: Url,
    pub tokens: TokenList,
    pub checkout: CheckoutConfig,
    pub wallet_address: Option<Felt>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    overrides: Overrides,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, overrides: Overrides) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Read the token list
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = read(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        self.apply_overrides(&mut file_config);
        validate(&file_config)?;

        let tokens_path = self.resolve(&file_config.tokens.path);
        let tokens = TokenList::from_json(&read(&tokens_path)?)?;
        if tokens.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "token list {tokens_path:?} is empty"
            )));
        }
        tracing::debug!(path = ?tokens_path, count = tokens.len(), "Token list loaded");

        build_loaded_config(file_config, tokens)
    }

    fn apply_overrides(&self, config: &mut FileConfig) {
        let o = &self.overrides;
        if let Some(url) = &o.api_url {
            config.api.base_url = url.clone();
        }
        if let Some(url) = &o.aggregator_url {
            config.aggregator.url = Some(url.clone());
        }
        if let Some(url) = &o.rpc_url {
            config.rpc.url = url.clone();
        }
        if let Some(db_name) = &o.db_name {
            config.api.db_name = db_name.clone();
        }
        if let Some(path) = &o.tokens {
            config.tokens.path = path.clone();
        }
    }

    /// Relative token list paths are taken from the config file's directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || self.overrides.tokens.is_some() {
            return path.to_path_buf();
        }
        match self.config_path.parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let c = &config.checkout;
    if config.api.db_name.trim().is_empty() {
        return Err(ConfigError::ValidationError("api.db_name is empty".into()));
    }
    for (name, ms) in [
        ("quote_refresh_ms", c.quote_refresh_ms),
        ("status_poll_ms", c.status_poll_ms),
    ] {
        if ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "checkout.{name} must be positive"
            )));
        }
    }
    if c.slippage < Decimal::ZERO || c.slippage >= Decimal::ONE {
        return Err(ConfigError::ValidationError(format!(
            "checkout.slippage {} is outside [0, 1)",
            c.slippage
        )));
    }
    if c.slider_step <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "checkout.slider_step must be positive".into(),
        ));
    }
    if let ConfirmSection::Tolerant { epsilon } = c.confirm
        && epsilon < Decimal::ZERO
    {
        return Err(ConfigError::ValidationError(
            "checkout.confirm.epsilon is negative".into(),
        ));
    }
    Ok(())
}

fn build_loaded_config(
    file_config: FileConfig,
    tokens: TokenList,
) -> Result<LoadedConfig, ConfigError> {
    let aggregator_url = match file_config.aggregator.url {
        Some(url) => url,
        None => Url::parse(DEFAULT_AGGREGATOR_URL)?,
    };
    Ok(LoadedConfig {
        api_url: file_config.api.base_url,
        db_name: file_config.api.db_name,
        aggregator_url,
        rpc_url: file_config.rpc.url,
        tokens,
        checkout: convert_checkout(file_config.checkout),
        wallet_address: file_config.wallet.address,
    })
}

fn convert_checkout(c: CheckoutSection) -> CheckoutConfig {
    CheckoutConfig {
        quote_refresh_interval: Duration::from_millis(c.quote_refresh_ms),
        status_poll_interval: Duration::from_millis(c.status_poll_ms),
        redirect_delay: Duration::from_millis(c.redirect_delay_ms),
        selection_error_ttl: Duration::from_millis(c.selection_error_ms),
        quote_buffer_bps: c.quote_buffer_bps,
        slippage: c.slippage,
        include_approve: c.include_approve,
        slider_step: c.slider_step,
        confirm_policy: match c.confirm {
            ConfirmSection::NonEmpty => ConfirmPolicy::NonEmpty,
            ConfirmSection::ExactSum => ConfirmPolicy::ExactSum,
            ConfirmSection::Tolerant { epsilon } => ConfirmPolicy::Tolerant { epsilon },
        },
        usd_ticker: c.usd_ticker.into(),
    }
}
