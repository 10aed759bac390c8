//! SwapCheckout CLI
//!
//! Pay a checkout session from the terminal with any token the wallet holds.

mod commands;
mod config;
mod shutdown;
mod wallet;

use clap::{Parser, Subcommand};
use commands::{Context, PayOptions};
use config::{ConfigLoader, Overrides};
use rust_decimal::Decimal;
use shutdown::SigDown;
use std::path::PathBuf;
use swapck_sdk::objects::Felt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// SwapCheckout - pay a crypto checkout with any token, swapped on the way
#[derive(Parser, Debug)]
#[command(name = "swapck")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SWAPCK_CONFIG", default_value = "./swapck.toml")]
    config: PathBuf,

    /// Override the checkout backend URL
    #[arg(long, env = "SWAPCK_API_URL")]
    api_url: Option<Url>,

    /// Override the swap aggregator URL
    #[arg(long, env = "SWAPCK_AGGREGATOR_URL")]
    aggregator_url: Option<Url>,

    /// Override the Starknet JSON-RPC URL
    #[arg(long, env = "SWAPCK_RPC_URL")]
    rpc_url: Option<Url>,

    /// Override the session database (network)
    #[arg(long, env = "SWAPCK_DB_NAME")]
    db_name: Option<String>,

    /// Override the token list path
    #[arg(long, env = "SWAPCK_TOKENS")]
    tokens: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a session's items, total and required fields
    Show { session: String },

    /// Show how much of each held token would pay the session
    Quotes {
        session: String,
        /// Wallet account to price
        #[arg(long)]
        address: Option<Felt>,
        /// Print one quote cycle and exit
        #[arg(long, default_value = "false")]
        once: bool,
    },

    /// Pay a session with one or two tokens
    Pay {
        session: String,
        /// Paying account
        #[arg(long)]
        address: Option<Felt>,
        /// Tokens to pay with (ticker or address), at most two. The first must
        /// hold enough to cover the whole total
        #[arg(long, value_delimiter = ',')]
        tokens: Vec<String>,
        /// Amount paid by the first token when paying with two
        #[arg(long)]
        split: Option<Decimal>,
        /// Contact e-mail
        #[arg(long)]
        email: Option<String>,
        /// Contact phone
        #[arg(long)]
        phone: Option<String>,
        /// JSON file with the shipping address
        #[arg(long)]
        shipping: Option<PathBuf>,
        /// Print the calls without sending anything
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Wait until the session is paid, then print the redirect URL
    Watch { session: String },

    /// Print the subscription QR payload of a recurring session
    Qr { session: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::debug!("Starting swapck v{}", env!("CARGO_PKG_VERSION"));

    let overrides = Overrides {
        api_url: args.api_url,
        aggregator_url: args.aggregator_url,
        rpc_url: args.rpc_url,
        db_name: args.db_name,
        tokens: args.tokens,
    };
    let loaded_config = ConfigLoader::new(&args.config, overrides)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::debug!("Configuration loaded from {:?}", args.config);

    let sig_down = SigDown::try_new()?;
    let ctx = Context::new(loaded_config, sig_down.cancellation_token());

    let result = match args.command {
        Command::Show { session } => commands::show(&ctx, &session).await,
        Command::Quotes {
            session,
            address,
            once,
        } => commands::quotes(&ctx, &session, address, once).await,
        Command::Pay {
            session,
            address,
            tokens,
            split,
            email,
            phone,
            shipping,
            dry_run,
        } => {
            let options = PayOptions {
                address,
                tokens,
                split,
                email,
                phone,
                shipping,
                dry_run,
            };
            commands::pay(&ctx, &session, options).await
        }
        Command::Watch { session } => commands::watch(&ctx, &session).await,
        Command::Qr { session } => commands::qr(&ctx, &session).await,
    };

    sig_down.close().await;
    result
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Logs go to stderr so stdout only carries command output.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
