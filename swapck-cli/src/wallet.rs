//! A wallet connector for terminals.
//!
//! The CLI holds no keys. It prints the multi-call as JSON for an external
//! signer and reads back the hash of the transaction that signer sent.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use swapck_core::sources::{SourceError, WalletConnector};
use swapck_sdk::objects::{Call, Felt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

const HASH_PROMPT: &str = "Sign and send the calls above, then paste the transaction hash:\n";

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    account: Felt,
    calls: &'a [Call],
}

pub struct ManualWallet {
    account: Felt,
    connected: AtomicBool,
    dry_run: bool,
    input: Mutex<Input>,
    output: Mutex<Output>,
}

impl ManualWallet {
    /// Calls go to stdout and the hash is read from stdin.
    pub fn stdio(account: Felt, dry_run: bool) -> Self {
        Self::new(
            account,
            dry_run,
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }

    pub fn new(account: Felt, dry_run: bool, input: Input, output: Output) -> Self {
        Self {
            account,
            connected: AtomicBool::new(false),
            dry_run,
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    async fn export(&self, calls: &[Call]) -> Result<(), SourceError> {
        let request = ExecuteRequest {
            account: self.account,
            calls,
        };
        let mut json = serde_json::to_string_pretty(&request)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        json.push('\n');
        self.write(&json).await
    }

    async fn write(&self, text: &str) -> Result<(), SourceError> {
        let mut output = self.output.lock().await;
        output
            .write_all(text.as_bytes())
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        output
            .flush()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }

    async fn read_hash(&self) -> Result<String, SourceError> {
        self.write(HASH_PROMPT).await?;
        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let line = line.trim();
        if read == 0 || line.is_empty() {
            return Err(SourceError::Rejected("no transaction hash entered".into()));
        }
        let hash: Felt = line
            .parse()
            .map_err(|e| SourceError::Rejected(format!("invalid transaction hash: {e}")))?;
        Ok(hash.to_string())
    }
}

#[async_trait]
impl WalletConnector for ManualWallet {
    async fn connect(&self) -> Result<Felt, SourceError> {
        self.connected.store(true, Ordering::Release);
        tracing::debug!(account = %self.account, "Manual wallet connected");
        Ok(self.account)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    fn address(&self) -> Option<Felt> {
        self.connected
            .load(Ordering::Acquire)
            .then_some(self.account)
    }

    async fn execute(&self, calls: &[Call]) -> Result<String, SourceError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(SourceError::NotConnected);
        }
        self.export(calls).await?;
        if self.dry_run {
            return Err(SourceError::Rejected("dry run, nothing was sent".into()));
        }
        self.read_hash().await
    }
}
