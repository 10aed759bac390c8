//! Minimal Starknet JSON-RPC client used to read token balances.

use alloy_primitives::U256;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::{Felt, entry_point_selector};

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Serialize)]
struct FunctionCall<'a> {
    contract_address: Felt,
    entry_point_selector: Felt,
    calldata: &'a [Felt],
}

#[derive(Serialize)]
struct CallParams<'a> {
    request: FunctionCall<'a>,
    block_id: &'static str,
}

/// Read-only access to a Starknet node.
#[derive(Debug, Clone)]
pub struct StarknetRpcClient {
    http: Client,
    endpoint: Url,
}

impl StarknetRpcClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `starknet_call` against the latest block.
    pub async fn call(
        &self,
        contract_address: Felt,
        entrypoint: &str,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, ClientError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "starknet_call",
            params: CallParams {
                request: FunctionCall {
                    contract_address,
                    entry_point_selector: entry_point_selector(entrypoint),
                    calldata,
                },
                block_id: "latest",
            },
        };

        let resp = self.http.post(self.endpoint.clone()).json(&body).send().await?;
        let resp: RpcResponse<Vec<Felt>> = parse_response(resp).await?;

        match (resp.result, resp.error) {
            (_, Some(err)) => Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ClientError::Rpc {
                code: 0,
                message: "response carries neither result nor error".to_owned(),
            }),
        }
    }

    /// `balanceOf(owner)` of a token, combining the `u256` halves.
    #[tracing::instrument(skip(self), err, level = "debug")]
    pub async fn balance_of(&self, token: Felt, owner: Felt) -> Result<U256, ClientError> {
        let words = self.call(token, "balanceOf", &[owner]).await?;
        let low = words.first().map(Felt::value).unwrap_or_default();
        let high = words.get(1).map(Felt::value).unwrap_or_default();
        Ok(low + (high << 128usize))
    }
}
