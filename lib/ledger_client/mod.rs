mod types;

pub use types::{
    AttributeDecodeError, AttributeEncoding, BlockResults, DecodedAttribute, Event,
    EventAttribute, RpcError, RpcResponse, TxResult,
};

use std::time::Duration;
use thiserror::Error;

/// Longest slice of a non-success response body kept in errors and logs.
const BODY_SNIPPET_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum LedgerClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request for height {height} failed: {source}")]
    Request {
        height: i64,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status} for height {height}: {body}")]
    UnexpectedStatus {
        height: i64,
        status: u16,
        body: String,
    },
    #[error("ledger returned error {code} for height {height}: {message}")]
    Rpc {
        height: i64,
        code: i64,
        message: String,
    },
    #[error("ledger returned neither result nor error for height {height}")]
    EmptyResponse { height: i64 },
    #[error("could not parse block results for height {height}: {source}")]
    Parse {
        height: i64,
        #[source]
        source: serde_json::Error,
    },
}

/// Thin client over the Tendermint-style `block_results` RPC endpoint.
///
/// Stateless apart from the pooled `reqwest` client, so one instance is shared by all workers.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: reqwest::Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LedgerClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(crate::build_info::user_agent())
            .build()
            .map_err(LedgerClientError::Build)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the transaction results of one block. A single attempt; failures are returned
    /// to the caller, never retried here.
    pub async fn get_block_results(&self, height: i64) -> Result<BlockResults, LedgerClientError> {
        let url = format!("{}/block_results?height={}", self.base_url, height);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| LedgerClientError::Request { height, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| LedgerClientError::Request { height, source })?;

        if !status.is_success() {
            return Err(LedgerClientError::UnexpectedStatus {
                height,
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        parse_block_results(height, &body)
    }
}

/// Unwraps the JSON-RPC envelope of a `block_results` body.
pub fn parse_block_results(height: i64, body: &str) -> Result<BlockResults, LedgerClientError> {
    let envelope: RpcResponse<BlockResults> = serde_json::from_str(body)
        .map_err(|source| LedgerClientError::Parse { height, source })?;

    match (envelope.result, envelope.error) {
        (_, Some(err)) => Err(LedgerClientError::Rpc {
            height,
            code: err.code,
            message: match err.data {
                Some(data) if !data.is_empty() => format!("{}: {}", err.message, data),
                _ => err.message,
            },
        }),
        (Some(result), None) => Ok(result),
        (None, None) => Err(LedgerClientError::EmptyResponse { height }),
    }
}

fn snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
