//! Chain exchange with peers
//!
//! The consensus resolver never performs I/O itself; it is handed chains that a
//! `ChainFetcher` already retrieved. Unreachable or misbehaving peers are
//! reported as `None` and skipped.

use crate::blockchain::Block;
use futures::future::BoxFuture;
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_LENGTH;
use hyper::{Client, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Wire form of a full chain, as served by `GET /chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }

    /// Unwrap the chain, rejecting a `length` that disagrees with the blocks sent.
    pub fn into_chain(self) -> Result<Vec<Block>, FetchError> {
        if self.length != self.chain.len() {
            return Err(FetchError::LengthMismatch {
                claimed: self.length,
                actual: self.chain.len(),
            });
        }
        Ok(self.chain)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid peer URI: {0}")]
    Uri(#[from] hyper::http::uri::InvalidUri),
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
    #[error("peer answered with status {0}")]
    Status(StatusCode),
    #[error("could not decode chain: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("length field says {claimed} blocks but {actual} were sent")]
    LengthMismatch { claimed: usize, actual: usize },
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Source of peer chains for consensus.
pub trait ChainFetcher: Send + Sync {
    /// Fetch the full chain of the peer at `address` (`host:port`).
    /// Returns `None` when the peer cannot provide one.
    fn fetch_chain<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Option<Vec<Block>>>;
}

/// In-memory fetcher keyed by peer address. Unknown peers are unreachable.
impl ChainFetcher for HashMap<String, Vec<Block>> {
    fn fetch_chain<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Option<Vec<Block>>> {
        Box::pin(async move { self.get(address).cloned() })
    }
}

/// Fetches `http://{peer}/chain` with a per-request timeout and a cap on
/// the response body size.
#[derive(Debug, Clone)]
pub struct HttpChainFetcher {
    client: Client<HttpConnector>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Self {
        Self {
            client: Client::new(),
            timeout,
            max_body_bytes,
        }
    }

    pub async fn try_fetch(&self, address: &str) -> Result<Vec<Block>, FetchError> {
        let uri: Uri = format!("http://{}/chain", address).parse()?;

        let response = tokio::time::timeout(self.timeout, self.client.get(uri))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }

        let limit = self.max_body_bytes;
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        if declared.map_or(false, |length| length > limit as u64) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = response.into_body();
        let read_body = async move {
            let mut buffer = Vec::new();
            while let Some(chunk) = body.data().await {
                let chunk = chunk?;
                if buffer.len() + chunk.len() > limit {
                    return Err(FetchError::TooLarge { limit });
                }
                buffer.extend_from_slice(&chunk);
            }
            Ok::<_, FetchError>(buffer)
        };
        let body = tokio::time::timeout(self.timeout, read_body)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;
        let decoded: ChainResponse = serde_json::from_slice(&body)?;
        let chain = decoded.into_chain()?;

        debug!(peer = %address, length = chain.len(), "fetched peer chain");
        Ok(chain)
    }
}

impl ChainFetcher for HttpChainFetcher {
    fn fetch_chain<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Option<Vec<Block>>> {
        Box::pin(async move {
            match self.try_fetch(address).await {
                Ok(chain) => Some(chain),
                Err(e) => {
                    warn!(peer = %address, error = %e, "skipping peer");
                    None
                }
            }
        })
    }
}
