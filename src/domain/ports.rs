//! Ports: the seams between the pipeline and the outside world.

use async_trait::async_trait;
use thiserror::Error;

/// A raw HTTP response as the pipeline sees it, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Server-directed wait in seconds, from a `Retry-After` header.
    pub retry_after: Option<u64>,
    pub body: String,
}

/// A transport-level failure: connect error, timeout, DNS, TLS.
/// Anything that produced an HTTP status is a `RawResponse` instead.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// One way of reaching a page. Implementations are opaque capabilities: the
/// pipeline never inspects how a transport defeats bot protection, it only
/// classifies what comes back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, url: &str) -> Result<RawResponse, TransportError>;
}
