//! Remote exchange transport
//!
//! One request/response cycle with the answering collaborator. The engine
//! only sees the [`ExchangeClient`] trait; the HTTP implementation lives in
//! [`http`].

mod error;
pub mod http;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpExchangeClient;

use crate::transcript::Turn;
use async_trait::async_trait;
use std::sync::Arc;

/// What the engine sends for one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub message: String,
    /// History prior to `message`; the collaborator appends `message` itself
    pub history: Vec<Turn>,
    /// Email collected by the gate, on resubmission of a deferred message
    pub collected_field: Option<String>,
}

/// What the collaborator answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReply {
    pub reply: String,
    pub gate_required: bool,
}

impl ExchangeReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            gate_required: false,
        }
    }

    pub fn gated(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            gate_required: true,
        }
    }
}

/// Client for the remote exchange
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReply, TransportError>;
}

#[async_trait]
impl<T: ExchangeClient + ?Sized> ExchangeClient for Arc<T> {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReply, TransportError> {
        (**self).exchange(request).await
    }
}

/// Logging wrapper for exchange clients
pub struct LoggingClient<C> {
    inner: C,
}

impl<C: ExchangeClient> LoggingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: ExchangeClient> ExchangeClient for LoggingClient<C> {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReply, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.exchange(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    history_len = request.history.len(),
                    gated = request.collected_field.is_some(),
                    gate_required = reply.gate_required,
                    reply_chars = reply.reply.chars().count(),
                    "Exchange completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    status = ?e.status,
                    "Exchange failed"
                );
            }
        }

        result
    }
}
