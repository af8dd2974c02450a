//! HTTP exchange client
//!
//! Talks to the portfolio backend's `/api/chat` endpoint.

use super::{ExchangeClient, ExchangeReply, ExchangeRequest, TransportError};
use crate::transcript::Turn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exchange client backed by a JSON POST endpoint
pub struct HttpExchangeClient {
    client: Client,
    endpoint: String,
}

impl HttpExchangeClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> TransportError {
        // FastAPI-style bodies carry the reason under "detail"
        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.detail)
            .unwrap_or_else(|| body.to_string());
        TransportError::status(status.as_u16(), format!("HTTP {status}: {detail}"))
    }
}

#[async_trait]
impl ExchangeClient for HttpExchangeClient {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReply, TransportError> {
        let wire = ChatRequest::from(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::timeout(format!("Request timeout: {e}"))
                } else {
                    TransportError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::decode(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::decode(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(ExchangeReply {
            reply: parsed.reply,
            gate_required: parsed.needs_email,
        })
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: Vec<HistoryItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_email: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct HistoryItem<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ExchangeRequest> for ChatRequest<'a> {
    fn from(request: &'a ExchangeRequest) -> Self {
        Self {
            message: &request.message,
            history: request.history.iter().map(HistoryItem::from).collect(),
            user_email: request.collected_field.as_deref(),
        }
    }
}

impl<'a> From<&'a Turn> for HistoryItem<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: &turn.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
    #[serde(default)]
    needs_email: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}
