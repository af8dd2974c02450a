//! Widget configuration
//!
//! Read from the environment; unset or unparsable values fall back to the
//! defaults below.

use crate::reveal::DEFAULT_REVEAL_SPEED;
use crate::state_machine::state::DEFAULT_GATE_DELAY;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/chat";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GREETING_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_GREETING: &str =
    "Hi! I'm the portfolio assistant. Ask me anything about experience, skills, or projects!";

/// Configuration for the widget engine and its transport
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// URL the exchange is POSTed to
    pub endpoint: String,
    pub request_timeout: Duration,
    /// Period of one reveal tick
    pub reveal_speed: Duration,
    /// Settle delay before the email gate shows
    pub gate_delay: Duration,
    /// Display-only welcome shown on first open; `None` disables it
    pub greeting: Option<String>,
    pub greeting_delay: Duration,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reveal_speed: DEFAULT_REVEAL_SPEED,
            gate_delay: DEFAULT_GATE_DELAY,
            greeting: Some(DEFAULT_GREETING.to_string()),
            greeting_delay: DEFAULT_GREETING_DELAY,
        }
    }
}

impl WidgetConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        Self {
            endpoint: lookup("FOLIO_CHAT_ENDPOINT").unwrap_or(defaults.endpoint),
            request_timeout: lookup("FOLIO_CHAT_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            reveal_speed: millis("FOLIO_CHAT_REVEAL_MS", defaults.reveal_speed),
            gate_delay: millis("FOLIO_CHAT_GATE_DELAY_MS", defaults.gate_delay),
            greeting: match lookup("FOLIO_CHAT_GREETING") {
                Some(text) if text.trim().is_empty() => None,
                Some(text) => Some(text),
                None => defaults.greeting,
            },
            greeting_delay: defaults.greeting_delay,
        }
    }
}
