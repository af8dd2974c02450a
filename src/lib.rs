//! Folio chat - conversational widget engine
//!
//! A headless engine for a turn-based chat widget: one remote exchange at a
//! time, replies revealed character by character, and an email gate that
//! defers a question until contact details are collected.

pub mod config;
pub mod engine;
pub mod gate;
pub mod reveal;
pub mod state_machine;
pub mod transcript;
pub mod transport;

pub use config::WidgetConfig;
pub use engine::{ConversationEngine, ConversationHandle, EngineClosed, EngineSnapshot, WidgetEvent};
pub use transcript::{Role, Transcript, Turn};
pub use transport::{
    ExchangeClient, ExchangeReply, ExchangeRequest, HttpExchangeClient, LoggingClient,
    TransportError,
};
