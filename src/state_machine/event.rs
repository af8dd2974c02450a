//! Events that can occur in a conversation

use crate::state_machine::state::RevealJobId;
use crate::transport::{ExchangeReply, TransportError};

/// Which flow issued an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOrigin {
    /// A user message from the main input
    Conversation,
    /// Resubmission of a deferred message with the collected email
    Gate,
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },
    GateSubmit {
        raw: String,
    },
    GateAbandon,

    // Exchange events
    ExchangeComplete {
        origin: ExchangeOrigin,
        outcome: Result<ExchangeReply, TransportError>,
    },

    // Timer events
    RevealComplete {
        job: RevealJobId,
    },
    GateDelayElapsed {
        job: RevealJobId,
    },
}
