//! Conversation state types

use serde::Serialize;
use std::time::Duration;

/// Identifies a reveal job by the index of the assistant turn it renders.
/// At most one job exists per assistant turn, so the index is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RevealJobId(pub usize);

impl RevealJobId {
    pub fn turn_index(self) -> usize {
        self.0
    }
}

/// A user message held back until the gate collects an email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub deferred_input: String,
}

impl PendingRequest {
    pub fn new(deferred_input: impl Into<String>) -> Self {
        Self {
            deferred_input: deferred_input.into(),
        }
    }
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input
    #[default]
    Idle,

    /// Exchange in flight for a user message
    AwaitingReply {
        /// Candidate deferred input, promoted to a `PendingRequest` if the
        /// reply asks for the gate
        deferred_input: String,
    },

    /// Reply received and being revealed
    Revealing {
        job: RevealJobId,
        /// Set when the reply signalled that the gate is required
        gate: Option<PendingRequest>,
    },

    /// Reveal finished on a gated reply, waiting for the settle delay
    GateScheduled {
        job: RevealJobId,
        pending: PendingRequest,
    },

    /// Email affordance is shown
    AwaitingGate {
        pending: PendingRequest,
        /// A gate exchange is in flight; the affordance is disabled
        submitting: bool,
    },
}

impl ConvState {
    /// True exactly while a remote exchange is outstanding
    pub fn is_sending(&self) -> bool {
        matches!(
            self,
            ConvState::AwaitingReply { .. } | ConvState::AwaitingGate { submitting: true, .. }
        )
    }

    /// The held-back request, once the gate has been decided on
    pub fn pending_request(&self) -> Option<&PendingRequest> {
        match self {
            ConvState::GateScheduled { pending, .. } | ConvState::AwaitingGate { pending, .. } => {
                Some(pending)
            }
            _ => None,
        }
    }

    pub fn gate_visible(&self) -> bool {
        matches!(self, ConvState::AwaitingGate { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::AwaitingReply { .. } => "awaiting_reply",
            ConvState::Revealing { .. } => "revealing",
            ConvState::GateScheduled { .. } => "gate_scheduled",
            ConvState::AwaitingGate { .. } => "awaiting_gate",
        }
    }
}

/// Default settle delay between a gated reveal finishing and the gate showing
pub const DEFAULT_GATE_DELAY: Duration = Duration::from_millis(500);

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    pub gate_delay: Duration,
}

impl ConvContext {
    pub fn new(conversation_id: impl Into<String>, gate_delay: Duration) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            gate_delay,
        }
    }
}
