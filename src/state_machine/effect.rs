//! Effects produced by state transitions

use crate::state_machine::event::ExchangeOrigin;
use crate::state_machine::state::RevealJobId;
use crate::transcript::Turn;
use crate::transport::ExchangeRequest;
use std::time::Duration;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a turn to the transcript
    AppendTurn { turn: Turn },

    /// Show the display-only "in progress" indicator
    ShowPlaceholder,

    /// Remove the "in progress" indicator
    RemovePlaceholder,

    /// Issue a remote exchange (spawns as background task)
    RequestExchange {
        origin: ExchangeOrigin,
        request: ExchangeRequest,
    },

    /// Reveal `text` into the turn identified by `job`
    StartReveal { job: RevealJobId, text: String },

    /// Fire `GateDelayElapsed` after `delay`
    ScheduleGate { job: RevealJobId, delay: Duration },

    /// Show the email affordance
    ShowGate,

    /// Disable the affordance while its exchange is in flight
    GateSubmitting,

    /// Re-enable the affordance with an inline notice
    ReenableGate { message: String },

    /// Tear the affordance down
    HideGate,
}

impl Effect {
    pub fn append_user(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::user(content),
        }
    }

    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::assistant(content),
        }
    }

    pub fn append_error(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::error(content),
        }
    }

    pub fn request_exchange(origin: ExchangeOrigin, request: ExchangeRequest) -> Self {
        Effect::RequestExchange { origin, request }
    }

    pub fn reenable_gate(message: impl Into<String>) -> Self {
        Effect::ReenableGate {
            message: message.into(),
        }
    }
}
