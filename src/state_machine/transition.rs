//! Pure state transition function
//!
//! Given the same state, transcript and event, `transition` always produces
//! the same new state and effects. All I/O happens in the engine executor.

use super::event::ExchangeOrigin;
use super::state::{PendingRequest, RevealJobId};
use super::{ConvContext, ConvState, Effect, Event};
use crate::gate;
use crate::transcript::Transcript;
use crate::transport::{ExchangeReply, ExchangeRequest};
use thiserror::Error;

/// Shown as an error turn when a conversation exchange fails
pub const EXCHANGE_FAILED_MESSAGE: &str = "I couldn't respond just now. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Put `effect` ahead of everything already queued
    pub fn with_leading_effect(mut self, effect: Effect) -> Self {
        self.effects.insert(0, effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("An exchange is already in flight")]
    Busy,
    #[error("Waiting for the email gate to be completed")]
    GateOpen,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("No email gate is active")]
    NoActiveGate,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    transcript: &Transcript,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User Message Handling
        // ============================================================

        // Sending is checked before content, matching the input guard order
        (ConvState::AwaitingReply { .. }, Event::UserMessage { .. })
        | (ConvState::AwaitingGate { submitting: true, .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::Busy)
        }

        (ConvState::GateScheduled { .. } | ConvState::AwaitingGate { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::GateOpen)
        }

        // Idle/Revealing + UserMessage -> AwaitingReply. A reveal still
        // running keeps going until the reply's reveal supersedes it; its
        // completion no longer matches the state and is ignored.
        (ConvState::Idle | ConvState::Revealing { .. }, Event::UserMessage { text }) => {
            let message = text.trim();
            if message.is_empty() {
                return Err(TransitionError::EmptyMessage);
            }

            let request = ExchangeRequest {
                message: message.to_string(),
                history: transcript.snapshot(),
                collected_field: None,
            };

            Ok(TransitionResult::new(ConvState::AwaitingReply {
                deferred_input: message.to_string(),
            })
            .with_effect(Effect::append_user(message))
            .with_effect(Effect::ShowPlaceholder)
            .with_effect(Effect::request_exchange(ExchangeOrigin::Conversation, request)))
        }

        // ============================================================
        // Exchange Outcome
        // ============================================================
        (
            ConvState::AwaitingReply { deferred_input },
            Event::ExchangeComplete {
                origin: ExchangeOrigin::Conversation,
                outcome,
            },
        ) => Ok(match outcome {
            Ok(reply) => {
                let gate = reply
                    .gate_required
                    .then(|| PendingRequest::new(deferred_input.clone()));
                reveal_reply(transcript, reply, gate).with_leading_effect(Effect::RemovePlaceholder)
            }
            Err(_) => TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::RemovePlaceholder)
                .with_effect(Effect::append_error(EXCHANGE_FAILED_MESSAGE)),
        }),

        (
            ConvState::AwaitingGate {
                pending,
                submitting: true,
            },
            Event::ExchangeComplete {
                origin: ExchangeOrigin::Gate,
                outcome,
            },
        ) => Ok(match outcome {
            Ok(reply) => gate::exchange_succeeded(transcript, reply),
            Err(_) => gate::exchange_failed(pending),
        }),

        // ============================================================
        // Reveal and Gate Scheduling
        // ============================================================
        (ConvState::Revealing { job, gate }, Event::RevealComplete { job: done })
            if *job == done =>
        {
            Ok(match gate {
                Some(pending) => TransitionResult::new(ConvState::GateScheduled {
                    job: *job,
                    pending: pending.clone(),
                })
                .with_effect(Effect::ScheduleGate {
                    job: *job,
                    delay: context.gate_delay,
                }),
                None => TransitionResult::new(ConvState::Idle),
            })
        }

        (ConvState::GateScheduled { job, pending }, Event::GateDelayElapsed { job: fired })
            if *job == fired =>
        {
            Ok(gate::activate(pending.clone()))
        }

        // Superseded reveal or timer: nothing to do
        (_, Event::RevealComplete { .. } | Event::GateDelayElapsed { .. }) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Gate Interaction
        // ============================================================
        (
            ConvState::AwaitingGate {
                pending,
                submitting: false,
            },
            Event::GateSubmit { raw },
        ) => Ok(gate::submit(pending, &raw, transcript)),

        (ConvState::AwaitingGate { submitting: true, .. }, Event::GateSubmit { .. } | Event::GateAbandon) => {
            Err(TransitionError::Busy)
        }

        (ConvState::AwaitingGate { .. } | ConvState::GateScheduled { .. }, Event::GateAbandon) => {
            Ok(gate::abandon(state.gate_visible()))
        }

        (_, Event::GateSubmit { .. } | Event::GateAbandon) => Err(TransitionError::NoActiveGate),

        // ============================================================
        // Everything else is a bug in the caller
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in state {}",
            state.name()
        ))),
    }
}

/// Append the assistant turn for `reply` and start revealing it
pub(crate) fn reveal_reply(
    transcript: &Transcript,
    reply: ExchangeReply,
    gate: Option<PendingRequest>,
) -> TransitionResult {
    // The assistant turn lands right after everything already recorded
    let job = RevealJobId(transcript.len());

    TransitionResult::new(ConvState::Revealing { job, gate })
        .with_effect(Effect::append_assistant(reply.reply.clone()))
        .with_effect(Effect::StartReveal {
            job,
            text: reply.reply,
        })
}
