//! Email gate
//!
//! When a reply signals that the answer needs follow-up, the conversation
//! pauses and asks for an email address. Once a valid address is submitted
//! the deferred user message is resent together with it. The deferred
//! message is never appended to the transcript a second time.

use crate::state_machine::event::ExchangeOrigin;
use crate::state_machine::state::PendingRequest;
use crate::state_machine::transition::{reveal_reply, TransitionResult};
use crate::state_machine::{ConvState, Effect};
use crate::transcript::Transcript;
use crate::transport::{ExchangeReply, ExchangeRequest};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Shown on the affordance when the gate exchange fails
pub const GATE_RETRY_MESSAGE: &str = "Failed to submit email. Please try again.";

// local@domain.tld, no whitespace, exactly one '@'
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Rejected gate input. Surfaced inline on the affordance only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your email address")]
    Empty,
    #[error("Please enter a valid email address")]
    Malformed,
}

/// Trim and validate an email address
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::Malformed);
    }
    Ok(email.to_string())
}

/// Show the affordance for `pending`
pub(crate) fn activate(pending: PendingRequest) -> TransitionResult {
    TransitionResult::new(ConvState::AwaitingGate {
        pending,
        submitting: false,
    })
    .with_effect(Effect::ShowGate)
}

/// Handle a submission on an enabled affordance
pub(crate) fn submit(
    pending: &PendingRequest,
    raw: &str,
    transcript: &Transcript,
) -> TransitionResult {
    match validate_email(raw) {
        Ok(email) => {
            let request = ExchangeRequest {
                message: pending.deferred_input.clone(),
                history: transcript.snapshot(),
                collected_field: Some(email),
            };
            TransitionResult::new(ConvState::AwaitingGate {
                pending: pending.clone(),
                submitting: true,
            })
            .with_effect(Effect::GateSubmitting)
            .with_effect(Effect::request_exchange(ExchangeOrigin::Gate, request))
        }
        Err(e) => TransitionResult::new(ConvState::AwaitingGate {
            pending: pending.clone(),
            submitting: false,
        })
        .with_effect(Effect::reenable_gate(e.to_string())),
    }
}

/// Gate exchange answered: tear down and reveal the answer.
///
/// The reply's own gating flag is not consulted; a collected email satisfies
/// the pending request.
pub(crate) fn exchange_succeeded(transcript: &Transcript, reply: ExchangeReply) -> TransitionResult {
    reveal_reply(transcript, reply, None).with_leading_effect(Effect::HideGate)
}

/// Gate exchange failed: let the user retry with the same pending request
pub(crate) fn exchange_failed(pending: &PendingRequest) -> TransitionResult {
    TransitionResult::new(ConvState::AwaitingGate {
        pending: pending.clone(),
        submitting: false,
    })
    .with_effect(Effect::reenable_gate(GATE_RETRY_MESSAGE))
}

/// User walked away from the gate
pub(crate) fn abandon(visible: bool) -> TransitionResult {
    let result = TransitionResult::new(ConvState::Idle);
    if visible {
        result.with_effect(Effect::HideGate)
    } else {
        result
    }
}
