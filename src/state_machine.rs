//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Event, ExchangeOrigin};
pub use state::{ConvContext, ConvState, PendingRequest, RevealJobId};
pub use transition::{transition, TransitionError, TransitionResult, EXCHANGE_FAILED_MESSAGE};
