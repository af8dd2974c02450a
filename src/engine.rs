//! Conversation engine runtime
//!
//! The engine task owns the transcript, the state machine and the reveal
//! scheduler, and processes one input at a time. Callers talk to it through a
//! [`ConversationHandle`]; the presentation layer subscribes to
//! [`WidgetEvent`]s.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationEngine;

use crate::state_machine::{ConvState, Event, PendingRequest, RevealJobId};
use crate::transcript::Turn;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    TurnAppended {
        index: usize,
        turn: Turn,
    },
    /// "In progress" indicator shown while waiting for a reply
    PlaceholderShown,
    PlaceholderRemoved,
    /// Current partial text of a turn being revealed; the presentation
    /// scrolls to the latest turn on each one
    RevealProgress {
        turn_index: usize,
        visible: String,
    },
    RevealFinished {
        turn_index: usize,
    },
    GateActivated,
    /// Affordance disabled while the email is being sent
    GateSubmitting,
    /// Affordance enabled again, with an inline notice
    GateReenabled {
        message: String,
    },
    GateDeactivated,
    /// Input affordances should be disabled while `sending`
    SendingChanged {
        sending: bool,
    },
    /// Display-only welcome; never part of the transcript
    Greeting {
        text: String,
    },
}

/// Point-in-time view of the engine
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub transcript: Vec<Turn>,
    pub state: ConvState,
    pub sending: bool,
    pub placeholder_visible: bool,
    pub gate_visible: bool,
    /// Turn currently being revealed
    pub revealing: Option<RevealJobId>,
}

impl EngineSnapshot {
    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.state.pending_request()
    }
}

/// Returned by handle calls once the engine task has stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("conversation engine has stopped")]
pub struct EngineClosed;

pub(crate) enum Command {
    Dispatch(Event),
    Open,
    Snapshot(oneshot::Sender<EngineSnapshot>),
}

/// Handle to interact with a running conversation engine
#[derive(Clone)]
pub struct ConversationHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
}

impl ConversationHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        broadcast_tx: broadcast::Sender<WidgetEvent>,
    ) -> Self {
        Self {
            command_tx,
            broadcast_tx,
        }
    }

    /// Send a message from the main input. Empty input, or input while an
    /// exchange is in flight or the gate is open, is ignored.
    pub async fn submit_user_message(&self, text: impl Into<String>) -> Result<(), EngineClosed> {
        self.dispatch(Event::UserMessage { text: text.into() }).await
    }

    /// Submit the email typed into the gate affordance
    pub async fn submit_gate(&self, raw: impl Into<String>) -> Result<(), EngineClosed> {
        self.dispatch(Event::GateSubmit { raw: raw.into() }).await
    }

    /// Dismiss the gate and drop the deferred request
    pub async fn abandon_gate(&self) -> Result<(), EngineClosed> {
        self.dispatch(Event::GateAbandon).await
    }

    /// The widget was opened; greets once while the transcript is empty
    pub async fn open(&self) -> Result<(), EngineClosed> {
        self.command_tx
            .send(Command::Open)
            .await
            .map_err(|_| EngineClosed)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot(reply_tx))
            .await
            .map_err(|_| EngineClosed)?;
        reply_rx.await.map_err(|_| EngineClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.broadcast_tx.subscribe()
    }

    async fn dispatch(&self, event: Event) -> Result<(), EngineClosed> {
        self.command_tx
            .send(Command::Dispatch(event))
            .await
            .map_err(|_| EngineClosed)
    }
}
