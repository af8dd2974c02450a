//! Conversation engine executor

use super::{Command, ConversationHandle, EngineSnapshot, WidgetEvent};
use crate::config::WidgetConfig;
use crate::reveal::{RevealScheduler, RevealTick};
use crate::state_machine::{
    transition, ConvContext, ConvState, Effect, Event, RevealJobId, TransitionError,
};
use crate::transcript::Transcript;
use crate::transport::ExchangeClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const COMMAND_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 1024;

/// Inputs produced by the engine's own background tasks
enum Internal {
    Event(Event),
    Greet,
}

/// Conversation engine generic over the exchange collaborator
pub struct ConversationEngine<C>
where
    C: ExchangeClient + 'static,
{
    context: ConvContext,
    state: ConvState,
    transcript: Transcript,
    client: Arc<C>,
    reveal: RevealScheduler,
    tick_rx: mpsc::UnboundedReceiver<RevealJobId>,
    command_rx: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    greeting: Option<String>,
    greeting_delay: Duration,
    greeted: bool,
    placeholder_visible: bool,
    gate_visible: bool,
}

impl<C> ConversationEngine<C>
where
    C: ExchangeClient + 'static,
{
    pub(crate) fn new(
        config: &WidgetConfig,
        client: C,
        command_rx: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<WidgetEvent>,
    ) -> Self {
        let context = ConvContext::new(uuid::Uuid::new_v4().to_string(), config.gate_delay);
        let (reveal, tick_rx) = RevealScheduler::new(config.reveal_speed);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        Self {
            context,
            state: ConvState::Idle,
            transcript: Transcript::new(),
            client: Arc::new(client),
            reveal,
            tick_rx,
            command_rx,
            internal_tx,
            internal_rx,
            broadcast_tx,
            greeting: config.greeting.clone(),
            greeting_delay: config.greeting_delay,
            greeted: false,
            placeholder_visible: false,
            gate_visible: false,
        }
    }

    /// Start an engine in the background and return its handle. The engine
    /// stops once every handle has been dropped.
    pub fn spawn(config: &WidgetConfig, client: C) -> ConversationHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let engine = Self::new(config, client, command_rx, broadcast_tx.clone());
        tokio::spawn(engine.run());

        ConversationHandle::new(command_tx, broadcast_tx)
    }

    pub async fn run(mut self) {
        tracing::info!(conv_id = %self.context.conversation_id, "Starting conversation engine");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(job) = self.tick_rx.recv() => self.handle_tick(job),
                Some(internal) = self.internal_rx.recv() => match internal {
                    Internal::Event(event) => self.process_event(event),
                    Internal::Greet => self.greet(),
                },
            }
        }

        self.reveal.cancel();
        tracing::info!(conv_id = %self.context.conversation_id, "Conversation engine stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dispatch(event) => self.process_event(event),
            Command::Open => self.schedule_greeting(),
            Command::Snapshot(reply_tx) => {
                let _ = reply_tx.send(self.snapshot());
            }
        }
    }

    fn process_event(&mut self, event: Event) {
        let was_sending = self.state.is_sending();

        let result = match transition(&self.state, &self.context, &self.transcript, event) {
            Ok(r) => r,
            Err(
                e @ (TransitionError::Busy
                | TransitionError::GateOpen
                | TransitionError::EmptyMessage
                | TransitionError::NoActiveGate),
            ) => {
                // Rejected input is a silent no-op for the user
                tracing::debug!(conv_id = %self.context.conversation_id, reason = %e, "Input ignored");
                return;
            }
            Err(e) => {
                tracing::warn!(conv_id = %self.context.conversation_id, error = %e, "Event rejected");
                return;
            }
        };

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.name() != self.state.name() {
            tracing::debug!(
                conv_id = %self.context.conversation_id,
                from = old_state.name(),
                to = self.state.name(),
                "State changed"
            );
        }

        let sending = self.state.is_sending();
        if sending != was_sending {
            self.notify(WidgetEvent::SendingChanged { sending });
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendTurn { turn } => {
                let index = self.transcript.append(turn.clone());
                self.notify(WidgetEvent::TurnAppended { index, turn });
            }

            Effect::ShowPlaceholder => {
                self.placeholder_visible = true;
                self.notify(WidgetEvent::PlaceholderShown);
            }

            Effect::RemovePlaceholder => {
                if self.placeholder_visible {
                    self.placeholder_visible = false;
                    self.notify(WidgetEvent::PlaceholderRemoved);
                }
            }

            Effect::RequestExchange { origin, request } => {
                let client = self.client.clone();
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let outcome = client.exchange(&request).await;
                    // The engine may have stopped meanwhile
                    let _ = internal_tx.send(Internal::Event(Event::ExchangeComplete { origin, outcome }));
                });
            }

            Effect::StartReveal { job, text } if text.is_empty() => {
                // Nothing to type out: complete without ticking
                self.reveal.cancel();
                self.notify(WidgetEvent::RevealFinished {
                    turn_index: job.turn_index(),
                });
                let _ = self
                    .internal_tx
                    .send(Internal::Event(Event::RevealComplete { job }));
            }

            Effect::StartReveal { job, text } => {
                self.reveal.start(job, &text);
            }

            Effect::ScheduleGate { job, delay } => {
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = internal_tx.send(Internal::Event(Event::GateDelayElapsed { job }));
                });
            }

            Effect::ShowGate => {
                // Replace, never stack
                if self.gate_visible {
                    self.notify(WidgetEvent::GateDeactivated);
                }
                self.gate_visible = true;
                self.notify(WidgetEvent::GateActivated);
            }

            Effect::GateSubmitting => self.notify(WidgetEvent::GateSubmitting),

            Effect::ReenableGate { message } => {
                self.notify(WidgetEvent::GateReenabled { message });
            }

            Effect::HideGate => {
                if self.gate_visible {
                    self.gate_visible = false;
                    self.notify(WidgetEvent::GateDeactivated);
                }
            }
        }
    }

    fn handle_tick(&mut self, job: RevealJobId) {
        match self.reveal.on_tick(job) {
            RevealTick::Stale => {}
            RevealTick::Progress { job, visible } => {
                self.notify(WidgetEvent::RevealProgress {
                    turn_index: job.turn_index(),
                    visible,
                });
            }
            RevealTick::Finished { job, visible } => {
                let turn_index = job.turn_index();
                if !visible.is_empty() {
                    self.notify(WidgetEvent::RevealProgress { turn_index, visible });
                }
                self.notify(WidgetEvent::RevealFinished { turn_index });
                self.process_event(Event::RevealComplete { job });
            }
        }
    }

    fn schedule_greeting(&mut self) {
        if self.greeted || self.greeting.is_none() {
            return;
        }
        self.greeted = true;

        let internal_tx = self.internal_tx.clone();
        let delay = self.greeting_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal_tx.send(Internal::Greet);
        });
    }

    fn greet(&mut self) {
        // Only an empty conversation gets a welcome
        if !self.transcript.is_empty() {
            return;
        }
        if let Some(text) = self.greeting.clone() {
            self.notify(WidgetEvent::Greeting { text });
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            transcript: self.transcript.snapshot(),
            state: self.state.clone(),
            sending: self.state.is_sending(),
            placeholder_visible: self.placeholder_visible,
            gate_visible: self.gate_visible,
            revealing: self.reveal.active_job(),
        }
    }

    fn notify(&self, event: WidgetEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
