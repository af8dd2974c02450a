//! Mock implementations for testing
//!
//! These mocks enable integration testing of the engine without real I/O.

use super::{ConversationEngine, ConversationHandle, EngineSnapshot, WidgetEvent};
use crate::config::WidgetConfig;
use crate::transport::{ExchangeClient, ExchangeReply, ExchangeRequest, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Exchange Client
// ============================================================================

/// Mock exchange client that returns queued outcomes
pub struct MockExchangeClient {
    responses: Mutex<VecDeque<Result<ExchangeReply, TransportError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ExchangeRequest>>,
}

impl MockExchangeClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: ExchangeReply) {
        self.responses.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue a failed exchange
    pub fn queue_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<ExchangeRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_outcome(&self) -> Result<ExchangeReply, TransportError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock response queued")))
    }
}

impl Default for MockExchangeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for MockExchangeClient {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReply, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_outcome()
    }
}

// ============================================================================
// Delayed Mock Exchange Client (for in-flight testing)
// ============================================================================

/// Mock exchange client that answers after a fixed delay
pub struct DelayedMockExchangeClient {
    inner: MockExchangeClient,
    delay: Duration,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
}

impl DelayedMockExchangeClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockExchangeClient::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, reply: ExchangeReply) {
        self.inner.queue_reply(reply);
    }

    pub fn recorded_requests(&self) -> Vec<ExchangeRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl ExchangeClient for DelayedMockExchangeClient {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReply, TransportError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_outcome()
    }
}

// ============================================================================
// Test Engine
// ============================================================================

/// Fast timings so integration tests finish quickly
pub fn test_config() -> WidgetConfig {
    WidgetConfig {
        reveal_speed: Duration::from_millis(1),
        gate_delay: Duration::from_millis(5),
        greeting: Some("Welcome!".to_string()),
        greeting_delay: Duration::from_millis(1),
        ..WidgetConfig::default()
    }
}

/// Running engine plus everything a test needs to observe it
pub struct TestEngine<C: ExchangeClient + 'static> {
    pub handle: ConversationHandle,
    pub client: Arc<C>,
    events: broadcast::Receiver<WidgetEvent>,
    /// Every event received so far, in order
    pub seen: Vec<WidgetEvent>,
}

impl<C: ExchangeClient + 'static> TestEngine<C> {
    pub fn start(client: C) -> Self {
        Self::with_config(&test_config(), client)
    }

    pub fn with_config(config: &WidgetConfig, client: C) -> Self {
        let client = Arc::new(client);
        let handle = ConversationEngine::spawn(config, client.clone());
        let events = handle.subscribe();
        Self {
            handle,
            client,
            events,
            seen: Vec::new(),
        }
    }

    pub async fn send(&self, text: &str) {
        self.handle
            .submit_user_message(text)
            .await
            .expect("engine stopped");
    }

    pub async fn submit_gate(&self, raw: &str) {
        self.handle.submit_gate(raw).await.expect("engine stopped");
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.handle.snapshot().await.expect("engine stopped")
    }

    /// Wait for an event matching `pred`, recording everything seen
    pub async fn wait_for(
        &mut self,
        pred: impl Fn(&WidgetEvent) -> bool,
        timeout: Duration,
    ) -> Option<WidgetEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.events.recv()).await {
                Ok(Ok(event)) => {
                    self.seen.push(event.clone());
                    if pred(&event) {
                        return Some(event);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
            }
        }
    }

    /// Wait until the given turn has been fully revealed
    pub async fn wait_for_reveal(&mut self, turn: usize) -> bool {
        self.wait_for(
            |e| matches!(e, WidgetEvent::RevealFinished { turn_index } if *turn_index == turn),
            Duration::from_secs(2),
        )
        .await
        .is_some()
    }

    /// Record events for `duration` without waiting on anything in particular
    pub async fn settle(&mut self, duration: Duration) {
        self.wait_for(|_| false, duration).await;
    }

    pub fn count_seen(&self, pred: impl Fn(&WidgetEvent) -> bool) -> usize {
        self.seen.iter().filter(|e| pred(e)).count()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GATE_RETRY_MESSAGE;
    use crate::state_machine::{ConvState, PendingRequest, EXCHANGE_FAILED_MESSAGE};
    use crate::transcript::Role;

    const WAIT: Duration = Duration::from_secs(2);

    fn contents(snapshot: &EngineSnapshot) -> Vec<(Role, String)> {
        snapshot
            .transcript
            .iter()
            .map(|t| (t.role, t.content.clone()))
            .collect()
    }

    async fn open_gate(rt: &mut TestEngine<MockExchangeClient>) {
        rt.send("Can you email me details?").await;
        assert!(rt
            .wait_for(|e| matches!(e, WidgetEvent::GateActivated), WAIT)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_mock_exchange_client() {
        let mock = MockExchangeClient::new();
        mock.queue_reply(ExchangeReply::new("Hello"));

        let request = ExchangeRequest {
            message: "hi".to_string(),
            history: vec![],
            collected_field: None,
        };

        let reply = mock.exchange(&request).await.unwrap();
        assert_eq!(reply.reply, "Hello");

        // Second call should fail (nothing queued)
        assert!(mock.exchange(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    /// Plain question and answer, no gate
    #[tokio::test]
    async fn test_simple_exchange() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::new("5 years in backend systems."));

        let mut rt = TestEngine::start(llm);
        rt.send("What is your experience?").await;
        assert!(rt.wait_for_reveal(1).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::User, "What is your experience?".to_string()),
                (Role::Assistant, "5 years in backend systems.".to_string()),
            ]
        );
        assert_eq!(snapshot.state, ConvState::Idle);
        assert!(!snapshot.sending);
        assert!(!snapshot.gate_visible);
        assert!(!snapshot.placeholder_visible);
        assert_eq!(rt.count_seen(|e| matches!(e, WidgetEvent::GateActivated)), 0);

        let requests = rt.client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "What is your experience?");
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_event_order_for_one_turn() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::new("Hi."));

        let mut rt = TestEngine::start(llm);
        rt.send("Hello").await;
        assert!(rt.wait_for_reveal(1).await);

        let position = |pred: &dyn Fn(&WidgetEvent) -> bool| {
            rt.seen.iter().position(pred).expect("event missing")
        };
        let user = position(&|e| matches!(e, WidgetEvent::TurnAppended { index: 0, .. }));
        let sending = position(&|e| matches!(e, WidgetEvent::SendingChanged { sending: true }));
        let placeholder = position(&|e| matches!(e, WidgetEvent::PlaceholderShown));
        let removed = position(&|e| matches!(e, WidgetEvent::PlaceholderRemoved));
        let assistant = position(&|e| matches!(e, WidgetEvent::TurnAppended { index: 1, .. }));
        let idle = position(&|e| matches!(e, WidgetEvent::SendingChanged { sending: false }));
        let finished = position(&|e| matches!(e, WidgetEvent::RevealFinished { turn_index: 1 }));

        assert!(sending < user && user < placeholder);
        assert!(placeholder < removed && removed < assistant);
        // Sending clears on the response, before the reveal is done
        assert!(idle < finished);
    }

    #[tokio::test]
    async fn test_reveal_progress_grows_to_reply() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::new("Typing..."));

        let mut rt = TestEngine::start(llm);
        rt.send("Show me").await;
        assert!(rt.wait_for_reveal(1).await);

        let partials: Vec<&String> = rt
            .seen
            .iter()
            .filter_map(|e| match e {
                WidgetEvent::RevealProgress {
                    turn_index: 1,
                    visible,
                } => Some(visible),
                _ => None,
            })
            .collect();

        assert_eq!(partials.len(), "Typing...".chars().count());
        for pair in partials.windows(2) {
            assert!(pair[1].len() > pair[0].len());
            assert!(pair[1].starts_with(pair[0].as_str()));
        }
        assert_eq!(partials.last().unwrap().as_str(), "Typing...");
    }

    #[tokio::test]
    async fn test_empty_reply_finishes_without_progress() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::new(""));

        let mut rt = TestEngine::start(llm);
        rt.send("Anything?").await;
        assert!(rt.wait_for_reveal(1).await);

        assert_eq!(
            rt.count_seen(|e| matches!(e, WidgetEvent::RevealProgress { .. })),
            0
        );
        // Completion is posted back through the engine queue
        rt.settle(Duration::from_millis(20)).await;
        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.state, ConvState::Idle);
        assert_eq!(snapshot.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_ignored() {
        let mut rt = TestEngine::start(MockExchangeClient::new());
        rt.send("   ").await;
        rt.send("").await;

        let snapshot = rt.snapshot().await;
        assert!(snapshot.transcript.is_empty());
        assert_eq!(snapshot.state, ConvState::Idle);

        rt.settle(Duration::from_millis(20)).await;
        assert!(rt.client.recorded_requests().is_empty());
        assert!(rt.seen.is_empty());
    }

    /// Messages sent while an exchange is outstanding are dropped, not queued
    #[tokio::test]
    async fn test_send_while_busy_rejected() {
        let llm = DelayedMockExchangeClient::new(Duration::from_millis(100));
        llm.queue_reply(ExchangeReply::new("First answer"));
        llm.queue_reply(ExchangeReply::new("Should never be used"));

        let mut rt = TestEngine::start(llm);
        rt.send("first").await;
        rt.send("second").await;
        rt.send("third").await;

        let snapshot = rt.snapshot().await;
        assert!(snapshot.sending);
        assert_eq!(snapshot.transcript.len(), 1);

        assert!(rt.wait_for_reveal(1).await);
        let snapshot = rt.snapshot().await;
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "First answer".to_string()),
            ]
        );
        assert_eq!(rt.client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_history_excludes_new_message() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::new("one-reply"));
        llm.queue_reply(ExchangeReply::new("two-reply"));

        let mut rt = TestEngine::start(llm);
        rt.send("one").await;
        assert!(rt.wait_for_reveal(1).await);
        let before_second = rt.snapshot().await.transcript;

        rt.send("two").await;
        assert!(rt.wait_for_reveal(3).await);

        let requests = rt.client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].message, "two");
        assert_eq!(requests[1].history, before_second);
    }

    /// Email gate: invalid address rejected, valid one resends the question
    #[tokio::test]
    async fn test_gate_flow() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::gated("Sure, I can follow up."));
        llm.queue_reply(ExchangeReply::new("Thanks! I'll be in touch."));

        let mut rt = TestEngine::start(llm);
        open_gate(&mut rt).await;

        let snapshot = rt.snapshot().await;
        assert!(snapshot.gate_visible);
        assert_eq!(
            snapshot.pending_request(),
            Some(&PendingRequest::new("Can you email me details?"))
        );
        // The gate only shows once the reveal has finished
        let finished = rt
            .seen
            .iter()
            .position(|e| matches!(e, WidgetEvent::RevealFinished { turn_index: 1 }))
            .unwrap();
        let activated = rt
            .seen
            .iter()
            .position(|e| matches!(e, WidgetEvent::GateActivated))
            .unwrap();
        assert!(finished < activated);

        rt.submit_gate("notanemail").await;
        let rejected = rt
            .wait_for(|e| matches!(e, WidgetEvent::GateReenabled { .. }), WAIT)
            .await;
        assert_eq!(
            rejected,
            Some(WidgetEvent::GateReenabled {
                message: "Please enter a valid email address".to_string()
            })
        );
        assert_eq!(rt.client.recorded_requests().len(), 1);
        assert_eq!(rt.snapshot().await.transcript.len(), 2);

        rt.submit_gate("jane@example.com").await;
        assert!(rt.wait_for_reveal(2).await);

        let requests = rt.client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].message, "Can you email me details?");
        assert_eq!(requests[1].collected_field.as_deref(), Some("jane@example.com"));
        assert_eq!(requests[1].history.len(), 2);

        let snapshot = rt.snapshot().await;
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::User, "Can you email me details?".to_string()),
                (Role::Assistant, "Sure, I can follow up.".to_string()),
                (Role::Assistant, "Thanks! I'll be in touch.".to_string()),
            ]
        );
        assert!(!snapshot.gate_visible);
        assert!(snapshot.pending_request().is_none());
        assert_eq!(snapshot.state, ConvState::Idle);
        assert_eq!(rt.count_seen(|e| matches!(e, WidgetEvent::GateDeactivated)), 1);
        assert_eq!(rt.count_seen(|e| matches!(e, WidgetEvent::GateSubmitting)), 1);
    }

    #[tokio::test]
    async fn test_gate_exchange_failure_allows_retry() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::gated("Sure, I can follow up."));
        llm.queue_error(TransportError::status(500, "HTTP 500"));
        llm.queue_reply(ExchangeReply::new("Got it."));

        let mut rt = TestEngine::start(llm);
        open_gate(&mut rt).await;

        rt.submit_gate("jane@example.com").await;
        let notice = rt
            .wait_for(|e| matches!(e, WidgetEvent::GateReenabled { .. }), WAIT)
            .await;
        assert_eq!(
            notice,
            Some(WidgetEvent::GateReenabled {
                message: GATE_RETRY_MESSAGE.to_string()
            })
        );

        let snapshot = rt.snapshot().await;
        assert!(snapshot.gate_visible);
        assert!(!snapshot.sending);
        assert_eq!(
            snapshot.pending_request(),
            Some(&PendingRequest::new("Can you email me details?"))
        );
        // Gate failures never add an error turn
        assert_eq!(snapshot.transcript.len(), 2);
        assert!(snapshot.transcript.iter().all(|t| !t.is_error));

        rt.submit_gate("jane@example.com").await;
        assert!(rt.wait_for_reveal(2).await);
        let requests = rt.client.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].message, "Can you email me details?");
        assert_eq!(rt.snapshot().await.state, ConvState::Idle);
    }

    #[tokio::test]
    async fn test_message_blocked_while_gate_open() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::gated("Sure, I can follow up."));
        llm.queue_reply(ExchangeReply::new("unused"));

        let mut rt = TestEngine::start(llm);
        open_gate(&mut rt).await;

        rt.send("Something else").await;
        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.transcript.len(), 2);
        assert!(snapshot.gate_visible);
        assert_eq!(rt.client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_abandon_gate() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::gated("Sure, I can follow up."));
        llm.queue_reply(ExchangeReply::new("Happy to help."));

        let mut rt = TestEngine::start(llm);
        open_gate(&mut rt).await;

        rt.handle.abandon_gate().await.unwrap();
        assert!(rt
            .wait_for(|e| matches!(e, WidgetEvent::GateDeactivated), WAIT)
            .await
            .is_some());

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.state, ConvState::Idle);
        assert!(snapshot.pending_request().is_none());

        rt.send("Another question").await;
        assert!(rt.wait_for_reveal(3).await);
        assert_eq!(rt.snapshot().await.transcript.len(), 4);
    }

    /// Transport failure in the main flow becomes one error turn
    #[tokio::test]
    async fn test_exchange_failure_appends_error_turn() {
        let llm = MockExchangeClient::new();
        llm.queue_error(TransportError::network("connection refused"));

        let mut rt = TestEngine::start(llm);
        rt.send("Hi").await;
        let appended = rt
            .wait_for(|e| matches!(e, WidgetEvent::TurnAppended { index: 1, .. }), WAIT)
            .await;
        assert!(appended.is_some());

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.transcript.len(), 2);
        assert!(snapshot.transcript[1].is_error);
        assert_eq!(snapshot.transcript[1].content, EXCHANGE_FAILED_MESSAGE);
        assert!(!snapshot.sending);
        assert!(!snapshot.placeholder_visible);
        assert_eq!(snapshot.state, ConvState::Idle);
        assert!(snapshot.pending_request().is_none());
        assert_eq!(rt.client.recorded_requests().len(), 1);
    }

    /// A new message during a reveal supersedes it; the old reply's gate never opens
    #[tokio::test]
    async fn test_new_reveal_supersedes_old() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::gated(
            "I don't have that information right now, but I can find out.",
        ));
        llm.queue_reply(ExchangeReply::new("Short."));

        let config = WidgetConfig {
            reveal_speed: Duration::from_millis(10),
            ..test_config()
        };
        let mut rt = TestEngine::with_config(&config, llm);

        rt.send("Where did you study?").await;
        assert!(rt
            .wait_for(|e| matches!(e, WidgetEvent::RevealProgress { turn_index: 1, .. }), WAIT)
            .await
            .is_some());

        rt.send("Never mind").await;
        assert!(rt.wait_for_reveal(3).await);
        rt.settle(Duration::from_millis(50)).await;

        let superseded_at = rt
            .seen
            .iter()
            .position(|e| matches!(e, WidgetEvent::TurnAppended { index: 3, .. }))
            .unwrap();
        assert!(!rt.seen[superseded_at..]
            .iter()
            .any(|e| matches!(e, WidgetEvent::RevealProgress { turn_index: 1, .. })));
        assert_eq!(
            rt.count_seen(|e| matches!(e, WidgetEvent::RevealFinished { turn_index: 1 })),
            0
        );
        assert_eq!(rt.count_seen(|e| matches!(e, WidgetEvent::GateActivated)), 0);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.state, ConvState::Idle);
        assert_eq!(snapshot.transcript.len(), 4);
        assert_eq!(snapshot.revealing, None);
    }

    #[tokio::test]
    async fn test_greeting_shown_once() {
        let mut rt = TestEngine::start(MockExchangeClient::new());
        rt.handle.open().await.unwrap();

        let greeting = rt
            .wait_for(|e| matches!(e, WidgetEvent::Greeting { .. }), WAIT)
            .await;
        assert_eq!(
            greeting,
            Some(WidgetEvent::Greeting {
                text: "Welcome!".to_string()
            })
        );

        rt.handle.open().await.unwrap();
        rt.settle(Duration::from_millis(30)).await;
        assert_eq!(rt.count_seen(|e| matches!(e, WidgetEvent::Greeting { .. })), 1);
        assert!(rt.snapshot().await.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_no_greeting_after_conversation_started() {
        let llm = MockExchangeClient::new();
        llm.queue_reply(ExchangeReply::new("Hello!"));

        let mut rt = TestEngine::start(llm);
        rt.send("Hi").await;
        rt.handle.open().await.unwrap();
        assert!(rt.wait_for_reveal(1).await);
        rt.settle(Duration::from_millis(30)).await;

        assert_eq!(rt.count_seen(|e| matches!(e, WidgetEvent::Greeting { .. })), 0);
    }
}
