//! # Chat Orchestrator
//!
//! Composes credential validation, message persistence, real-time fan-out and
//! the AI gateway into the chat operations exposed over HTTP.
//!
//! ## Turn lifecycle
//!
//! ```text
//! Idle -> Validating -> PersistingUser -> AwaitingAi -> PersistingAssistant -> Done
//!             |               |               |                  |
//!             +---------------+---------------+------------------+--> Error(..)
//! ```
//!
//! - A credential failure stops before any side effect.
//! - A failed user append stops before the AI is called.
//! - A gateway failure still answers, with [`GATEWAY_FALLBACK_REPLY`], which is
//!   not stored.
//! - A failed assistant append still returns the reply and reports the fault.
//!
//! Every message stored during a turn is published to the owner's connections.
//! No lock is held across the gateway call.

use crate::chat::gateway::{AiGateway, GatewayError, TranscriptTurn};
use crate::chat::hub::{Audience, BroadcastHub};
use axum::response::{IntoResponse, Response};
use lib_auth::{AuthError, TokenValidator};
use lib_core::dto::{MessageDto, RealtimeEvent, TurnResponse};
use lib_core::{AppError, Message, MessageStore, Sender, StoreError, UserId};
use lib_utils::{validate_max_length, validate_not_empty};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reply returned to the user when the AI call fails during a turn.
pub const GATEWAY_FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Largest accepted message text, in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

pub const DEFAULT_CONTEXT_WINDOW: usize = 20;

// region: --- Errors

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Unauthorized(e) => AppError::Unauthorized(e.to_string()),
            ChatError::InvalidInput(msg) => AppError::BadRequest(msg),
            ChatError::Store(e) => AppError::StoreFailure(e.to_string()),
            ChatError::Gateway(e) => AppError::GatewayFailure(e.to_string()),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

// endregion: --- Errors

// region: --- Turn state

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnError {
    Unauthorized,
    StoreFailure,
    GatewayFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Validating,
    PersistingUser,
    AwaitingAi,
    PersistingAssistant,
    Done,
    Error(TurnError),
}

/// Records and logs the states a turn passes through.
struct TurnTrace {
    user_id: Option<UserId>,
    states: Vec<TurnState>,
}

impl TurnTrace {
    fn new() -> Self {
        Self {
            user_id: None,
            states: vec![TurnState::Idle],
        }
    }

    /// Trace for a caller whose credential was already checked upstream.
    fn authorized(user_id: UserId) -> Self {
        let mut trace = Self::new();
        trace.advance(TurnState::Validating);
        trace.user_id = Some(user_id);
        trace
    }

    fn current(&self) -> TurnState {
        self.states.last().copied().unwrap_or(TurnState::Idle)
    }

    fn advance(&mut self, next: TurnState) {
        debug!(user_id = ?self.user_id, from = ?self.current(), to = ?next, "[CHAT] Turn state");
        self.states.push(next);
    }
}

/// Result of one human-to-AI turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub user_message: Message,
    pub reply: String,
    /// Stored reply; `None` when the reply is the fallback or could not be stored.
    pub reply_message: Option<Message>,
    pub gateway_error: Option<GatewayError>,
    pub persist_error: Option<String>,
    pub trace: Vec<TurnState>,
}

impl TurnOutcome {
    pub fn final_state(&self) -> TurnState {
        self.trace.last().copied().unwrap_or(TurnState::Idle)
    }

    pub fn degraded(&self) -> bool {
        self.gateway_error.is_some()
    }

    pub fn persisted(&self) -> bool {
        self.reply_message.is_some()
    }
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        let degraded = outcome.degraded();
        let persisted = outcome.persisted();
        Self {
            user_message: MessageDto::from(&outcome.user_message),
            reply: outcome.reply,
            reply_message: outcome.reply_message.as_ref().map(MessageDto::from),
            degraded,
            persisted,
        }
    }
}

// endregion: --- Turn state

// region: --- Operations

#[derive(Debug, Clone)]
pub enum ChatOperation {
    List,
    Append { sender: Sender, text: String },
    Turn { text: String },
}

#[derive(Debug, Clone)]
pub enum ChatOutput {
    History(Vec<Message>),
    Stored(Message),
    Turn(TurnOutcome),
}

fn validate_text(text: &str) -> Result<(), ChatError> {
    validate_not_empty(text, "text").map_err(ChatError::InvalidInput)?;
    validate_max_length(text, MAX_MESSAGE_LENGTH, "text").map_err(ChatError::InvalidInput)?;
    Ok(())
}

fn to_transcript(messages: &[Message]) -> Vec<TranscriptTurn> {
    messages
        .iter()
        .map(|message| TranscriptTurn {
            sender: message.sender,
            text: message.text.clone(),
        })
        .collect()
}

// endregion: --- Operations

pub struct ChatOrchestrator {
    validator: TokenValidator,
    store: Arc<dyn MessageStore>,
    hub: Arc<BroadcastHub>,
    gateway: Arc<dyn AiGateway>,
    context_window: usize,
}

impl ChatOrchestrator {
    pub fn new(
        validator: TokenValidator,
        store: Arc<dyn MessageStore>,
        hub: Arc<BroadcastHub>,
        gateway: Arc<dyn AiGateway>,
    ) -> Self {
        Self {
            validator,
            store,
            hub,
            gateway,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Limit how many stored messages are sent to the AI per turn (at least one).
    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window.max(1);
        self
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Resolve a raw `Authorization` header value to the caller's id.
    pub fn authorize(&self, raw_header: Option<&str>) -> Result<UserId, ChatError> {
        self.validator.validate(raw_header).map_err(|e| {
            debug!("[AUTH] Rejected credential: {}", e);
            ChatError::Unauthorized(e)
        })
    }

    /// Resolve a bare token (websocket query string) to the caller's id.
    pub fn authorize_token(&self, token: &str) -> Result<UserId, ChatError> {
        self.validator.validate_token(token).map_err(|e| {
            debug!("[AUTH] Rejected websocket credential: {}", e);
            ChatError::Unauthorized(e)
        })
    }

    /// Validate the credential, then run the operation for that caller.
    pub async fn handle(
        &self,
        raw_header: Option<&str>,
        operation: ChatOperation,
    ) -> Result<ChatOutput, ChatError> {
        let mut trace = TurnTrace::new();
        trace.advance(TurnState::Validating);

        let user_id = match self.authorize(raw_header) {
            Ok(user_id) => user_id,
            Err(e) => {
                trace.advance(TurnState::Error(TurnError::Unauthorized));
                return Err(e);
            }
        };
        trace.user_id = Some(user_id);

        self.run(user_id, operation, trace).await
    }

    /// Run an operation for an already authenticated caller.
    pub async fn dispatch(&self, user_id: UserId, operation: ChatOperation) -> Result<ChatOutput, ChatError> {
        self.run(user_id, operation, TurnTrace::authorized(user_id)).await
    }

    async fn run(
        &self,
        user_id: UserId,
        operation: ChatOperation,
        trace: TurnTrace,
    ) -> Result<ChatOutput, ChatError> {
        match operation {
            ChatOperation::List => self.list(user_id).await.map(ChatOutput::History),
            ChatOperation::Append { sender, text } => {
                self.append(user_id, sender, &text).await.map(ChatOutput::Stored)
            }
            ChatOperation::Turn { text } => self.run_turn(user_id, &text, trace).await.map(ChatOutput::Turn),
        }
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<Message>, ChatError> {
        let messages = self.store.list_by_user(user_id).await?;
        debug!(user_id, count = messages.len(), "[CHAT] History listed");
        Ok(messages)
    }

    /// Store one message for the caller and push it to their connections.
    pub async fn append(&self, user_id: UserId, sender: Sender, text: &str) -> Result<Message, ChatError> {
        validate_text(text)?;
        let message = self.store.append(user_id, sender, text).await?;
        info!(user_id, message_id = message.id, sender = %sender, "[CHAT] Message stored");
        self.publish_stored(&message).await;
        Ok(message)
    }

    /// Stateless completion over a client-supplied transcript. Nothing is stored.
    pub async fn complete_transcript(
        &self,
        user_id: UserId,
        transcript: Vec<TranscriptTurn>,
    ) -> Result<String, ChatError> {
        if transcript.is_empty() {
            return Err(ChatError::InvalidInput("messages cannot be empty".to_string()));
        }
        for turn in &transcript {
            validate_max_length(&turn.text, MAX_MESSAGE_LENGTH, "text").map_err(ChatError::InvalidInput)?;
        }

        let skip = transcript.len().saturating_sub(self.context_window);
        let window = &transcript[skip..];

        let reply = self.gateway.complete(window).await.map_err(|e| {
            error!(user_id, "[AI] Completion failed: {}", e);
            ChatError::Gateway(e)
        })?;

        info!(user_id, turns = window.len(), "[AI] Completion served");
        Ok(reply)
    }

    async fn run_turn(&self, user_id: UserId, text: &str, mut trace: TurnTrace) -> Result<TurnOutcome, ChatError> {
        validate_text(text)?;

        trace.advance(TurnState::PersistingUser);
        let user_message = match self.store.append(user_id, Sender::User, text).await {
            Ok(message) => message,
            Err(e) => {
                trace.advance(TurnState::Error(TurnError::StoreFailure));
                error!(user_id, "[CHAT] Could not store user turn: {}", e);
                return Err(ChatError::Store(e));
            }
        };

        trace.advance(TurnState::AwaitingAi);
        let transcript = self.transcript_for(&user_message).await;

        let reply = match self.gateway.complete(&transcript).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id, "[AI] Turn degraded to fallback reply: {}", e);
                trace.advance(TurnState::Error(TurnError::GatewayFailure));
                self.publish_stored(&user_message).await;
                return Ok(TurnOutcome {
                    user_message,
                    reply: GATEWAY_FALLBACK_REPLY.to_string(),
                    reply_message: None,
                    gateway_error: Some(e),
                    persist_error: None,
                    trace: trace.states,
                });
            }
        };

        trace.advance(TurnState::PersistingAssistant);
        let (reply_message, persist_error) = match self.store.append(user_id, Sender::Ai, &reply).await {
            Ok(message) => (Some(message), None),
            Err(e) => {
                error!(user_id, "[CHAT] Could not store assistant reply: {}", e);
                (None, Some(e.to_string()))
            }
        };

        self.publish_stored(&user_message).await;
        if let Some(message) = &reply_message {
            self.publish_stored(message).await;
        }

        if persist_error.is_some() {
            trace.advance(TurnState::Error(TurnError::StoreFailure));
        } else {
            trace.advance(TurnState::Done);
        }

        info!(user_id, user_message_id = user_message.id, persisted = reply_message.is_some(), "[CHAT] Turn complete");

        Ok(TurnOutcome {
            user_message,
            reply,
            reply_message,
            gateway_error: None,
            persist_error,
            trace: trace.states,
        })
    }

    /// Stored history up to and including `latest`, trimmed to the context window.
    ///
    /// Only the newest window of rows is read. If history cannot be read the
    /// transcript is just `latest`.
    async fn transcript_for(&self, latest: &Message) -> Vec<TranscriptTurn> {
        let history = match self.store.list_recent(latest.user_id, self.context_window).await {
            Ok(history) => history,
            Err(e) => {
                warn!(user_id = latest.user_id, "[CHAT] History unavailable, sending latest turn only: {}", e);
                Vec::new()
            }
        };

        let mut prior: Vec<Message> = history
            .into_iter()
            .filter(|m| (m.timestamp, m.id) < (latest.timestamp, latest.id))
            .collect();
        let keep = self.context_window.saturating_sub(1);
        let skip = prior.len().saturating_sub(keep);
        prior.drain(..skip);
        prior.push(latest.clone());

        to_transcript(&prior)
    }

    async fn publish_stored(&self, message: &Message) {
        let report = self
            .hub
            .publish(
                Audience::User(message.user_id),
                RealtimeEvent::Message { data: MessageDto::from(message) },
            )
            .await;
        debug!(
            user_id = message.user_id,
            message_id = message.id,
            delivered = report.delivered,
            "[CHAT] Message published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bearer, ScriptedGateway, TEST_SECRET};
    use async_trait::async_trait;
    use lib_core::model::store::create_memory_pool;
    use lib_core::MessageRepository;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    // region: --- Fakes

    /// Real repository that can be told to fail specific calls.
    struct FlakyStore {
        inner: MessageRepository,
        fail_append_for: Option<Sender>,
        fail_list: bool,
        full_listings: AtomicUsize,
    }

    fn refused() -> StoreError {
        StoreError::Database(sqlx::Error::PoolClosed)
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        async fn append(&self, user_id: UserId, sender: Sender, text: &str) -> Result<Message, StoreError> {
            if self.fail_append_for == Some(sender) {
                return Err(refused());
            }
            self.inner.append(user_id, sender, text).await
        }

        async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Message>, StoreError> {
            if self.fail_list {
                return Err(refused());
            }
            self.full_listings.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.list_by_user(user_id).await
        }

        async fn list_recent(&self, user_id: UserId, limit: usize) -> Result<Vec<Message>, StoreError> {
            if self.fail_list {
                return Err(refused());
            }
            self.inner.list_recent(user_id, limit).await
        }
    }

    // endregion: --- Fakes

    async fn store(fail_append_for: Option<Sender>, fail_list: bool) -> Arc<FlakyStore> {
        let pool = create_memory_pool().await.unwrap();
        Arc::new(FlakyStore {
            inner: MessageRepository::new(pool),
            fail_append_for,
            fail_list,
            full_listings: AtomicUsize::new(0),
        })
    }

    fn orchestrator(store: Arc<FlakyStore>, gateway: Arc<ScriptedGateway>) -> ChatOrchestrator {
        ChatOrchestrator::new(
            TokenValidator::new(TEST_SECRET),
            store,
            Arc::new(BroadcastHub::new()),
            gateway,
        )
    }

    fn expect_turn(output: ChatOutput) -> TurnOutcome {
        match output {
            ChatOutput::Turn(outcome) => outcome,
            other => panic!("expected turn outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_turn_stores_both_messages_and_publishes_them() {
        let store = store(None, false).await;
        let gateway = ScriptedGateway::replying("We open at 6am.");
        let chat = orchestrator(store.clone(), gateway.clone());
        let mut sub = chat.hub().register(Some(1)).await;

        let outcome = expect_turn(
            chat.handle(Some(bearer(1).as_str()), ChatOperation::Turn { text: "When do you open?".to_string() })
                .await
                .unwrap(),
        );

        assert_eq!(outcome.reply, "We open at 6am.");
        assert!(outcome.persisted());
        assert!(!outcome.degraded());
        assert_eq!(
            outcome.trace,
            vec![
                TurnState::Idle,
                TurnState::Validating,
                TurnState::PersistingUser,
                TurnState::AwaitingAi,
                TurnState::PersistingAssistant,
                TurnState::Done,
            ]
        );

        let history = store.list_by_user(1).await.unwrap();
        let pairs: Vec<(Sender, &str)> = history.iter().map(|m| (m.sender, m.text.as_str())).collect();
        assert_eq!(pairs, vec![(Sender::User, "When do you open?"), (Sender::Ai, "We open at 6am.")]);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].last().map(|t| t.text.as_str()), Some("When do you open?"));

        for expected in &history {
            match sub.recv().await {
                Some(RealtimeEvent::Message { data }) => assert_eq!(data.id, expected.id),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_gateway_failure_returns_fallback_and_keeps_user_turn() {
        let store = store(None, false).await;
        let chat = orchestrator(store.clone(), ScriptedGateway::failing());

        let outcome = expect_turn(
            chat.dispatch(3, ChatOperation::Turn { text: "Hello?".to_string() }).await.unwrap(),
        );

        assert_eq!(outcome.reply, GATEWAY_FALLBACK_REPLY);
        assert!(outcome.degraded());
        assert!(!outcome.persisted());
        assert_eq!(outcome.final_state(), TurnState::Error(TurnError::GatewayFailure));

        let history = store.list_by_user(3).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[0].text, "Hello?");
    }

    #[tokio::test]
    async fn test_user_append_failure_never_calls_gateway() {
        let gateway = ScriptedGateway::replying("unused");
        let chat = orchestrator(store(Some(Sender::User), false).await, gateway.clone());

        let err = chat
            .dispatch(1, ChatOperation::Turn { text: "Hi".to_string() })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Store(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_assistant_append_failure_still_returns_reply() {
        let store = store(Some(Sender::Ai), false).await;
        let chat = orchestrator(store.clone(), ScriptedGateway::replying("Sure thing."));
        let mut sub = chat.hub().register(Some(1)).await;

        let outcome = expect_turn(
            chat.dispatch(1, ChatOperation::Turn { text: "Can I book?".to_string() }).await.unwrap(),
        );

        assert_eq!(outcome.reply, "Sure thing.");
        assert!(!outcome.persisted());
        assert!(outcome.persist_error.is_some());
        assert_eq!(outcome.final_state(), TurnState::Error(TurnError::StoreFailure));

        // Only the stored user turn is pushed
        assert!(matches!(sub.recv().await, Some(RealtimeEvent::Message { .. })));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_missing_credential_has_no_side_effects() {
        let store = store(None, false).await;
        let gateway = ScriptedGateway::replying("unused");
        let chat = orchestrator(store.clone(), gateway.clone());

        let err = chat
            .handle(None, ChatOperation::Turn { text: "Hi".to_string() })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Unauthorized(AuthError::MissingCredential)));
        assert!(gateway.calls().is_empty());
        assert!(store.list_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_is_trimmed_to_context_window() {
        let store = store(None, false).await;
        for i in 0..5 {
            store.append(1, Sender::User, &format!("old {}", i)).await.unwrap();
        }
        let gateway = ScriptedGateway::replying("ok");
        let chat = orchestrator(store.clone(), gateway.clone()).with_context_window(3);

        chat.dispatch(1, ChatOperation::Turn { text: "newest".to_string() }).await.unwrap();

        let texts: Vec<String> = gateway.calls()[0].iter().map(|t| t.text.clone()).collect();
        assert_eq!(texts, vec!["old 3", "old 4", "newest"]);
        // The transcript reads only the window, never the whole history
        assert_eq!(store.full_listings.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_history_sends_latest_turn_only() {
        let gateway = ScriptedGateway::replying("ok");
        let chat = orchestrator(store(None, true).await, gateway.clone());

        let outcome = expect_turn(
            chat.dispatch(1, ChatOperation::Turn { text: "just me".to_string() }).await.unwrap(),
        );

        assert!(outcome.persisted());
        let calls = gateway.calls();
        assert_eq!(calls[0].len(), 1);
        assert_eq!(calls[0][0].text, "just me");
    }

    #[tokio::test]
    async fn test_append_publishes_to_owner_only() {
        let chat = orchestrator(store(None, false).await, ScriptedGateway::replying("unused"));
        let mut owner = chat.hub().register(Some(1)).await;
        let mut other = chat.hub().register(Some(2)).await;

        let output = chat
            .dispatch(1, ChatOperation::Append { sender: Sender::User, text: "Hi".to_string() })
            .await
            .unwrap();
        let ChatOutput::Stored(stored) = output else {
            panic!("expected stored message");
        };

        assert_eq!(
            owner.recv().await,
            Some(RealtimeEvent::Message { data: MessageDto::from(&stored) })
        );
        assert_eq!(other.try_recv(), None);
    }

    #[tokio::test]
    async fn test_blank_and_oversized_text_rejected() {
        let chat = orchestrator(store(None, false).await, ScriptedGateway::replying("unused"));

        let blank = chat.append(1, Sender::User, "   ").await.unwrap_err();
        assert!(matches!(blank, ChatError::InvalidInput(_)));

        let long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        let oversized = chat.append(1, Sender::User, &long).await.unwrap_err();
        assert!(matches!(oversized, ChatError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_complete_transcript() {
        let chat = orchestrator(store(None, false).await, ScriptedGateway::replying("Hi there"));
        let reply = chat
            .complete_transcript(1, vec![TranscriptTurn { sender: Sender::User, text: "Hi".to_string() }])
            .await
            .unwrap();
        assert_eq!(reply, "Hi there");

        let empty = chat.complete_transcript(1, Vec::new()).await.unwrap_err();
        assert!(matches!(empty, ChatError::InvalidInput(_)));

        let failing = orchestrator(store(None, false).await, ScriptedGateway::failing());
        let err = failing
            .complete_transcript(1, vec![TranscriptTurn { sender: Sender::User, text: "Hi".to_string() }])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Gateway(GatewayError::UpstreamUnavailable(_))));
    }

    #[test]
    fn test_chat_error_status_mapping() {
        use axum::http::StatusCode;

        let cases = [
            (ChatError::Unauthorized(AuthError::MissingCredential), StatusCode::UNAUTHORIZED),
            (ChatError::InvalidInput("bad".to_string()), StatusCode::BAD_REQUEST),
            (ChatError::Store(refused()), StatusCode::INTERNAL_SERVER_ERROR),
            (ChatError::Gateway(GatewayError::NotConfigured), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }
}
