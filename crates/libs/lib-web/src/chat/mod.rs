//! # Chat Module
//!
//! Per-user chat history with an AI assistant and real-time push of new
//! messages to the user's open connections.
//!
//! - [`hub`] - live connection registry and fan-out
//! - [`gateway`] - OpenAI-compatible completion client
//! - [`orchestrator`] - validation, persistence, publishing and the AI turn
//! - [`handlers`] - HTTP and websocket endpoints

pub mod gateway;
pub mod handlers;
pub mod hub;
pub mod orchestrator;

pub use gateway::{AiGateway, AiProvider, GatewayConfig, GatewayError, OpenAiGateway, TranscriptTurn};
pub use hub::{Audience, BroadcastHub, PublishReport, Subscription};
pub use orchestrator::{
    ChatError, ChatOperation, ChatOrchestrator, ChatOutput, TurnError, TurnOutcome, TurnState,
};
