//! # Chat Handlers
//!
//! HTTP and websocket handlers for the chat routes. Every route here sits
//! behind [`require_auth`](crate::middleware::require_auth) except `/ws`, which
//! reads its token from the query string.

// region: --- Modules
pub mod ai_chat;
pub mod messages;
pub mod realtime;
pub mod turn;
pub mod utils;

#[cfg(test)]
mod tests;
// endregion: --- Modules

// region: --- Re-exports
pub use ai_chat::ai_chat;
pub use messages::{create_message, list_messages};
pub use realtime::chat_websocket;
pub use turn::chat_turn;
// endregion: --- Re-exports

use super::orchestrator::ChatOutput;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lib_core::dto::{MessageDto, TurnResponse};

impl IntoResponse for ChatOutput {
    fn into_response(self) -> Response {
        match self {
            ChatOutput::History(messages) => {
                let body: Vec<MessageDto> = messages.iter().map(MessageDto::from).collect();
                Json(body).into_response()
            }
            ChatOutput::Stored(message) => {
                (StatusCode::CREATED, Json(MessageDto::from(message))).into_response()
            }
            ChatOutput::Turn(outcome) => Json(TurnResponse::from(outcome)).into_response(),
        }
    }
}
