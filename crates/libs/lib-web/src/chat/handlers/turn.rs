//! # Chat Turn Handler
//!
//! `POST /chat` runs a full turn on the server: store the user's text, ask the
//! AI with the stored history, store and push the reply.
//!
//! Only a failure to store the user's text is an error response. An AI failure
//! answers `200` with the fallback reply and `degraded: true`.

use super::utils::parse_json_body;
use crate::chat::{ChatError, ChatOperation, ChatOrchestrator, ChatOutput};
use crate::middleware::CurrentUser;
use axum::{
    body::Bytes,
    extract::{Extension, State},
};
use lib_core::dto::TurnRequest;
use std::sync::Arc;

pub async fn chat_turn(
    State(chat): State<Arc<ChatOrchestrator>>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> Result<ChatOutput, ChatError> {
    let req: TurnRequest = parse_json_body(&body)?;
    chat.dispatch(user.id, ChatOperation::Turn { text: req.text }).await
}
