//! # Stateless AI Completion Handler
//!
//! `POST /ai-chat` answers a client-supplied transcript. Nothing is stored or
//! published; a gateway failure is a `500`.

use super::utils::parse_json_body;
use crate::chat::{ChatError, ChatOrchestrator};
use crate::middleware::CurrentUser;
use axum::{
    body::Bytes,
    extract::{Extension, State},
    Json,
};
use lib_core::dto::{AiChatRequest, AiChatResponse};
use std::sync::Arc;

pub async fn ai_chat(
    State(chat): State<Arc<ChatOrchestrator>>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> Result<Json<AiChatResponse>, ChatError> {
    let req: AiChatRequest = parse_json_body(&body)?;
    let reply = chat.complete_transcript(user.id, req.messages).await?;
    Ok(Json(AiChatResponse { reply }))
}
