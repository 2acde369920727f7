//! # Message History Handlers
//!
//! - `GET /messages` - the caller's history, oldest first
//! - `POST /messages` - store one message for the caller (`201` with the stored record)

use super::utils::parse_json_body;
use crate::chat::{ChatError, ChatOperation, ChatOrchestrator, ChatOutput};
use crate::middleware::CurrentUser;
use axum::{
    body::Bytes,
    extract::{Extension, State},
};
use lib_core::dto::CreateMessageRequest;
use std::sync::Arc;

pub async fn list_messages(
    State(chat): State<Arc<ChatOrchestrator>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<ChatOutput, ChatError> {
    chat.dispatch(user.id, ChatOperation::List).await
}

pub async fn create_message(
    State(chat): State<Arc<ChatOrchestrator>>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> Result<ChatOutput, ChatError> {
    let req: CreateMessageRequest = parse_json_body(&body)?;
    chat.dispatch(
        user.id,
        ChatOperation::Append {
            sender: req.sender,
            text: req.text,
        },
    )
    .await
}
