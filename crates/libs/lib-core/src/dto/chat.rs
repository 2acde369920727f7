//! # Chat Data Transfer Objects
//!
//! ## Endpoints Using These DTOs
//!
//! - `GET /messages` -> `Vec<`[`MessageDto`]`>`
//! - `POST /messages` - [`CreateMessageRequest`] -> [`MessageDto`]
//! - `POST /ai-chat` - [`AiChatRequest`] -> [`AiChatResponse`]
//! - `POST /chat` - [`TurnRequest`] -> [`TurnResponse`]
//! - `GET /ws` - server frames [`RealtimeEvent`], client frames [`ClientFrame`]
//!
//! Message JSON:
//! ```text
//! { "id": 12, "text": "Hi", "sender": "user", "timestamp": "2025-01-01T10:00:00.000000Z" }
//! ```

use crate::model::{Message, Sender};
use lib_utils::format_time;
use serde::{Deserialize, Serialize};

/// Message as returned to clients. The owner is implied by the credential and not echoed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDto {
    pub id: i64,
    pub text: String,
    pub sender: Sender,
    pub timestamp: String,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            text: message.text.clone(),
            sender: message.sender,
            timestamp: format_time(message.timestamp),
        }
    }
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self::from(&message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub text: String,
    pub sender: Sender,
}

/// One prior turn of a client-supplied transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub sender: Sender,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiChatRequest {
    pub messages: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiChatResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub text: String,
}

/// Result of a server-orchestrated turn.
///
/// `degraded` is set when the AI call failed and `reply` is the fallback text;
/// `persisted` is false when the reply could not be stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub user_message: MessageDto,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_message: Option<MessageDto>,
    pub degraded: bool,
    pub persisted: bool,
}

/// Frames pushed from the server over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    /// A message was persisted for the connection's owner.
    #[serde(rename = "message")]
    Message { data: MessageDto },

    /// Relay of a client `sendMessage` frame.
    #[serde(rename = "receiveMessage")]
    ReceiveMessage { payload: serde_json::Value },
}

/// Frames accepted from clients over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "sendMessage")]
    SendMessage { payload: serde_json::Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_utils::from_micros;
    use serde_json::json;

    #[test]
    fn test_message_dto_shape() {
        let message = Message {
            id: 3,
            user_id: 9,
            sender: Sender::Ai,
            text: "Hello".to_string(),
            timestamp: from_micros(1_700_000_000_000_001).unwrap(),
        };

        let value = serde_json::to_value(MessageDto::from(&message)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "text": "Hello",
                "sender": "ai",
                "timestamp": "2023-11-14T22:13:20.000001Z"
            })
        );
    }

    #[test]
    fn test_realtime_event_tags() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "sendMessage", "payload": {"text": "yo"}})).unwrap();
        let ClientFrame::SendMessage { payload } = frame;

        let event = RealtimeEvent::ReceiveMessage { payload };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "receiveMessage", "payload": {"text": "yo"}})
        );
    }
}
