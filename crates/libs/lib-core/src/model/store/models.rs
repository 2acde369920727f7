use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identity of an account, as carried in the `sub` claim of session tokens.
pub type UserId = i64;

/// User entity representing a complete user record from the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Who wrote a message. Stored and sent on the wire as `"user"` / `"ai"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "assistant")]
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "ai" | "assistant" => Ok(Sender::Ai),
            _ => Err(format!("Invalid sender: {}", s)),
        }
    }
}

/// A persisted chat message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub user_id: UserId,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_wire_values() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Sender::Ai).unwrap(), "\"ai\"");
        let parsed: Sender = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(parsed, Sender::Ai);
        assert!(serde_json::from_str::<Sender>("\"system\"").is_err());
    }

    #[test]
    fn test_sender_from_str() {
        assert_eq!("USER".parse::<Sender>(), Ok(Sender::User));
        assert_eq!("ai".parse::<Sender>(), Ok(Sender::Ai));
        assert!("bot".parse::<Sender>().is_err());
    }
}
