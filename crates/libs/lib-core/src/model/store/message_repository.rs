//! # Message Repository
//!
//! Durable, per-user ordered message log.
//!
//! Every operation takes the owning user id as a parameter and every query is
//! filtered on it, so there is no path that reads or writes another user's rows.
//! Ordering within a user is `timestamp` then `id` (insertion order).
//!
//! Timestamps come from a [`MonotonicClock`] seeded with the newest stored
//! timestamp before the first append, so rows written after a restart never
//! sort before existing ones even if the wall clock went backwards.
//!
//! The [`MessageStore`] trait is the seam the chat orchestrator depends on;
//! [`MessageRepository`] is the SQLite implementation.

use super::models::{Message, Sender, UserId};
use super::DbPool;
use async_trait::async_trait;
use lib_utils::{from_micros, MonotonicClock};
use sqlx::FromRow;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error};

/// Persistence failure. Never swallowed: callers always see it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt message record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },
}

/// Ordered, user-scoped message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message for `user_id` and return it with its id and timestamp.
    async fn append(&self, user_id: UserId, sender: Sender, text: &str) -> Result<Message, StoreError>;

    /// All messages owned by `user_id`, oldest first. Empty history is `Ok(vec![])`.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Message>, StoreError>;

    /// The newest `limit` messages owned by `user_id`, returned oldest first.
    async fn list_recent(&self, user_id: UserId, limit: usize) -> Result<Vec<Message>, StoreError>;
}

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    user_id: i64,
    sender: String,
    text: String,
    timestamp: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let sender = row
            .sender
            .parse::<Sender>()
            .map_err(|reason| StoreError::CorruptRecord { id: row.id, reason })?;
        let timestamp = from_micros(row.timestamp).map_err(|e| StoreError::CorruptRecord {
            id: row.id,
            reason: e.to_string(),
        })?;

        Ok(Message {
            id: row.id,
            user_id: row.user_id,
            sender,
            text: row.text,
            timestamp,
        })
    }
}

/// SQLite-backed [`MessageStore`].
pub struct MessageRepository {
    pool: DbPool,
    clock: MonotonicClock,
    clock_seeded: AtomicBool,
}

impl MessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            clock: MonotonicClock::new(),
            clock_seeded: AtomicBool::new(false),
        }
    }

    /// Move the clock past the newest stored timestamp, once per repository.
    async fn seed_clock(&self) -> Result<(), StoreError> {
        if self.clock_seeded.load(Ordering::Acquire) {
            return Ok(());
        }

        let newest: Option<i64> = sqlx::query_scalar("SELECT MAX(timestamp) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("[STORE] Failed to read newest message timestamp: {}", e);
                StoreError::from(e)
            })?;

        if let Some(newest) = newest {
            self.clock.advance_to(newest);
            debug!(newest, "[STORE] Message clock seeded");
        }
        self.clock_seeded.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append(&self, user_id: UserId, sender: Sender, text: &str) -> Result<Message, StoreError> {
        self.seed_clock().await?;
        let timestamp = self.clock.next_micros();

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (user_id, sender, text, timestamp)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, sender, text, timestamp
            "#,
        )
        .bind(user_id)
        .bind(sender.as_str())
        .bind(text)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(user_id, sender = %sender, "[STORE] Failed to append message: {}", e);
            StoreError::from(e)
        })?;

        debug!(user_id, message_id = row.id, sender = %sender, "[STORE] Message appended");
        Message::try_from(row)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, user_id, sender, text, timestamp
            FROM messages
            WHERE user_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(user_id, "[STORE] Failed to list messages: {}", e);
            StoreError::from(e)
        })?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn list_recent(&self, user_id: UserId, limit: usize) -> Result<Vec<Message>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, user_id, sender, text, timestamp
            FROM messages
            WHERE user_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(user_id, "[STORE] Failed to list recent messages: {}", e);
            StoreError::from(e)
        })?;

        let mut messages = rows
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}
