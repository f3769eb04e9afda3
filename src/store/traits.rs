//! Storage traits: one for in-progress sessions, one for finished records.

use async_trait::async_trait;

use crate::error::{DatabaseError, RecordError};
use crate::survey::Session;

/// Per-chat session storage, keyed by chat id.
///
/// Implementations must make `set` visible to a following `get` for the same
/// chat, and `clear` must be idempotent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for `chat_id`, if any.
    async fn get(&self, chat_id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Create or replace the session for `chat_id`.
    async fn set(&self, chat_id: &str, session: &Session) -> Result<(), DatabaseError>;

    /// Remove the session for `chat_id`. Removing a missing session is a no-op.
    async fn clear(&self, chat_id: &str) -> Result<(), DatabaseError>;
}

/// Append-only store of completed answer records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short store name for logs.
    fn name(&self) -> &str;

    /// Prepare the destination (create the worksheet/table and header).
    /// Called once at startup.
    async fn init(&self) -> Result<(), RecordError>;

    /// Append one row. Either the whole row is stored or an error is returned.
    async fn append(&self, row: &[String]) -> Result<(), RecordError>;
}
