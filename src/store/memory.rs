//! In-memory stores. Sessions are lost on restart; records are kept only
//! for the lifetime of the process (CLI mode and tests).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DatabaseError, RecordError};
use crate::store::traits::{RecordStore, SessionStore};
use crate::survey::Session;

/// Process-local session map.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chats with an in-progress session.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, chat_id: &str) -> Result<Option<Session>, DatabaseError> {
        Ok(self.sessions.read().await.get(chat_id).cloned())
    }

    async fn set(&self, chat_id: &str, session: &Session) -> Result<(), DatabaseError> {
        self.sessions
            .write()
            .await
            .insert(chat_id.to_string(), session.clone());
        Ok(())
    }

    async fn clear(&self, chat_id: &str) -> Result<(), DatabaseError> {
        self.sessions.write().await.remove(chat_id);
        Ok(())
    }
}

/// Record store that keeps appended rows in memory.
///
/// Can be switched into a failing mode to exercise the save-failure path.
pub struct MemoryRecordStore {
    header: Vec<String>,
    rows: RwLock<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent appends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of appended rows, header excluded.
    pub async fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&self) -> Result<(), RecordError> {
        Ok(())
    }

    async fn append(&self, row: &[String]) -> Result<(), RecordError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RecordError::Rejected {
                store: self.name().to_string(),
                reason: "store is in failing mode".into(),
            });
        }
        if row.len() != self.header.len() {
            return Err(RecordError::Rejected {
                store: self.name().to_string(),
                reason: format!("expected {} columns, got {}", self.header.len(), row.len()),
            });
        }
        let mut rows = self.rows.write().await;
        rows.push(row.to_vec());
        debug!(total = rows.len(), "Record appended in memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::Step;

    #[tokio::test]
    async fn session_set_get_clear() {
        let store = InMemorySessionStore::new();
        assert!(store.get("42").await.unwrap().is_none());

        let mut session = Session::new();
        session.step = Step::Pains;
        store.set("42", &session).await.unwrap();
        assert_eq!(store.get("42").await.unwrap(), Some(session));
        assert_eq!(store.len().await, 1);

        store.clear("42").await.unwrap();
        assert!(store.get("42").await.unwrap().is_none());
        // Clearing twice is fine.
        store.clear("42").await.unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_chat() {
        let store = InMemorySessionStore::new();
        let mut a = Session::new();
        a.step = Step::Contact;
        store.set("a", &a).await.unwrap();
        store.set("b", &Session::new()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().step, Step::Contact);
        assert_eq!(
            store.get("b").await.unwrap().unwrap().step,
            Step::ChooseLanguage
        );
    }

    #[tokio::test]
    async fn record_append_and_failing_mode() {
        let store = MemoryRecordStore::new(&["a", "b"]);
        store.append(&["1".into(), "2".into()]).await.unwrap();

        store.set_failing(true);
        let err = store.append(&["3".into(), "4".into()]).await.unwrap_err();
        assert!(matches!(err, RecordError::Rejected { .. }));

        store.set_failing(false);
        store.append(&["3".into(), "4".into()]).await.unwrap();
        assert_eq!(store.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn record_rejects_wrong_width() {
        let store = MemoryRecordStore::new(&["a", "b"]);
        assert!(store.append(&["only".into()]).await.is_err());
        assert!(store.rows().await.is_empty());
    }
}
