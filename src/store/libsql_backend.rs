//! libSQL backend: persistent sessions and a local record table.
//!
//! Supports local file and in-memory databases. One backend value can serve
//! as both the [`SessionStore`] and the [`RecordStore`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::{DatabaseError, RecordError};
use crate::store::migrations;
use crate::store::traits::{RecordStore, SessionStore};
use crate::survey::Session;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests and ephemeral runs).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Number of stored answer records.
    pub async fn response_count(&self) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM survey_responses", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count responses: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read response count: {e}")))?;
        match row {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse response count: {e}"))),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn get(&self, chat_id: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT state FROM survey_sessions WHERE chat_id = ?1",
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to load session: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read session row: {e}")))?;

        match row {
            Some(row) => {
                let state: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("Failed to read session state: {e}")))?;
                let session = serde_json::from_str(&state).map_err(|e| {
                    DatabaseError::Serialization(format!("Corrupt session for chat {chat_id}: {e}"))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, chat_id: &str, session: &Session) -> Result<(), DatabaseError> {
        let state = serde_json::to_string(session)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO survey_sessions (chat_id, state, updated_at)
                 VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(chat_id) DO UPDATE SET
                    state = excluded.state,
                    updated_at = excluded.updated_at",
                params![chat_id, state],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to save session: {e}")))?;
        debug!(chat_id, step = %session.step, "Session saved");
        Ok(())
    }

    async fn clear(&self, chat_id: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM survey_sessions WHERE chat_id = ?1",
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to clear session: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LibSqlBackend {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn init(&self) -> Result<(), RecordError> {
        // Tables come from migrations, which already ran on open.
        Ok(())
    }

    async fn append(&self, row: &[String]) -> Result<(), RecordError> {
        let [timestamp, user_id, username, lang, interest, values, pains, expectations, contact] =
            row
        else {
            return Err(RecordError::Rejected {
                store: self.name().to_string(),
                reason: format!("expected 9 columns, got {}", row.len()),
            });
        };

        self.conn()
            .execute(
                "INSERT INTO survey_responses
                    (timestamp, user_id, username, lang, agg_interest, agg_values,
                     pain_points, expectations, contact)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    timestamp.as_str(),
                    user_id.as_str(),
                    username.as_str(),
                    lang.as_str(),
                    interest.as_str(),
                    values.as_str(),
                    pains.as_str(),
                    expectations.as_str(),
                    contact.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert response: {e}")))?;
        debug!(user_id = %user_id, "Response stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{AnswerKey, Lang, Step};

    fn row(user: &str) -> Vec<String> {
        [
            "2026-01-01 10:00:00",
            user,
            "",
            "ru",
            "Да, очень",
            "Онлайн-оплата",
            "",
            "",
            "+998901234567",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.get("1").await.unwrap().is_none());

        let mut session = Session::new();
        session.step = Step::Values;
        session.lang = Some(Lang::Uz);
        session.set_text(AnswerKey::Interest, "Balki");
        session.selection_mut(AnswerKey::Values).toggle(1);
        db.set("1", &session).await.unwrap();

        assert_eq!(db.get("1").await.unwrap(), Some(session.clone()));

        session.step = Step::Pains;
        db.set("1", &session).await.unwrap();
        assert_eq!(db.get("1").await.unwrap().unwrap().step, Step::Pains);

        db.clear("1").await.unwrap();
        db.clear("1").await.unwrap();
        assert!(db.get("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_session_is_an_error() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.conn()
            .execute(
                "INSERT INTO survey_sessions (chat_id, state) VALUES ('9', 'not json')",
                (),
            )
            .await
            .unwrap();
        let err = db.get("9").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Serialization(_)));
    }

    #[tokio::test]
    async fn append_records() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        RecordStore::init(&db).await.unwrap();
        db.append(&row("10")).await.unwrap();
        db.append(&row("11")).await.unwrap();
        assert_eq!(db.response_count().await.unwrap(), 2);

        let mut rows = db
            .conn()
            .query(
                "SELECT agg_values, contact FROM survey_responses WHERE user_id = '11'",
                (),
            )
            .await
            .unwrap();
        let r = rows.next().await.unwrap().unwrap();
        assert_eq!(r.get::<String>(0).unwrap(), "Онлайн-оплата");
        assert_eq!(r.get::<String>(1).unwrap(), "+998901234567");
    }

    #[tokio::test]
    async fn append_rejects_wrong_width() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let err = db.append(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, RecordError::Rejected { .. }));
        assert_eq!(db.response_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("survey.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.set("5", &Session::new()).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.get("5").await.unwrap().is_some());
    }
}
