//! Persistence layer: session storage and answer record destinations.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod sheets;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::{InMemorySessionStore, MemoryRecordStore};
pub use sheets::{ServiceAccountKey, SheetsRecordStore};
pub use traits::{RecordStore, SessionStore};
