//! Survey bot: a bilingual Telegram questionnaire that appends each
//! completed survey as one spreadsheet row and notifies operators.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod survey;
