//! Configuration types.
//!
//! Everything is read once from the environment at startup. A missing or
//! malformed required value is a [`ConfigError`] and the process exits
//! before serving any traffic.

use std::path::PathBuf;

use chrono::FixedOffset;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default HTTP port (matches the hosting platform's expectation).
pub const DEFAULT_PORT: u16 = 10_000;

/// Default UTC offset for record timestamps (Asia/Tashkent, no DST).
pub const DEFAULT_UTC_OFFSET: &str = "+05:00";

/// Where completed answer records go.
#[derive(Debug, Clone)]
pub enum RecordStoreConfig {
    /// Google Sheets worksheet, authenticated with a service account.
    Sheets {
        spreadsheet_id: String,
        service_account_json: SecretString,
    },
    /// Local libSQL database (`survey_responses` table).
    Local,
}

/// Where in-progress sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Memory,
    Local,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token.
    pub bot_token: SecretString,
    /// Public webhook URL. `None` means long polling.
    pub webhook_url: Option<String>,
    /// Secret echoed by Telegram in `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: Option<SecretString>,
    /// HTTP listener port for health checks and the webhook.
    pub port: u16,
    /// Chat ids that receive a summary of every new submission.
    pub operators: Vec<String>,
    /// Offset used to stamp records.
    pub utc_offset: FixedOffset,
    pub record_store: RecordStoreConfig,
    pub session_store: SessionStoreKind,
    /// libSQL database path (used by the local record and session stores).
    pub db_path: PathBuf,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_TOKEN".into()))?;

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let utc_offset = parse_utc_offset(
            get("TZ_OFFSET").as_deref().unwrap_or(DEFAULT_UTC_OFFSET),
        )?;

        let record_store = match get("RECORD_STORE").as_deref().unwrap_or("sheets") {
            "sheets" => RecordStoreConfig::Sheets {
                spreadsheet_id: get("SHEET_ID").ok_or_else(|| ConfigError::MissingRequired {
                    key: "SHEET_ID".into(),
                    hint: "Set it to the spreadsheet key, or use RECORD_STORE=local".into(),
                })?,
                service_account_json: get("GOOGLE_SERVICE_ACCOUNT_JSON")
                    .map(SecretString::from)
                    .ok_or_else(|| ConfigError::MissingRequired {
                        key: "GOOGLE_SERVICE_ACCOUNT_JSON".into(),
                        hint: "Paste the raw service account JSON on one line".into(),
                    })?,
            },
            "local" => RecordStoreConfig::Local,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "RECORD_STORE".into(),
                    message: format!("expected 'sheets' or 'local', got '{other}'"),
                });
            }
        };

        let session_store = match get("SESSION_STORE").as_deref().unwrap_or("memory") {
            "memory" => SessionStoreKind::Memory,
            "local" => SessionStoreKind::Local,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "SESSION_STORE".into(),
                    message: format!("expected 'memory' or 'local', got '{other}'"),
                });
            }
        };

        Ok(Self {
            bot_token,
            webhook_url: get("WEBHOOK_URL"),
            webhook_secret: get("WEBHOOK_SECRET").map(SecretString::from),
            port,
            operators: get("ADMINS").map(|raw| parse_operators(&raw)).unwrap_or_default(),
            utc_offset,
            record_store,
            session_store,
            db_path: get("SURVEY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/survey.db")),
            log_dir: get("SURVEY_LOG_DIR").map(PathBuf::from),
        })
    }

    /// Whether the bot receives updates through a webhook.
    pub fn uses_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }
}

/// Parse `ADMINS`: comma separated numeric chat ids, whitespace ignored.
pub fn parse_operators(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a `+HH:MM` / `-HH:MM` offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: "TZ_OFFSET".into(),
        message: format!("{message} (got '{raw}')"),
    };

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid("expected a leading '+' or '-'")),
    };
    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| invalid("expected HH:MM"))?;
    let hours: i32 = hours.parse().map_err(|_| invalid("hours are not a number"))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| invalid("minutes are not a number"))?;
    if hours > 14 || minutes > 59 {
        return Err(invalid("offset out of range"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| invalid("offset out of range"))
}
