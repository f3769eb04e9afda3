use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use survey_bot::bot::Bot;
use survey_bot::channels::{Channel, CliChannel, Notifier, TelegramChannel};
use survey_bot::config::{
    BotConfig, DEFAULT_UTC_OFFSET, RecordStoreConfig, SessionStoreKind, parse_utc_offset,
};
use survey_bot::server;
use survey_bot::store::{
    InMemorySessionStore, LibSqlBackend, MemoryRecordStore, RecordStore, ServiceAccountKey,
    SessionStore, SheetsRecordStore,
};
use survey_bot::survey::{Finalizer, HEADER, SurveyEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    if std::env::args().any(|arg| arg == "--cli") {
        init_tracing(None);
        return run_cli().await;
    }

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export BOT_TOKEN=123456:ABC...");
        eprintln!("  export SHEET_ID=... GOOGLE_SERVICE_ACCOUNT_JSON='{{...}}'  (or RECORD_STORE=local)");
        std::process::exit(1);
    });

    // Held for the life of the process so buffered file logs get flushed.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📋 Survey bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Updates: {}",
        config.webhook_url.as_deref().unwrap_or("long polling")
    );
    eprintln!("   HTTP: http://0.0.0.0:{}/healthz", config.port);
    eprintln!("   Operators: {}", config.operators.len());

    // ── Storage ──────────────────────────────────────────────────────────
    let needs_db = matches!(config.record_store, RecordStoreConfig::Local)
        || config.session_store == SessionStoreKind::Local;
    let db = if needs_db {
        let backend = LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
        eprintln!("   Database: {}", config.db_path.display());
        Some(Arc::new(backend))
    } else {
        None
    };

    let sessions: Arc<dyn SessionStore> = match (config.session_store, &db) {
        (SessionStoreKind::Local, Some(db)) => db.clone(),
        _ => Arc::new(InMemorySessionStore::new()),
    };

    let records: Arc<dyn RecordStore> = match (&config.record_store, &db) {
        (
            RecordStoreConfig::Sheets {
                spreadsheet_id,
                service_account_json,
            },
            _,
        ) => {
            let key = ServiceAccountKey::from_json(service_account_json.expose_secret())
                .context("GOOGLE_SERVICE_ACCOUNT_JSON is not a usable service account key")?;
            Arc::new(SheetsRecordStore::new(spreadsheet_id.as_str(), &key, &HEADER)?)
        }
        (RecordStoreConfig::Local, Some(db)) => db.clone(),
        (RecordStoreConfig::Local, None) => anyhow::bail!("local record store needs a database"),
    };
    records
        .init()
        .await
        .with_context(|| format!("Failed to initialize record store '{}'", records.name()))?;
    eprintln!("   Records: {}", records.name());

    // ── Telegram ─────────────────────────────────────────────────────────
    let mut telegram = TelegramChannel::new(config.bot_token.clone());
    if let Some(url) = &config.webhook_url {
        telegram = telegram.with_webhook(url.as_str(), config.webhook_secret.clone());
    }
    let telegram = Arc::new(telegram);
    telegram
        .health_check()
        .await
        .context("Telegram getMe failed, check BOT_TOKEN")?;

    // ── HTTP server ──────────────────────────────────────────────────────
    let webhook = config.uses_webhook().then(|| telegram.webhook_router());
    let app = server::routes(webhook);
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = server::serve(port, app).await {
            tracing::error!(port, "HTTP server stopped: {}", e);
        }
    });

    // ── Engine ───────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = telegram.clone();
    let finalizer = Finalizer::new(records, notifier, config.operators.clone(), config.utc_offset);
    let engine = SurveyEngine::new(sessions, finalizer);

    let channel: Arc<dyn Channel> = telegram;
    Bot::new(engine, channel).run().await?;

    Ok(())
}

/// Local trial run: stdin/stdout, in-memory sessions and records.
async fn run_cli() -> anyhow::Result<()> {
    let utc_offset = parse_utc_offset(
        std::env::var("TZ_OFFSET")
            .as_deref()
            .unwrap_or(DEFAULT_UTC_OFFSET),
    )?;
    let cli = Arc::new(CliChannel::new());
    let records = Arc::new(MemoryRecordStore::new(&HEADER));
    let finalizer = Finalizer::new(
        records.clone(),
        cli.clone(),
        vec!["cli-operator".to_string()],
        utc_offset,
    );
    let engine = SurveyEngine::new(Arc::new(InMemorySessionStore::new()), finalizer);

    Bot::new(engine, cli).run().await?;

    eprintln!("{} record(s) collected this session", records.rows().await.len());
    Ok(())
}

/// Initialize tracing: stderr always, plus a daily-rolling file under
/// `log_dir` when one is configured.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "survey-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}
