//! Telegram channel: Bot API over long polling or a webhook.
//!
//! Updates are decoded into [`InboundUpdate`]s at the boundary; outcomes are
//! rendered back as `sendMessage` / `editMessage*` calls with HTML markup.

use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::channels::{Channel, InboundUpdate, Notifier, UpdateSender, UpdateStream, receiver_stream};
use crate::error::ChannelError;
use crate::survey::{Delivery, EventKind, Keyboard, Outcome, SurveyEvent, UserIdentity};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Header Telegram echoes the webhook secret in.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

// ── Wire types ──────────────────────────────────────────────────────

/// The subset of a Telegram `Update` the survey reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
    pub contact: Option<TgContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgContact {
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    description: Option<String>,
}

fn identity(user: &TgUser) -> UserIdentity {
    UserIdentity::new(user.id.to_string(), user.username.clone())
}

/// Decode a raw webhook body.
pub fn decode_update(body: &[u8]) -> Result<Update, ChannelError> {
    serde_json::from_slice(body).map_err(|e| ChannelError::InvalidUpdate(e.to_string()))
}

/// Turn an update into an inbound event. Update types the survey ignores yield `None`.
pub fn parse_update(update: &Update) -> Option<InboundUpdate> {
    if let Some(message) = &update.message {
        let user = message
            .from
            .as_ref()
            .map(identity)
            .unwrap_or_else(|| UserIdentity::new(message.chat.id.to_string(), None));
        let kind = match (&message.text, &message.contact) {
            (Some(text), _) => EventKind::from_text(text),
            (None, Some(contact)) => EventKind::Contact {
                phone: contact.phone_number.clone(),
            },
            (None, None) => EventKind::Unsupported,
        };
        let event = SurveyEvent::new(message.chat.id.to_string(), user, kind)
            .with_message_id(message.message_id);
        return Some(InboundUpdate::new(event));
    }

    if let Some(query) = &update.callback_query {
        // Private chats share the user's id, so fall back to it when the
        // originating message is unavailable.
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        let kind = query
            .data
            .as_deref()
            .map(EventKind::from_payload)
            .unwrap_or(EventKind::Unsupported);
        let mut event = SurveyEvent::new(chat_id.to_string(), identity(&query.from), kind);
        if let Some(message) = &query.message {
            event = event.with_message_id(message.message_id);
        }
        return Some(InboundUpdate::new(event).with_callback_id(query.id.clone()));
    }

    None
}

/// Render a keyboard as `reply_markup` JSON. [`Keyboard::None`] renders
/// nothing, leaving the user's current keyboard in place.
pub fn reply_markup(keyboard: &Keyboard) -> Option<Value> {
    match keyboard {
        Keyboard::None => None,
        Keyboard::Remove => Some(json!({ "remove_keyboard": true })),
        Keyboard::Choices { rows, cancel } => {
            let mut keyboard: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
                .collect();
            keyboard.push(vec![json!({ "text": cancel })]);
            Some(json!({ "keyboard": keyboard, "resize_keyboard": true }))
        }
        Keyboard::Inline { rows } => {
            let inline: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.payload }))
                        .collect()
                })
                .collect();
            Some(json!({ "inline_keyboard": inline }))
        }
        Keyboard::RequestContact { share, cancel } => Some(json!({
            "keyboard": [
                [{ "text": share, "request_contact": true }],
                [{ "text": cancel }],
            ],
            "resize_keyboard": true,
        })),
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// Telegram channel. Receives updates by long polling unless a webhook URL
/// is configured, in which case [`TelegramChannel::webhook_router`] feeds it.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    webhook_url: Option<String>,
    webhook_secret: Option<SecretString>,
    client: reqwest::Client,
    incoming_tx: UpdateSender,
    /// Receiver side of the incoming channel, consumed once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<InboundUpdate>>>,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            bot_token,
            api_base: TELEGRAM_API_BASE.to_string(),
            webhook_url: None,
            webhook_secret: None,
            client: reqwest::Client::new(),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Receive updates through a webhook at `url` instead of polling.
    pub fn with_webhook(mut self, url: impl Into<String>, secret: Option<SecretString>) -> Self {
        self.webhook_url = Some(url.into());
        self.webhook_secret = secret;
        self
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn uses_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Axum routes for `GET`/`POST /webhook`. Merge into the main router.
    pub fn webhook_router(&self) -> Router {
        let state = WebhookState {
            incoming_tx: self.incoming_tx.clone(),
            secret: self.webhook_secret.clone(),
        };
        Router::new()
            .route("/webhook", get(webhook_ping).post(webhook_update))
            .with_state(state)
    }

    /// Call a Bot API method. An "is not modified" rejection counts as
    /// success: the message already shows what was asked for.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: {e}")))?;
        let status = resp.status();
        let api: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::Http(format!("{method} returned {status}: {e}")))?;

        if api.ok {
            return Ok(api.result);
        }
        let description = api.description.unwrap_or_default();
        if description.contains("message is not modified") {
            tracing::debug!(method, "Telegram reported no change");
            return Ok(Value::Null);
        }
        Err(ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("{method} failed ({status}): {description}"),
        })
    }

    /// Send an HTML message, splitting text over Telegram's length limit.
    /// The keyboard rides on the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markup: Option<Value>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
                "parse_mode": "HTML",
            });
            if i == last {
                if let Some(markup) = &markup {
                    body["reply_markup"] = markup.clone();
                }
            }
            self.call("sendMessage", &body).await?;
        }
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        markup: Option<Value>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = markup {
            body["reply_markup"] = markup;
        }
        self.call("editMessageText", &body).await.map(|_| ())
    }

    /// Replace (or with `None`, remove) a message's inline keyboard.
    async fn edit_reply_markup(
        &self,
        chat_id: &str,
        message_id: i64,
        markup: Option<Value>,
    ) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": markup.unwrap_or_else(|| json!({ "inline_keyboard": [] })),
        });
        self.call("editMessageReplyMarkup", &body).await.map(|_| ())
    }

    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> Result<(), ChannelError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(toast) = toast {
            body["text"] = json!(toast);
        }
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }

    async fn set_webhook(&self, url: &str) -> Result<(), ChannelError> {
        let mut body = json!({
            "url": url,
            "drop_pending_updates": true,
            "allowed_updates": ALLOWED_UPDATES,
        });
        if let Some(secret) = &self.webhook_secret {
            body["secret_token"] = json!(secret.expose_secret());
        }
        self.call("setWebhook", &body).await.map(|_| ())
    }

    async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call("deleteWebhook", &json!({ "drop_pending_updates": false }))
            .await
            .map(|_| ())
    }

    fn spawn_polling(&self) {
        let client = self.client.clone();
        let url = self.api_url("getUpdates");
        let tx = self.incoming_tx.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            tracing::info!("Telegram channel polling for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ALLOWED_UPDATES,
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let updates: Vec<Update> = match resp.json::<ApiResponse>().await {
                    Ok(api) if api.ok => serde_json::from_value(api.result).unwrap_or_else(|e| {
                        tracing::warn!("Telegram update decode error: {e}");
                        Vec::new()
                    }),
                    Ok(api) => {
                        tracing::warn!(
                            description = api.description.as_deref().unwrap_or(""),
                            "Telegram getUpdates rejected"
                        );
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(inbound) = parse_update(&update) else {
                        continue;
                    };
                    if tx.send(inbound).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<UpdateStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: "channel already started".into(),
            })?;

        match &self.webhook_url {
            Some(url) => {
                self.set_webhook(url)
                    .await
                    .map_err(|e| ChannelError::StartupFailed {
                        name: "telegram".into(),
                        reason: e.to_string(),
                    })?;
                tracing::info!(url = %url, "Telegram webhook registered");
            }
            None => {
                if let Err(e) = self.delete_webhook().await {
                    tracing::warn!("Could not clear webhook before polling: {e}");
                }
                self.spawn_polling();
            }
        }

        Ok(receiver_stream(rx))
    }

    async fn deliver(&self, update: &InboundUpdate, outcome: &Outcome) -> Result<(), ChannelError> {
        let chat_id = update.event.chat_id.as_str();

        if let Some(callback_id) = &update.callback_id {
            if let Err(e) = self.answer_callback(callback_id, outcome.toast.as_deref()).await {
                tracing::warn!("Failed to answer callback query: {e}");
            }
        }

        if let Some(message_id) = outcome.retire_keyboard {
            if let Err(e) = self.edit_reply_markup(chat_id, message_id, None).await {
                tracing::debug!(message_id, "Could not retire keyboard: {e}");
            }
        }

        let prompt = &outcome.prompt;
        let markup = reply_markup(&prompt.keyboard);
        match prompt.delivery {
            Delivery::New => self.send_message(chat_id, &prompt.text, markup).await,
            Delivery::EditMessage { message_id } => {
                let inline = markup.clone().filter(|_| matches!(prompt.keyboard, Keyboard::Inline { .. }));
                match self.edit_message_text(chat_id, message_id, &prompt.text, inline).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        tracing::debug!(message_id, "Edit failed, sending new message: {e}");
                        self.send_message(chat_id, &prompt.text, markup).await
                    }
                }
            }
            Delivery::EditKeyboard { message_id } => {
                match self.edit_reply_markup(chat_id, message_id, markup.clone()).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        tracing::debug!(message_id, "Keyboard edit failed, sending new message: {e}");
                        self.send_message(chat_id, &prompt.text, markup).await
                    }
                }
            }
        }
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        self.call("getMe", &json!({}))
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        if self.uses_webhook() {
            self.delete_webhook().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    async fn notify(&self, chat_id: &str, html: &str) -> Result<(), ChannelError> {
        self.send_message(chat_id, html, None).await
    }
}

// ── Webhook routes ──────────────────────────────────────────────────

#[derive(Clone)]
struct WebhookState {
    incoming_tx: UpdateSender,
    secret: Option<SecretString>,
}

async fn webhook_ping() -> &'static str {
    "ok"
}

async fn webhook_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.secret {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(secret.expose_secret()) {
            tracing::warn!("Webhook call with a wrong or missing secret token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let update = match decode_update(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!("Malformed webhook update: {e}");
            return (StatusCode::BAD_REQUEST, "malformed update").into_response();
        }
    };

    if let Some(inbound) = parse_update(&update) {
        if state.incoming_tx.send(inbound).is_err() {
            tracing::warn!(update_id = update.update_id, "Run loop gone, update dropped");
        }
    }
    "ok".into_response()
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Split a message into chunks of at most `max_len` bytes.
/// Tries to split on newlines, then spaces, then hard-cuts at a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
