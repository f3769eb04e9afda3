//! End-to-end: webhook updates in, Bot API calls out.
//!
//! A fake Bot API server records every method call. Updates are posted to
//! the real router; the bot runs against a libSQL `:memory:` database used
//! as both session and record store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Request, StatusCode, Uri};
use chrono::FixedOffset;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use survey_bot::bot::Bot;
use survey_bot::channels::TelegramChannel;
use survey_bot::channels::telegram::SECRET_HEADER;
use survey_bot::server;
use survey_bot::store::LibSqlBackend;
use survey_bot::survey::{Finalizer, SurveyEngine};

/// Maximum time to wait for the bot to react to one update.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const CHAT_ID: i64 = 555;
const OPERATOR: &str = "100";

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

async fn fake_bot_api(State(calls): State<Calls>, uri: Uri, body: Bytes) -> axum::Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    calls.lock().unwrap().push((method, body));
    axum::Json(json!({ "ok": true, "result": true }))
}

/// Start the fake Bot API on a random port, return its base URL.
async fn start_bot_api(calls: Calls) -> String {
    let app = Router::new()
        .fallback(fake_bot_api)
        .with_state(calls);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

struct Fixture {
    app: Router,
    calls: Calls,
    db: Arc<LibSqlBackend>,
    next_update_id: Mutex<i64>,
}

async fn fixture() -> Fixture {
    let calls: Calls = Arc::default();
    let api_base = start_bot_api(calls.clone()).await;

    let telegram = Arc::new(
        TelegramChannel::new(SecretString::from("1:TEST"))
            .with_api_base(api_base)
            .with_webhook("https://bot.example/webhook", Some(SecretString::from("hook-secret"))),
    );
    let app = server::routes(Some(telegram.webhook_router()));

    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let finalizer = Finalizer::new(
        db.clone(),
        telegram.clone(),
        vec![OPERATOR.to_string()],
        FixedOffset::east_opt(5 * 3600).unwrap(),
    );
    let engine = SurveyEngine::new(db.clone(), finalizer);
    tokio::spawn(Bot::new(engine, telegram).run());

    let fixture = Fixture {
        app,
        calls,
        db,
        next_update_id: Mutex::new(1),
    };
    tokio::time::timeout(TEST_TIMEOUT, async {
        while fixture.calls_named("setWebhook").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("webhook was never registered");
    fixture
}

impl Fixture {
    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_named(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn update_id(&self) -> i64 {
        let mut next = self.next_update_id.lock().unwrap();
        *next += 1;
        *next
    }

    /// Post one update and wait until the bot has answered it.
    async fn post(&self, update: Value) {
        let before = self.call_count();
        let req = Request::post("/webhook")
            .header("content-type", "application/json")
            .header(SECRET_HEADER, "hook-secret")
            .body(Body::from(update.to_string()))
            .unwrap();
        let resp = self.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        tokio::time::timeout(TEST_TIMEOUT, async {
            while self.call_count() == before {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("bot did not answer in time");
        self.settle().await;
    }

    /// Wait until no new calls arrive for a short while.
    async fn settle(&self) {
        loop {
            let seen = self.call_count();
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.call_count() == seen {
                return;
            }
        }
    }

    async fn text(&self, text: &str) {
        let update = json!({
            "update_id": self.update_id(),
            "message": {
                "message_id": 1,
                "chat": { "id": CHAT_ID },
                "from": { "id": CHAT_ID, "username": "agency_uz" },
                "text": text,
            }
        });
        self.post(update).await;
    }

    async fn tap(&self, data: &str) {
        let update = json!({
            "update_id": self.update_id(),
            "callback_query": {
                "id": format!("cb-{data}"),
                "from": { "id": CHAT_ID, "username": "agency_uz" },
                "message": { "message_id": 77, "chat": { "id": CHAT_ID } },
                "data": data,
            }
        });
        self.post(update).await;
    }

    async fn contact(&self, phone: &str) {
        let update = json!({
            "update_id": self.update_id(),
            "message": {
                "message_id": 2,
                "chat": { "id": CHAT_ID },
                "from": { "id": CHAT_ID, "username": "agency_uz" },
                "contact": { "phone_number": phone, "first_name": "A" },
            }
        });
        self.post(update).await;
    }
}

#[tokio::test]
async fn full_survey_over_webhook_saves_one_row_and_notifies() {
    let f = fixture().await;

    f.text("/start").await;
    let start = f.calls_named("sendMessage");
    assert_eq!(start.len(), 1);
    assert_eq!(
        start[0]["reply_markup"]["inline_keyboard"][0][1]["callback_data"],
        "lang:uz"
    );

    f.tap("lang:uz").await;
    f.text("Balki").await;
    f.tap("vals:open").await;
    f.tap("vals:toggle:1").await;
    f.tap("vals:done").await;
    f.tap("pain:toggle:0").await;
    f.tap("pain:done").await;
    f.tap("exp:toggle:2").await;
    f.tap("exp:done").await;
    f.contact("998901234567").await;

    assert_eq!(f.db.response_count().await.unwrap(), 1);

    // Every tap was acknowledged.
    assert_eq!(f.calls_named("answerCallbackQuery").len(), 8);

    let sends = f.calls_named("sendMessage");
    let summary = sends
        .iter()
        .find(|body| body["chat_id"] == OPERATOR)
        .expect("operator summary");
    let text = summary["text"].as_str().unwrap();
    assert!(text.contains("[UZ]"));
    // Shared phones keep the digits Telegram sends, without adding a plus.
    assert!(text.contains("998901234567"));
    assert!(!text.contains("+998901234567"));
    assert!(text.contains("@agency_uz"));

    let last_user_message = sends
        .iter()
        .filter(|body| body["chat_id"] == CHAT_ID.to_string())
        .last()
        .unwrap();
    assert_eq!(last_user_message["reply_markup"], json!({ "remove_keyboard": true }));
}

#[tokio::test]
async fn cancel_mid_survey_clears_the_session() {
    let f = fixture().await;

    f.text("/start").await;
    f.tap("lang:ru").await;
    f.text("/cancel").await;

    let cancelled = f.calls_named("sendMessage").pop().unwrap();
    assert_eq!(cancelled["reply_markup"], json!({ "remove_keyboard": true }));

    // Without a session, input only earns the start hint.
    f.text("Да, очень").await;
    let hint = f.calls_named("sendMessage").pop().unwrap();
    assert!(hint["text"].as_str().unwrap().contains("/start"));
    assert_eq!(f.db.response_count().await.unwrap(), 0);
}

#[tokio::test]
async fn health_routes_share_the_router() {
    let f = fixture().await;
    let resp = f
        .app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let unauthorized = f
        .app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
}
