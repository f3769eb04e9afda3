//! HTTP surface: liveness checks for the hosting platform, plus the
//! Telegram webhook when one is configured.

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use chrono::Utc;
use tower_http::trace::TraceLayer;

/// Build the router. `webhook` is merged in when the bot runs in webhook mode.
pub fn routes(webhook: Option<Router>) -> Router {
    let router = Router::new()
        .route("/", get(status).head(head_ok))
        .route("/healthz", get(healthz));

    let router = match webhook {
        Some(webhook) => router.merge(webhook),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

/// Bind `0.0.0.0:port` and serve until the task is dropped.
pub async fn serve(port: u16, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "HTTP server listening");
    axum::serve(listener, app).await
}

// ── Health ──────────────────────────────────────────────────────────────

async fn status() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "survey-bot",
        "time": Utc::now().to_rfc3339(),
    }))
}

async fn head_ok() -> StatusCode {
    StatusCode::OK
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn root_reports_status_json() {
        let (status, body) = get_body(routes(None), "/").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "survey-bot");
        assert!(json["time"].as_str().is_some());
    }

    #[tokio::test]
    async fn head_root_is_ok() {
        let resp = routes(None)
            .oneshot(Request::head("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_is_plain_ok() {
        assert_eq!(
            get_body(routes(None), "/healthz").await,
            (StatusCode::OK, "ok".to_string())
        );
    }

    #[tokio::test]
    async fn webhook_routes_only_when_merged() {
        let (status, _) = get_body(routes(None), "/webhook").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let webhook = Router::new().route("/webhook", get(|| async { "hook" }));
        assert_eq!(
            get_body(routes(Some(webhook)), "/webhook").await,
            (StatusCode::OK, "hook".to_string())
        );
    }
}
