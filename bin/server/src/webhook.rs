//! Webhook adapter: an axum router receiving Telegram updates.

use crate::dispatcher::Dispatcher;
use crate::error::SetupError;
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use relaybot_core::Result;
use relaybot_telegram::{TelegramClient, Update};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Registers the webhook URL with Telegram.
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Returns Telegram's raw response body.
    async fn register(&self, url: &str) -> Result<JsonValue, SetupError>;
}

#[async_trait]
impl WebhookRegistrar for TelegramClient {
    async fn register(&self, url: &str) -> Result<JsonValue, SetupError> {
        self.set_webhook(url)
            .await
            .context(SetupError::Registration)
    }
}

/// Shared state of the webhook routes.
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    pub registrar: Arc<dyn WebhookRegistrar>,
    pub public_url: Option<String>,
}

/// Builds the webhook router.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            "/api/webhook",
            get(webhook_info).post(receive_update).fallback(webhook_info),
        )
        .route("/api/setup", get(setup).post(setup))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook_info() -> Json<JsonValue> {
    Json(json!({ "message": "Telegram bot webhook endpoint" }))
}

/// Handles one delivery. Telegram always gets a 200, even for bodies that
/// do not parse, so it never redelivers.
async fn receive_update(State(state): State<Arc<WebhookState>>, body: Bytes) -> Json<JsonValue> {
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            let outcome = state.dispatcher.handle_update(&update).await;
            debug!(update_id = update.update_id, outcome = ?outcome, "webhook update handled");
        }
        Err(e) => warn!(error = %e, "ignoring unparseable webhook body"),
    }
    Json(json!({ "ok": true }))
}

async fn setup(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
) -> std::result::Result<Response, SetupError> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty());
    let base = state
        .public_url
        .as_deref()
        .or(host)
        .ok_or(SetupError::NoBaseUrl)?;
    let url = webhook_url(base);

    info!(url = %url, "registering webhook");
    let telegram_response = match state.registrar.register(&url).await {
        Ok(body) => body,
        Err(report) => {
            warn!(error = %report, "webhook registration failed");
            return Ok(failure(StatusCode::INTERNAL_SERVER_ERROR, chain_message(&report)));
        }
    };

    if telegram_response.get("ok").and_then(JsonValue::as_bool) == Some(true) {
        Ok(Json(json!({
            "success": true,
            "message": "Webhook set successfully",
            "webhook_url": url,
            "telegram_response": telegram_response,
        }))
        .into_response())
    } else {
        Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "Failed to set webhook",
                "telegram_response": telegram_response,
            })),
        )
            .into_response())
    }
}

/// `<base>/api/webhook`, with `https://` added to a bare host.
fn webhook_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.starts_with("http") {
        format!("{base}/api/webhook")
    } else {
        format!("https://{base}/api/webhook")
    }
}

/// Every context in the report, outermost first, joined with `: `.
fn chain_message(report: &Report<SetupError>) -> String {
    report
        .iter_reports()
        .map(|r| r.format_current_context().to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

fn failure(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

impl IntoResponse for SetupError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NoBaseUrl => StatusCode::BAD_REQUEST,
            Self::Registration => StatusCode::INTERNAL_SERVER_ERROR,
        };
        failure(status, self.to_string())
    }
}
