//! REST surface and the Telegram webhook receiver.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use common::SignalError;
use strategy::{BatchMode, SignalOrchestrator};

use crate::services::dispatcher::{CommandDispatcher, normalize_symbol};
use crate::services::scheduler::TriggerScheduler;
use crate::services::telegram_service::TelegramNotifier;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    pub scheduler: Option<Arc<TriggerScheduler>>,
    pub telegram: Option<Arc<TelegramNotifier>>,
    pub default_symbol: String,
}

impl AppState {
    fn orchestrator(&self) -> &Arc<SignalOrchestrator> {
        self.dispatcher.orchestrator()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ok<T: Serialize>(message: &str, data: Option<T>) -> Response {
    let body = ApiResponse {
        success: true,
        message: message.to_string(),
        data,
        error: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn fail(status: StatusCode, message: &str, error: impl ToString) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        message: message.to_string(),
        data: None,
        error: Some(error.to_string()),
    };
    (status, Json(body)).into_response()
}

/// Malformed or non-JSON bodies still answer with the envelope.
fn invalid_body(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    fail(
        StatusCode::BAD_REQUEST,
        "Invalid request format",
        rejection.body_text(),
    )
}

fn status_for(err: &SignalError) -> StatusCode {
    match err {
        SignalError::CoolingDown { .. } => StatusCode::TOO_MANY_REQUESTS,
        SignalError::BatchInProgress => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/signal", get(get_signal).post(post_signal))
        .route("/api/v1/signal-all", get(signal_all))
        .route("/api/v1/signal-all-summary", get(signal_all_summary))
        .route("/api/v1/stocks", get(stocks))
        .route("/api/v1/cron-status", get(cron_status))
        .route("/api/v1/webhook/setup", post(setup_webhook))
        .route("/api/v1/webhook", delete(delete_webhook))
        .route("/webhook/telegram", post(telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Response {
    ok(
        "Trading Signal Bot is running",
        Some(json!({ "status": "healthy", "timestamp": Utc::now() })),
    )
}

#[derive(Debug, Deserialize)]
struct SignalQuery {
    #[serde(default)]
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct SignalRequest {
    #[serde(default)]
    stock_symbol: String,
}

async fn get_signal(State(state): State<AppState>, Query(q): Query<SignalQuery>) -> Response {
    signal_for(&state, &q.symbol).await
}

async fn post_signal(
    State(state): State<AppState>,
    payload: Result<Json<SignalRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(req)) => signal_for(&state, &req.stock_symbol).await,
        Err(rejection) => invalid_body(rejection),
    }
}

async fn signal_for(state: &AppState, raw: &str) -> Response {
    let symbol = match normalize_symbol(raw) {
        s if s.is_empty() => normalize_symbol(&state.default_symbol),
        s => s,
    };

    match state.dispatcher.generate_with_cooldown(&symbol).await {
        Ok(signal) => ok("Trading signal generated successfully", Some(signal)),
        Err(e) => {
            error!("Signal request for {} failed: {}", symbol, e);
            fail(status_for(&e), "Failed to generate trading signal", e)
        }
    }
}

async fn signal_all(State(state): State<AppState>) -> Response {
    start_batch(&state, BatchMode::PerSymbol, "Batch signal generation started").await
}

async fn signal_all_summary(State(state): State<AppState>) -> Response {
    start_batch(
        &state,
        BatchMode::SummaryOnly,
        "Batch signal generation with summary started",
    )
    .await
}

async fn start_batch(state: &AppState, mode: BatchMode, message: &str) -> Response {
    match state.orchestrator().spawn_batch(mode) {
        Ok(ticket) => ok(message, Some(ticket)),
        Err(e) => fail(status_for(&e), "Batch not started", e),
    }
}

async fn stocks(State(state): State<AppState>) -> Response {
    let symbols = state.orchestrator().symbols();
    ok(
        "Configured stocks",
        Some(json!({ "total": symbols.len(), "stocks": symbols })),
    )
}

async fn cron_status(State(state): State<AppState>) -> Response {
    match &state.scheduler {
        Some(scheduler) => {
            let info = scheduler.schedule_info().await;
            ok(
                "Scheduler status",
                Some(json!({ "enabled": info.active_jobs > 0, "schedule": info })),
            )
        }
        None => ok(
            "Scheduler is not configured",
            Some(json!({ "enabled": false })),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct WebhookSetupRequest {
    webhook_url: String,
}

async fn setup_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookSetupRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return invalid_body(rejection),
    };
    let Some(telegram) = &state.telegram else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, "Telegram is not configured", "no bot");
    };

    match telegram.setup_webhook(&req.webhook_url).await {
        Ok(()) => ok(
            "Webhook setup successfully",
            Some(json!({ "webhook_url": req.webhook_url })),
        ),
        Err(e) => fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to setup webhook",
            format!("{:#}", e),
        ),
    }
}

async fn delete_webhook(State(state): State<AppState>) -> Response {
    let Some(telegram) = &state.telegram else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, "Telegram is not configured", "no bot");
    };

    match telegram.delete_webhook().await {
        Ok(()) => ok::<()>("Webhook deleted successfully", None),
        Err(e) => fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to delete webhook",
            format!("{:#}", e),
        ),
    }
}

/// The subset of a Telegram `Update` the bot reacts to.
#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    chat: IncomingChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingChat {
    id: i64,
}

async fn telegram_webhook(
    State(state): State<AppState>,
    payload: Result<Json<TelegramUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(update) => update,
        Err(rejection) => return invalid_body(rejection),
    };
    let Some(message) = update.message else {
        return ok::<()>("No message in webhook", None);
    };

    let text = message.text.unwrap_or_default();
    let action = state.dispatcher.dispatch(message.chat.id, &text).await;
    info!("Webhook update from chat {} handled as {:?}", message.chat.id, action);

    ok::<()>("Webhook processed successfully", None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use common::models::{PriceBar, Signal};
    use common::traits::{MockNotificationSink, MockQuoteSource, MockSignalInference, Recipient};
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;
    use strategy::{CooldownCache, OrchestratorConfig};
    use tower::ServiceExt;

    type Outbox = Arc<Mutex<Vec<(Recipient, String)>>>;

    fn app_state(scheduler_times: Option<&[&str]>) -> (AppState, Outbox) {
        let mut quotes = MockQuoteSource::new();
        quotes.expect_fetch().returning(|symbol: &str| {
            if symbol == "GONE" {
                Err(SignalError::fetch(symbol, "status 404"))
            } else {
                Ok(vec![PriceBar {
                    timestamp: Utc::now(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1,
                }])
            }
        });

        let mut inference = MockSignalInference::new();
        inference
            .expect_infer()
            .returning(|symbol: &str, _bars: &[PriceBar]| {
                Ok(Signal {
                    symbol: symbol.to_string(),
                    direction: "WAIT".to_string(),
                    entry_price: 1.0,
                    target_price: 1.0,
                    stop_price: 1.0,
                    confidence: 50,
                    rationale: "Flat".to_string(),
                    generated_at: Utc::now(),
                    latest_bar: None,
                })
            });

        let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&outbox);
        let mut sink = MockNotificationSink::new();
        sink.expect_deliver()
            .returning(move |recipient: Recipient, text: &str| {
                log.lock().unwrap().push((recipient, text.to_string()));
                Ok(())
            });

        let orchestrator = Arc::new(SignalOrchestrator::new(
            Arc::new(quotes),
            Arc::new(inference),
            Arc::new(sink),
            OrchestratorConfig::new(vec!["BBCA".to_string(), "INDY".to_string()], -1),
        ));
        let cooldown = Arc::new(CooldownCache::new(Duration::from_secs(60)));
        let scheduler = scheduler_times.map(|times| {
            let times: Vec<String> = times.iter().map(|s| s.to_string()).collect();
            Arc::new(TriggerScheduler::new(
                Arc::clone(&orchestrator),
                &times,
                "Asia/Jakarta",
            ))
        });

        let state = AppState {
            dispatcher: Arc::new(CommandDispatcher::new(orchestrator, cooldown)),
            scheduler,
            telegram: None,
            default_symbol: "indy".to_string(),
        };
        (state, outbox)
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = app_state(None);
        let (status, body) = call(&router(state), get("/api/v1/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_signal_defaults_and_cooldown() {
        let (state, _) = app_state(None);
        let app = router(state);

        let (status, body) = call(&app, get("/api/v1/signal")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["symbol"], "INDY");
        assert_eq!(body["data"]["direction"], "WAIT");

        let (status, body) =
            call(&app, post_json("/api/v1/signal", json!({ "stock_symbol": "indy" }))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["success"], false);

        let (status, _) =
            call(&app, post_json("/api/v1/signal", json!({ "stock_symbol": "bbca" }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signal_upstream_failure() {
        let (state, _) = app_state(None);
        let (status, body) = call(&router(state), get("/api/v1/signal?symbol=gone")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("GONE"));
    }

    #[tokio::test]
    async fn test_batch_endpoints() {
        let (state, _) = app_state(None);
        let app = router(state);

        let (status, body) = call(&app, get("/api/v1/signal-all-summary")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["symbols"], 2);
        assert_eq!(body["data"]["mode"], "summary_only");

        let (status, _) = call(&app, get("/api/v1/signal-all")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_stocks() {
        let (state, _) = app_state(None);
        let (_, body) = call(&router(state), get("/api/v1/stocks")).await;

        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["stocks"], json!(["BBCA", "INDY"]));
    }

    #[tokio::test]
    async fn test_cron_status() {
        let (state, _) = app_state(None);
        let (_, body) = call(&router(state), get("/api/v1/cron-status")).await;
        assert_eq!(body["data"]["enabled"], false);

        let (state, _) = app_state(Some(&["08:30", "bad", "14:45"]));
        let scheduler = state.scheduler.clone().unwrap();
        scheduler.start().await;
        let (_, body) = call(&router(state), get("/api/v1/cron-status")).await;
        assert_eq!(body["data"]["enabled"], true);
        assert_eq!(body["data"]["schedule"]["active_jobs"], 2);
        assert_eq!(body["data"]["schedule"]["timezone"], "Asia/Jakarta");
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_telegram_webhook_dispatches() {
        let (state, outbox) = app_state(None);
        let app = router(state);

        let update = json!({
            "update_id": 1,
            "message": { "message_id": 7, "chat": { "id": 555, "type": "private" }, "text": "/start" }
        });
        let (status, body) = call(&app, post_json("/webhook/telegram", update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Webhook processed successfully");

        let sent = outbox.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 555);
        assert!(sent[0].1.contains("Welcome"));

        let (status, body) = call(&app, post_json("/webhook/telegram", json!({ "update_id": 2 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No message in webhook");
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_envelope() {
        let (state, outbox) = app_state(None);
        let app = router(state);

        for uri in ["/api/v1/signal", "/webhook/telegram", "/api/v1/webhook/setup"] {
            let request = Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap();
            let (status, body) = call(&app, request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Invalid request format");
            assert!(body["error"].is_string());
        }

        let request = Request::post("/api/v1/signal")
            .body(Body::from("stock_symbol=BBCA"))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        assert!(outbox.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_management_without_bot() {
        let (state, _) = app_state(None);
        let app = router(state);

        let request = Request::delete("/api/v1/webhook").body(Body::empty()).unwrap();
        let (status, _) = call(&app, request).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
