//! REST API server for the financial advisor agent
//!
//! Exposes the agent over HTTP: a messaging webhook, a health probe, a
//! market status endpoint and two bearer-token gated endpoints. The
//! webhook always answers with HTTP 200 and presentable text; transport
//! errors are reserved for transport problems, not conversation ones.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::agent::Orchestrator;
use crate::market::MarketDataProvider;

const FEATURES: &[&str] = &[
    "Real-time Nifty 50 data",
    "Stock price lookup (NSE/BSE)",
    "Gold price tracking",
    "Real estate market info",
    "Portfolio analysis",
    "Web search with market news",
    "Market analysis reports",
    "Nifty price alerts",
];

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message_body: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub response: String,
    pub status: String,
    pub user_id: String,
    pub timestamp: String,
    pub features_used: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub market: Arc<MarketDataProvider>,
    pub auth_token: Arc<String>,
    pub my_number: Arc<String>,
}

/// Constant-shape bearer check against the configured token.
fn authorized(state: &ApiState, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == state.auth_token.as_str())
        .unwrap_or(false)
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "Financial Advisor Agent is running",
        "features": FEATURES,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// =============================
/// Webhook Endpoint
/// =============================

async fn webhook(
    State(state): State<ApiState>,
    Json(req): Json<WebhookRequest>,
) -> (StatusCode, Json<WebhookResponse>) {
    let user_id = req.user_id.unwrap_or_else(|| "anonymous".to_string());

    let Some(message) = req.message_body.filter(|m| !m.trim().is_empty()) else {
        warn!(user_id = %user_id, "Webhook request without message body");
        return (
            StatusCode::OK,
            Json(WebhookResponse {
                response: "Please send a message so I can help you with your investments."
                    .to_string(),
                status: "error".to_string(),
                user_id,
                timestamp: chrono::Utc::now().to_rfc3339(),
                features_used: Vec::new(),
            }),
        );
    };

    info!(user_id = %user_id, "Webhook message received");

    let outcome = state.orchestrator.handle_turn(&user_id, &message).await;

    (
        StatusCode::OK,
        Json(WebhookResponse {
            response: outcome.answer,
            status: "success".to_string(),
            user_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            features_used: outcome.tools_used,
        }),
    )
}

/// =============================
/// Market Status Endpoint
/// =============================

async fn market_status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let quote = state.market.index_quote().await;

    Json(serde_json::json!({
        "status": "operational",
        "market_data": quote,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// =============================
/// Authenticated Endpoints
/// =============================

async fn query(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid or missing bearer token".into())),
        );
    }

    let user_id = req.user_id.unwrap_or_else(|| "api-user".to_string());
    let outcome = state.orchestrator.handle_turn(&user_id, &req.query).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "response": outcome.answer,
            "user_id": user_id,
            "features_used": outcome.tools_used,
        }))),
    )
}

async fn validate(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse>) {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid or missing bearer token".into())),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "phone_number": state.my_number.as_str(),
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .route("/market-status", get(market_status))
        .route("/query", post(query))
        .route("/validate", get(validate))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistoryStore;
    use crate::llm::ScriptedModel;
    use crate::market::test_support::{FailingBackend, FixedBackend};
    use crate::market::QuoteBackend;
    use crate::search::test_support::FailingSearchBackend;
    use crate::search::WebSearchProvider;
    use crate::tools::create_registry;

    fn test_state(model: ScriptedModel, backend: Box<dyn QuoteBackend>) -> ApiState {
        let market = Arc::new(MarketDataProvider::new(backend));
        let search = Arc::new(WebSearchProvider::new(Box::new(FailingSearchBackend)));
        let registry = create_registry(market.clone(), search);
        let orchestrator = Arc::new(Orchestrator::new(
            Box::new(model),
            registry,
            Arc::new(InMemoryHistoryStore::new()),
        ));

        ApiState {
            orchestrator,
            market,
            auth_token: Arc::new("secret-token".to_string()),
            my_number: Arc::new("+911234567890".to_string()),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {}", token).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_health_is_static_and_idempotent() {
        let Json(first) = health().await;
        let Json(second) = health().await;

        assert_eq!(first["status"], "healthy");
        let features = first["features"].as_array().unwrap();
        assert_eq!(features.len(), 8);
        assert_eq!(first["features"], second["features"]);
    }

    #[tokio::test]
    async fn test_webhook_success_shape() {
        let state = test_state(
            ScriptedModel::answering("Nifty is trading steady."),
            Box::new(FailingBackend),
        );

        let (status, Json(body)) = webhook(
            State(state),
            Json(WebhookRequest {
                user_id: Some("u1".to_string()),
                message_body: Some("how is nifty?".to_string()),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "success");
        assert_eq!(body.user_id, "u1");
        assert!(body.response.contains("steady"));
    }

    #[tokio::test]
    async fn test_webhook_missing_message_is_http_ok() {
        let state = test_state(ScriptedModel::answering("unused"), Box::new(FailingBackend));

        let (status, Json(body)) = webhook(
            State(state),
            Json(WebhookRequest {
                user_id: None,
                message_body: None,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "error");
        assert_eq!(body.user_id, "anonymous");
        assert!(body.response.contains("send a message"));
    }

    #[tokio::test]
    async fn test_webhook_conversation_failure_still_http_ok() {
        // Model over capacity: the webhook still returns 200 with an
        // apologetic body.
        let state = test_state(
            ScriptedModel::new(vec![Err(crate::llm::ModelError::RateLimited)]),
            Box::new(FailingBackend),
        );

        let (status, Json(body)) = webhook(
            State(state),
            Json(WebhookRequest {
                user_id: Some("u1".to_string()),
                message_body: Some("hello".to_string()),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.response.contains("high demand"));
    }

    #[tokio::test]
    async fn test_market_status_reports_fallback_quote() {
        let state = test_state(ScriptedModel::answering("unused"), Box::new(FailingBackend));

        let Json(body) = market_status(State(state)).await;
        assert_eq!(body["status"], "operational");
        assert_eq!(body["market_data"]["source"], "Simulated Data");
    }

    #[tokio::test]
    async fn test_market_status_live_quote() {
        let state = test_state(
            ScriptedModel::answering("unused"),
            Box::new(FixedBackend {
                first_close: 22000.0,
                last_close: 22300.0,
            }),
        );

        let Json(body) = market_status(State(state)).await;
        assert_eq!(body["market_data"]["price"], 22300.0);
    }

    #[tokio::test]
    async fn test_query_requires_bearer_token() {
        let state = test_state(ScriptedModel::answering("answer"), Box::new(FailingBackend));

        let (status, Json(body)) = query(
            State(state.clone()),
            HeaderMap::new(),
            Json(QueryRequest {
                query: "hi".to_string(),
                user_id: None,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.success);

        let (status, _) = query(
            State(state.clone()),
            bearer("wrong-token"),
            Json(QueryRequest {
                query: "hi".to_string(),
                user_id: None,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, Json(body)) = query(
            State(state),
            bearer("secret-token"),
            Json(QueryRequest {
                query: "hi".to_string(),
                user_id: Some("u9".to_string()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.data.unwrap()["user_id"], "u9");
    }

    #[tokio::test]
    async fn test_validate_returns_configured_number() {
        let state = test_state(ScriptedModel::answering("unused"), Box::new(FailingBackend));

        let (status, _) = validate(State(state.clone()), HeaderMap::new()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, Json(body)) = validate(State(state), bearer("secret-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap()["phone_number"], "+911234567890");
    }

    #[tokio::test]
    async fn test_end_to_end_unavailable_ticker_turn() {
        // The model asks for a quote, the source is down, and the user
        // still gets a clean answer with success status.
        let model = ScriptedModel::new(vec![
            Ok(crate::llm::ModelReply::ToolCalls(vec![
                crate::models::ToolCall::new(
                    "get_stock_price",
                    serde_json::json!({"ticker": "RELIANCE"}),
                ),
            ])),
            Ok(crate::llm::ModelReply::Answer(
                "I couldn't fetch Reliance data right now; please try again shortly.".to_string(),
            )),
        ]);
        let state = test_state(model, Box::new(FailingBackend));

        let (status, Json(body)) = webhook(
            State(state),
            Json(WebhookRequest {
                user_id: Some("u1".to_string()),
                message_body: Some("What's the current price of Reliance?".to_string()),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "success");
        assert!(body.response.contains("Reliance"));
        assert_eq!(body.features_used, vec!["get_stock_price".to_string()]);
    }
}
