//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::notion::NotionClient;
use crate::pipeline::Pipeline;
use crate::task::{LlmExtractor, PayloadNormalizer};

use super::types::{HealthResponse, WebhookResponse};

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
}

/// Build the pipeline and its clients from configuration.
pub fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::with_api_url(
        config.llm.api_key.clone(),
        config.llm.api_url.clone(),
        config.llm.timeout,
    )?);
    let extractor = LlmExtractor::new(llm, config.llm.model.clone())
        .with_confidence(config.write_policy.needs_confidence());

    let writer = NotionClient::new(
        &config.notion.api_url,
        &config.notion.token,
        &config.notion.version,
        config.notion.properties.clone(),
        config.notion.timeout,
    )?;

    Ok(Pipeline::new(Arc::new(extractor), Arc::new(writer))
        .with_normalizer(PayloadNormalizer::new(config.notion.title_property.clone()))
        .with_policy(config.write_policy))
}

/// Build the router for the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(receive_webhook))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    tracing::info!(
        model = %config.llm.model,
        policy = %pipeline.policy(),
        "Pipeline ready"
    );

    let state = Arc::new(AppState { pipeline });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// GET /
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Server is running...".to_string(),
    })
}

/// POST /webhook
///
/// Always answers 200. A body that cannot be read (over the size limit) or
/// is not JSON is reported as `ignored` instead of being rejected.
async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Json<WebhookResponse> {
    let payload: Value = match body {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!("Webhook body is not JSON: {}", e);
            Value::Null
        }),
        Err(e) => {
            tracing::warn!("Failed to read webhook body: {}", e);
            Value::Null
        }
    };

    let report = state.pipeline.handle(&payload).await;
    Json(WebhookResponse {
        status: report.status,
    })
}
