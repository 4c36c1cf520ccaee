// HTTP API on the exposed port

use crate::bot::{messages, random_start, GenerateOutcome, HaikuBot, ModelStatus, StatsSnapshot};
use crate::error::{HaikuError, Result};
use crate::shutdown::Shutdown;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: ModelStatus,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub model: ModelStatus,
    pub training: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub first_line: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub first_line: String,
    pub completion: String,
    pub haiku: String,
}

#[derive(Debug, Serialize)]
pub struct ExampleHaiku {
    pub first_line: &'static str,
    pub continuation: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RandomStartResponse {
    pub first_line: String,
}

/// Error body returned with every non-2xx status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

pub fn router(bot: HaikuBot) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/generate", post(generate_handler))
        .route("/examples", get(examples_handler))
        .route("/random-start", get(random_start_handler))
        .with_state(bot)
}

/// Bind the listener. Failing to bind is fatal for the caller.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| HaikuError::ServerError(format!("Failed to bind to {}: {}", addr, e)))
}

/// Serve until `shutdown` fires, then drain in-flight requests and release
/// the listener.
pub async fn serve(listener: TcpListener, bot: HaikuBot, shutdown: Shutdown) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| HaikuError::ServerError(e.to_string()))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, router(bot))
        .with_graceful_shutdown(shutdown.wait())
        .await
        .map_err(|e| HaikuError::ServerError(format!("HTTP server failed: {}", e)))?;

    info!("HTTP API on {} stopped", addr);
    Ok(())
}

async fn health_handler(State(bot): State<HaikuBot>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: bot.status().await,
    })
}

async fn stats_handler(State(bot): State<HaikuBot>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: bot.stats().await,
        model: bot.status().await,
        training: bot.is_training(),
    })
}

async fn generate_handler(
    State(bot): State<HaikuBot>,
    Json(request): Json<GenerateRequest>,
) -> std::result::Result<Json<GenerateResponse>, ApiError> {
    let temperature = match request.temperature {
        Some(t) if !(t.is_finite() && t > 0.0) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "temperature must be a positive number",
            ))
        }
        Some(t) => t,
        None => bot.settings().temperature,
    };

    match bot
        .generate(request.user_id, &request.first_line, temperature)
        .await
    {
        GenerateOutcome::Generated {
            first_line,
            completion,
        } => Ok(Json(GenerateResponse {
            haiku: format!("{}\n{}", first_line, completion),
            first_line,
            completion,
        })),
        GenerateOutcome::NotReady(status) => Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("model is {}", status.as_str()),
        )),
        GenerateOutcome::TooLong => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "first line is too long",
        )),
        GenerateOutcome::TooShort => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "first line is too short",
        )),
        GenerateOutcome::Empty => Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "could not generate a haiku for this line",
        )),
        GenerateOutcome::Failed(message) => {
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message))
        }
    }
}

async fn examples_handler() -> Json<Vec<ExampleHaiku>> {
    Json(
        messages::EXAMPLES
            .iter()
            .map(|&(first_line, continuation)| ExampleHaiku {
                first_line,
                continuation,
            })
            .collect(),
    )
}

async fn random_start_handler() -> Json<RandomStartResponse> {
    Json(RandomStartResponse {
        first_line: random_start().to_string(),
    })
}
