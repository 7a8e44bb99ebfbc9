//! HTTP API handlers
//!
//! - [`query`]: prompt proxy, buffered and streamed
//! - [`ocean`]: tide lookup and safety guide
//! - [`scenario`]: disaster scenario turns
//!
//! Every error response carries a `{"error": "..."}` body.

pub mod ocean;
pub mod query;
pub mod scenario;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::llm::LanguageModel;
use crate::marine::MarineDataSource;
use crate::{Result, SeaguardError, VERSION};

/// Provider clients shared by all handlers. A `None` provider disables the
/// endpoints that need it.
#[derive(Clone, Default)]
pub struct AppState {
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub marine: Option<Arc<dyn MarineDataSource>>,
}

impl AppState {
    pub fn new(
        llm: Option<Arc<dyn LanguageModel>>,
        marine: Option<Arc<dyn MarineDataSource>>,
    ) -> Self {
        Self { llm, marine }
    }

    pub fn llm(&self) -> Result<Arc<dyn LanguageModel>> {
        self.llm.clone().ok_or_else(|| {
            SeaguardError::configuration_missing("LLM provider is not configured (OPENAI_API_KEY)")
        })
    }

    pub fn marine(&self) -> Result<Arc<dyn MarineDataSource>> {
        self.marine.clone().ok_or_else(|| {
            SeaguardError::configuration_missing(
                "Marine data provider is not configured (BADA_NURI_OPENAPI_SERVICE_KEY)",
            )
        })
    }
}

/// Error rendered as a JSON response
#[derive(Debug)]
pub enum ApiError {
    Domain(SeaguardError),
    /// Body or query string the extractor could not accept
    Rejected { status: StatusCode, message: String },
}

impl From<SeaguardError> for ApiError {
    fn from(err: SeaguardError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Domain(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!("Request failed ({}): {}", status, err);
                } else {
                    warn!("Request rejected ({}): {}", status, err);
                }
                (status, err.user_message())
            }
            ApiError::Rejected { status, message } => {
                warn!("Request rejected ({}): {}", status, message);
                (status, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/query", post(query::query))
        .route("/api/query/stream", post(query::query_stream))
        .route("/api/ocean/tide", get(ocean::tide))
        .route("/api/ocean/safety-guide", get(ocean::safety_guide))
        .route("/api/scenario", post(scenario::scenario))
        .route("/api/scenario/stream", post(scenario::scenario_stream))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "SeaGuard LLM and marine safety API",
        "version": VERSION,
        "endpoints": {
            "health": "GET /health",
            "query": "POST /api/query",
            "query_stream": "POST /api/query/stream",
            "tide": "GET /api/ocean/tide",
            "safety_guide": "GET /api/ocean/safety-guide",
            "scenario": "POST /api/scenario",
            "scenario_stream": "POST /api/scenario/stream",
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub model: Option<String>,
    pub llm_configured: bool,
    pub marine_configured: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "seaguard",
        model: state.llm.as_ref().map(|llm| llm.model_name().to_string()),
        llm_configured: state.llm.is_some(),
        marine_configured: state.marine.is_some(),
    })
}
