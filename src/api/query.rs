//! Prompt proxy endpoints

use std::convert::Infallible;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::{CACHE_CONTROL, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, AppState};
use crate::llm::{ChunkStream, CompletionRequest, ensure_terminal};
use crate::models::StreamChunk;
use crate::{Result, SeaguardError};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    pub system_message: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl QueryRequest {
    /// Validate into a provider request
    pub fn into_completion(self) -> Result<CompletionRequest> {
        if self.prompt.trim().is_empty() {
            return Err(SeaguardError::invalid_request("prompt must not be empty"));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(SeaguardError::invalid_request(format!(
                    "temperature must be between 0 and 2, got {temperature}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(SeaguardError::invalid_request("max_tokens must be at least 1"));
        }

        Ok(CompletionRequest {
            prompt: self.prompt,
            system_message: self.system_message.filter(|s| !s.trim().is_empty()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_output: false,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub model: String,
}

/// Headers that stop proxies from buffering an event stream
pub(crate) fn sse_headers() -> [(HeaderName, &'static str); 2] {
    [
        (CACHE_CONTROL, "no-cache"),
        (X_ACCEL_BUFFERING, "no"),
    ]
}

/// Encode chunks as `data: <json>` events
pub(crate) fn chunk_events(
    chunks: ChunkStream,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    chunks.map(|chunk: StreamChunk| {
        let data = serde_json::to_string(&chunk).unwrap_or_default();
        Ok(Event::default().data(data))
    })
}

pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let Json(request) = payload?;
    let request = request.into_completion()?;
    let llm = state.llm()?;

    let response = llm.complete(&request).await?;
    info!("Answered query with {} chars", response.chars().count());
    Ok(Json(QueryResponse {
        response,
        model: llm.model_name().to_string(),
    }))
}

pub async fn query_stream(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let request = request.into_completion()?;
    let llm = state.llm()?;

    let chunks = ensure_terminal(llm.stream(request));
    Ok((
        sse_headers(),
        Sse::new(chunk_events(chunks)).keep_alive(KeepAlive::default()),
    ))
}
