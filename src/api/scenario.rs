//! Disaster scenario endpoints

use std::convert::Infallible;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures::StreamExt;
use tracing::info;

use super::query::sse_headers;
use super::{ApiResult, AppState};
use crate::scenario::{ScenarioEvent, ScenarioInput, ScenarioOutcome, ScenarioSimulator};

pub async fn scenario(
    State(state): State<AppState>,
    payload: Result<Json<ScenarioInput>, JsonRejection>,
) -> ApiResult<Json<ScenarioOutcome>> {
    let Json(input) = payload?;
    input.validate()?;
    let simulator = ScenarioSimulator::new(state.llm()?);

    info!(
        "Scenario '{}' turn {}",
        input.scenario.title,
        input.history.len() + 1
    );
    Ok(Json(simulator.simulate(&input).await?))
}

pub async fn scenario_stream(
    State(state): State<AppState>,
    payload: Result<Json<ScenarioInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    input.validate()?;
    let simulator = ScenarioSimulator::new(state.llm()?);

    let events = simulator.simulate_stream(input).map(|event: ScenarioEvent| {
        Ok::<_, Infallible>(
            Event::default()
                .event(event.name())
                .data(event.data().to_string()),
        )
    });
    Ok((
        sse_headers(),
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}
