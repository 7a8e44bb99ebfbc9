//! Tide lookup and safety guide endpoints

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiResult, AppState};
use crate::Result;
use crate::models::StationInfo;
use crate::ocean::{SafetyGuide, SafetyGuideService, TideLocator, TideQuery};

/// Query string shared by the ocean endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct OceanParams {
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYYMMDD`
    pub date: String,
    pub data_type: Option<String>,
    pub station_data_type: Option<String>,
}

impl OceanParams {
    pub fn to_query(&self) -> Result<TideQuery> {
        TideQuery::new(
            self.latitude,
            self.longitude,
            &self.date,
            self.data_type.as_deref(),
            self.station_data_type.as_deref(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct TideResponse {
    #[serde(flatten)]
    pub station: StationInfo,
    /// Raw provider payload
    pub data: Value,
}

pub async fn tide(
    State(state): State<AppState>,
    params: std::result::Result<Query<OceanParams>, QueryRejection>,
) -> ApiResult<Json<TideResponse>> {
    let Query(params) = params?;
    let query = params.to_query()?;
    let locator = TideLocator::new(state.marine()?);

    let lookup = locator.locate(&query).await?;
    Ok(Json(TideResponse {
        station: StationInfo::from(&lookup.station),
        data: lookup.observation,
    }))
}

pub async fn safety_guide(
    State(state): State<AppState>,
    params: std::result::Result<Query<OceanParams>, QueryRejection>,
) -> ApiResult<Json<SafetyGuide>> {
    let Query(params) = params?;
    let query = params.to_query()?;
    let service = SafetyGuideService::new(state.marine()?, state.llm()?);

    Ok(Json(service.generate(&query).await?))
}
