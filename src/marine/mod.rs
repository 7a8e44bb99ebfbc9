//! Marine data provider integration
//!
//! This module provides access to tide/ocean observation data:
//! - [`MarineDataSource`]: the provider seam used by the ocean flows
//! - [`khoa`]: KHOA OceanGrid HTTP client
//! - [`payload`]: tolerant accessors for the provider's JSON envelopes
//! - [`StationFilter`]: per-data-type station eligibility rules

pub mod khoa;
pub mod payload;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::Station;
use crate::{Result, SeaguardError};

pub use khoa::KhoaClient;

/// Station list endpoint used when the caller does not name one
pub const DEFAULT_STATION_DATA_TYPE: &str = "ObsServiceObj";

/// Observation endpoint used when the caller does not name one
pub const DEFAULT_DATA_TYPE: &str = "tideObs";

/// Observation data types whose stations are listed by `ObsServiceObj`
const SERVICE_OBJ_DATA_TYPES: [&str; 3] = ["tideObs", "obsWaveHight", "seafogReal"];

/// Provider of station lists and observation records
#[async_trait]
pub trait MarineDataSource: Send + Sync {
    /// List every station the `station_data_type` endpoint reports, in
    /// provider order
    async fn list_stations(&self, station_data_type: &str) -> Result<Vec<Station>>;

    /// Fetch the raw observation payload for a station and `YYYYMMDD` date
    async fn get_observation(&self, station_code: &str, date: &str, data_type: &str)
    -> Result<Value>;
}

/// Eligibility rules applied to provider station records.
///
/// Each criterion only applies when the station record carries the field it
/// inspects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationFilter {
    /// Every term must appear in the station's observation-object text
    pub required_terms: Vec<String>,
    /// Station kind must be one of these
    pub required_kinds: Vec<String>,
    /// Station code must start with one of these
    pub required_prefixes: Vec<String>,
}

impl StationFilter {
    /// Rules for stations able to serve `data_type` observations
    #[must_use]
    pub fn for_data_type(data_type: &str) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        match data_type {
            "tideObs" => Self {
                required_terms: owned(&["조위"]),
                required_kinds: owned(&["조위관측소"]),
                required_prefixes: owned(&["DT_"]),
            },
            "obsWaveHight" => Self {
                required_terms: owned(&["파고"]),
                ..Self::default()
            },
            "seafogReal" => Self {
                required_terms: owned(&["해무"]),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn accepts(&self, station: &Station) -> bool {
        if !self.required_kinds.is_empty() {
            if let Some(kind) = &station.kind {
                if !self.required_kinds.iter().any(|k| k == kind) {
                    return false;
                }
            }
        }
        if !self.required_prefixes.is_empty()
            && !self
                .required_prefixes
                .iter()
                .any(|p| station.code.starts_with(p.as_str()))
        {
            return false;
        }
        if !self.required_terms.is_empty() {
            if let Some(observes) = &station.observes {
                if !self.required_terms.iter().all(|t| observes.contains(t.as_str())) {
                    return false;
                }
            }
        }
        true
    }
}

/// Data types become URL path segments, so only short ASCII alphanumerics pass
pub fn validate_data_type(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= 64
        && value.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(SeaguardError::invalid_request(format!(
            "{field} must be 1-64 ASCII letters or digits"
        )))
    }
}

/// Endpoint to list stations from for a given observation data type.
///
/// Observation endpoints do not list stations themselves, so a station data
/// type equal to one of them is redirected to `ObsServiceObj`.
#[must_use]
pub fn resolve_station_data_type(station_data_type: Option<&str>, data_type: &str) -> String {
    let requested = station_data_type
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STATION_DATA_TYPE);
    if requested == data_type && SERVICE_OBJ_DATA_TYPES.contains(&data_type) {
        DEFAULT_STATION_DATA_TYPE.to_string()
    } else {
        requested.to_string()
    }
}
