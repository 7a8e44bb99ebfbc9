//! Condensed view of a tide observation series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of the most recent tide movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideTrend {
    Rising,
    Falling,
    Stable,
}

impl TideTrend {
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            TideTrend::Rising => "rising",
            TideTrend::Falling => "falling",
            TideTrend::Stable => "stable",
        }
    }
}

/// A single tide level reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideReading {
    pub time: String,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideStatistics {
    pub max_tide_cm: i64,
    pub min_tide_cm: i64,
    pub avg_tide_cm: f64,
    pub current_tide_cm: i64,
    pub trend: TideTrend,
}

/// Sunrise and sunset for the requested date, in UTC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Daylight {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideSummary {
    pub total_records: usize,
    pub statistics: TideStatistics,
    pub high_tides: Vec<TideReading>,
    pub low_tides: Vec<TideReading>,
    pub sampled_data: Vec<TideReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daylight: Option<Daylight>,
}

/// What the summariser could make of an observation payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObservationDigest {
    Summary(TideSummary),
    Empty {
        summary: String,
        total_records: usize,
        raw_preview: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        daylight: Option<Daylight>,
    },
}

impl ObservationDigest {
    #[must_use]
    pub fn daylight(&self) -> Option<&Daylight> {
        match self {
            ObservationDigest::Summary(summary) => summary.daylight.as_ref(),
            ObservationDigest::Empty { daylight, .. } => daylight.as_ref(),
        }
    }
}
