//! Marine observation station records

use serde::{Deserialize, Serialize};

use super::Coordinate;

/// A marine observation station as listed by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    /// Provider-assigned station code, e.g. `DT_0001`
    pub code: String,
    pub name: Option<String>,
    /// `None` when the provider record has no usable coordinates
    pub coordinate: Option<Coordinate>,
    /// Provider station category, e.g. "조위관측소"
    pub kind: Option<String>,
    /// Provider list of observed quantities, e.g. "조위,수온"
    pub observes: Option<String>,
}

impl Station {
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: Option<String>,
        coordinate: Option<Coordinate>,
    ) -> Self {
        Self {
            code: code.into(),
            name,
            coordinate,
            kind: None,
            observes: None,
        }
    }
}

/// The station closest to a target coordinate
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NearestStation {
    pub station: Station,
    pub coordinate: Coordinate,
    pub distance_km: f64,
}

/// Station context returned alongside observation data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationInfo {
    pub obs_code: String,
    pub obs_name: Option<String>,
    pub station_latitude: f64,
    pub station_longitude: f64,
    pub distance_km: f64,
}

impl From<&NearestStation> for StationInfo {
    fn from(nearest: &NearestStation) -> Self {
        Self {
            obs_code: nearest.station.code.clone(),
            obs_name: nearest.station.name.clone(),
            station_latitude: nearest.coordinate.latitude,
            station_longitude: nearest.coordinate.longitude,
            distance_km: nearest.distance_km,
        }
    }
}
