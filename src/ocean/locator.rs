//! Nearest-station observation lookup

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::station_selector::nearest_station;
use crate::marine::{
    DEFAULT_DATA_TYPE, MarineDataSource, StationFilter, resolve_station_data_type,
    validate_data_type,
};
use crate::models::{Coordinate, NearestStation, Station};
use crate::{Result, SeaguardError};

/// Parse a `YYYYMMDD` date, rejecting anything that is not a real calendar day
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SeaguardError::invalid_request(format!(
            "date must be YYYYMMDD, got '{date}'"
        )));
    }
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map_err(|_| SeaguardError::invalid_request(format!("date '{date}' is not a calendar day")))
}

/// A validated observation lookup
#[derive(Debug, Clone, PartialEq)]
pub struct TideQuery {
    pub coordinate: Coordinate,
    pub date: NaiveDate,
    pub data_type: String,
    /// Endpoint the station list is read from
    pub station_data_type: String,
}

impl TideQuery {
    /// Validate raw request parameters; no provider is contacted on failure
    pub fn new(
        latitude: f64,
        longitude: f64,
        date: &str,
        data_type: Option<&str>,
        station_data_type: Option<&str>,
    ) -> Result<Self> {
        let coordinate = Coordinate::new(latitude, longitude)?;
        let date = parse_date(date)?;
        let data_type = data_type
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DATA_TYPE)
            .to_string();
        validate_data_type("data_type", &data_type)?;
        let station_data_type = resolve_station_data_type(station_data_type, &data_type);
        validate_data_type("station_data_type", &station_data_type)?;

        Ok(Self {
            coordinate,
            date,
            data_type,
            station_data_type,
        })
    }

    /// Date in the provider's `YYYYMMDD` form
    #[must_use]
    pub fn date_param(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }
}

/// Nearest station and its raw observation payload
#[derive(Debug, Clone, PartialEq)]
pub struct TideLookup {
    pub station: NearestStation,
    pub observation: Value,
}

/// Finds the station nearest a coordinate and fetches its observations
#[derive(Clone)]
pub struct TideLocator {
    marine: Arc<dyn MarineDataSource>,
}

impl TideLocator {
    pub fn new(marine: Arc<dyn MarineDataSource>) -> Self {
        Self { marine }
    }

    #[instrument(
        skip(self),
        fields(lat = query.coordinate.latitude, lon = query.coordinate.longitude)
    )]
    pub async fn locate(&self, query: &TideQuery) -> Result<TideLookup> {
        let start_time = Instant::now();

        let listed = self
            .marine
            .list_stations(&query.station_data_type)
            .await
            .map_err(|e| {
                warn!("Station list from {} failed: {}", query.station_data_type, e);
                SeaguardError::station_lookup(format!("could not list stations: {e}"))
            })?;
        if listed.is_empty() {
            return Err(SeaguardError::station_lookup(format!(
                "{} returned no stations",
                query.station_data_type
            )));
        }

        let total = listed.len();
        let filter = StationFilter::for_data_type(&query.data_type);
        let stations: Vec<Station> = listed.into_iter().filter(|s| filter.accepts(s)).collect();
        debug!("{} of {} stations can serve {}", stations.len(), total, query.data_type);
        if stations.is_empty() {
            return Err(SeaguardError::no_station_found(format!(
                "none of the {total} stations from {} serve {}",
                query.station_data_type, query.data_type
            )));
        }

        let nearest = nearest_station(&query.coordinate, &stations)?;
        info!(
            "Nearest station {} ({}) at {:.2} km",
            nearest.station.code,
            nearest.station.name.as_deref().unwrap_or("unnamed"),
            nearest.distance_km
        );

        let observation = self
            .marine
            .get_observation(&nearest.station.code, &query.date_param(), &query.data_type)
            .await
            .map_err(|e| {
                warn!("Observation fetch for {} failed: {}", nearest.station.code, e);
                SeaguardError::observation_fetch(format!(
                    "could not fetch {} for station {}: {e}",
                    query.data_type, nearest.station.code
                ))
            })?;

        info!(
            "Located observation data in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(TideLookup {
            station: nearest,
            observation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use serde_json::json;

    struct StaticStations(Vec<Station>);

    #[async_trait]
    impl MarineDataSource for StaticStations {
        async fn list_stations(&self, _station_data_type: &str) -> Result<Vec<Station>> {
            Ok(self.0.clone())
        }

        async fn get_observation(
            &self,
            _code: &str,
            _date: &str,
            _data_type: &str,
        ) -> Result<Value> {
            Ok(json!({"result": {"data": []}}))
        }
    }

    fn station(code: &str, kind: &str, observes: &str, lat: f64, lon: f64) -> Station {
        let mut station = Station::new(code, None, Coordinate::checked(lat, lon));
        station.kind = Some(kind.to_string());
        station.observes = Some(observes.to_string());
        station
    }

    async fn locate(stations: Vec<Station>) -> Result<TideLookup> {
        let query = TideQuery::new(37.5665, 126.9780, "20250115", None, None)?;
        TideLocator::new(Arc::new(StaticStations(stations)))
            .locate(&query)
            .await
    }

    #[tokio::test]
    async fn test_locate_skips_ineligible_stations() {
        let lookup = locate(vec![
            station("TW_0001", "해수유동관측소", "조류", 37.5665, 126.9780),
            station("DT_0001", "조위관측소", "조위,수온", 37.6133, 126.9780),
        ])
        .await
        .unwrap();
        assert_eq!(lookup.station.station.code, "DT_0001");
    }

    #[tokio::test]
    async fn test_locate_no_eligible_station() {
        let err = locate(vec![station("TW_0001", "해수유동관측소", "조류", 37.5, 126.9)])
            .await
            .unwrap_err();
        assert!(matches!(err, SeaguardError::NoStationFound { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_locate_empty_list() {
        let err = locate(Vec::new()).await.unwrap_err();
        assert!(matches!(err, SeaguardError::StationLookup { .. }));
    }

    #[rstest]
    #[case("20250115", true)]
    #[case("20240229", true)]
    #[case("20250229", false)]
    #[case("20251301", false)]
    #[case("2025-01-15", false)]
    #[case("2025011", false)]
    #[case("+2025011", false)]
    #[case("", false)]
    fn test_parse_date(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(parse_date(input).is_ok(), valid, "{input}");
    }

    #[test]
    fn test_query_defaults() {
        let query = TideQuery::new(37.5665, 126.9780, "20250115", None, None).unwrap();
        assert_eq!(query.data_type, "tideObs");
        assert_eq!(query.station_data_type, "ObsServiceObj");
        assert_eq!(query.date_param(), "20250115");
    }

    #[test]
    fn test_query_rejects_bad_input() {
        let bad = [
            TideQuery::new(95.0, 126.0, "20250115", None, None),
            TideQuery::new(37.0, 126.0, "2025-01-15", None, None),
            TideQuery::new(37.0, 126.0, "20250115", Some("tide/../Obs"), None),
            TideQuery::new(37.0, 126.0, "20250115", None, Some("a b")),
        ];
        for result in bad {
            assert!(matches!(result, Err(SeaguardError::InvalidRequest { .. })));
        }
    }
}
