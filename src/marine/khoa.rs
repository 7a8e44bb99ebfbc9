//! KHOA OceanGrid API client for station lists and tide observations

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::payload::{
    extract_error_message, extract_items, first_value, preview, value_to_f64, value_to_string,
};
use super::MarineDataSource;
use crate::config::MarineConfig;
use crate::http::{Deadline, build_client};
use crate::models::{Coordinate, Station};
use crate::{Result, SeaguardError};

const CODE_KEYS: [&str; 5] = ["ObsCode", "obsCode", "obs_code", "obs_post_id", "obsPostId"];
const LAT_KEYS: [&str; 5] = ["ObsLat", "obsLat", "obs_lat", "latitude", "lat"];
const LON_KEYS: [&str; 5] = ["ObsLon", "obsLon", "obs_lon", "longitude", "lon"];
const NAME_KEYS: [&str; 6] = [
    "ObsName",
    "obsName",
    "obs_name",
    "name",
    "obs_post_name",
    "obsPostName",
];
const OBJECT_KEYS: [&str; 3] = ["obs_object", "obsObject", "obsobject"];
const KIND_KEYS: [&str; 2] = ["data_type", "dataType"];

/// KHOA OceanGrid client
pub struct KhoaClient {
    client: ClientWithMiddleware,
    service_key: String,
    base_url: String,
}

impl KhoaClient {
    /// Create a new client; fails when no service key is configured
    pub fn new(config: &MarineConfig) -> Result<Self> {
        let service_key = config
            .service_key
            .clone()
            .ok_or_else(|| {
                SeaguardError::configuration_missing("BADA_NURI_OPENAPI_SERVICE_KEY is not set")
            })?;
        let client = build_client(
            Deadline::Total(Duration::from_secs(config.timeout_seconds.into())),
            config.max_retries,
        )?;

        Ok(Self {
            client,
            service_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, data_type: &str, params: &[(&str, &str)]) -> String {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/{}/search.do?{}", self.base_url, data_type, query)
    }

    async fn fetch_json(&self, data_type: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut all_params = vec![("ServiceKey", self.service_key.as_str())];
        all_params.extend_from_slice(params);
        all_params.push(("ResultType", "json"));
        let url = self.endpoint(data_type, &all_params);

        debug!("KHOA request: {}/{}/search.do {:?}", self.base_url, data_type, params);
        let start_time = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SeaguardError::marine(None, format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SeaguardError::marine(Some(status.as_u16()), format!("read failed: {e}"))
        })?;

        if !status.is_success() {
            warn!("KHOA API returned {}: {}", status, preview(&body, 200));
            return Err(SeaguardError::marine(Some(status.as_u16()), preview(&body, 1000)));
        }

        let elapsed = start_time.elapsed();
        debug!(
            "KHOA response in {:.3}s: {}",
            elapsed.as_secs_f64(),
            preview(&body, 1000)
        );
        if elapsed.as_secs() > 5 {
            warn!("Slow KHOA response detected: {:.3}s", elapsed.as_secs_f64());
        }

        serde_json::from_str(&body).map_err(|e| {
            SeaguardError::marine(
                Some(status.as_u16()),
                format!("invalid JSON ({e}): {}", preview(&body, 200)),
            )
        })
    }
}

/// Convert one provider record into a station; records without a code are dropped
fn parse_station(item: &Map<String, Value>) -> Option<Station> {
    let code = first_value(item, &CODE_KEYS).and_then(value_to_string)?;
    let latitude = first_value(item, &LAT_KEYS).and_then(value_to_f64);
    let longitude = first_value(item, &LON_KEYS).and_then(value_to_f64);
    let coordinate = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Coordinate::checked(lat, lon),
        _ => None,
    };

    Some(Station {
        code,
        name: first_value(item, &NAME_KEYS).and_then(value_to_string),
        coordinate,
        kind: first_value(item, &KIND_KEYS).and_then(value_to_string),
        observes: first_value(item, &OBJECT_KEYS).and_then(value_to_string),
    })
}

/// Stations in provider order
#[must_use]
pub fn stations_from_payload(payload: &Value) -> Vec<Station> {
    extract_items(payload)
        .into_iter()
        .filter_map(Value::as_object)
        .filter_map(parse_station)
        .collect()
}

#[async_trait]
impl MarineDataSource for KhoaClient {
    #[instrument(skip(self))]
    async fn list_stations(&self, station_data_type: &str) -> Result<Vec<Station>> {
        let payload = self.fetch_json(station_data_type, &[]).await?;

        if extract_items(&payload).is_empty() {
            if let Some(message) = extract_error_message(&payload) {
                return Err(SeaguardError::marine(None, message));
            }
        }

        let stations = stations_from_payload(&payload);
        info!(
            "KHOA listed {} stations from {}",
            stations.len(),
            station_data_type
        );
        Ok(stations)
    }

    #[instrument(skip(self))]
    async fn get_observation(
        &self,
        station_code: &str,
        date: &str,
        data_type: &str,
    ) -> Result<Value> {
        let payload = self
            .fetch_json(data_type, &[("ObsCode", station_code), ("Date", date)])
            .await?;

        // "No search data" and key errors arrive as 200 responses
        if extract_items(&payload).is_empty() {
            if let Some(message) = extract_error_message(&payload) {
                return Err(SeaguardError::marine(None, message));
            }
        }

        Ok(payload)
    }
}
