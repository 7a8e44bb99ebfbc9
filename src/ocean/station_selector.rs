//! Nearest-station selection by great-circle distance

use tracing::debug;

use crate::models::{Coordinate, NearestStation, Station};
use crate::{Result, SeaguardError};

/// Pick the station closest to `target`.
///
/// Stations without usable coordinates are skipped. On equal distances the
/// earlier station wins.
pub fn nearest_station(target: &Coordinate, candidates: &[Station]) -> Result<NearestStation> {
    let mut best: Option<(&Station, Coordinate, f64)> = None;

    for station in candidates {
        let Some(coordinate) = station.coordinate else {
            debug!("Skipping station {} without coordinates", station.code);
            continue;
        };
        let distance = target.distance_km(&coordinate);
        if best.as_ref().is_none_or(|(_, _, d)| distance < *d) {
            best = Some((station, coordinate, distance));
        }
    }

    let (station, coordinate, distance_km) = best.ok_or_else(|| {
        SeaguardError::no_station_found(format!(
            "no station with coordinates among {} candidates near {}",
            candidates.len(),
            target.format_coordinates()
        ))
    })?;

    Ok(NearestStation {
        station: station.clone(),
        coordinate,
        distance_km,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(code: &str, lat: f64, lon: f64) -> Station {
        Station::new(code, None, Coordinate::checked(lat, lon))
    }

    fn seoul() -> Coordinate {
        Coordinate::new(37.5665, 126.9780).unwrap()
    }

    #[test]
    fn test_picks_closest() {
        let stations = vec![
            station("DT_0004", 35.0960, 129.0350),
            station("DT_0001", 37.6133, 126.9780),
            station("DT_0002", 37.4510, 126.5920),
        ];
        let nearest = nearest_station(&seoul(), &stations).unwrap();
        assert_eq!(nearest.station.code, "DT_0001");
        assert!((nearest.distance_km - 5.20).abs() < 0.1, "{}", nearest.distance_km);

        for other in &stations {
            let d = seoul().distance_km(&other.coordinate.unwrap());
            assert!(nearest.distance_km <= d);
        }
    }

    #[test]
    fn test_tie_goes_to_first() {
        // Mirror images around the target meridian are equidistant
        let stations = vec![station("DT_A", 37.0, 127.5), station("DT_B", 37.0, 126.5)];
        let target = Coordinate::new(37.0, 127.0).unwrap();
        assert_eq!(nearest_station(&target, &stations).unwrap().station.code, "DT_A");

        let reversed: Vec<_> = stations.into_iter().rev().collect();
        assert_eq!(nearest_station(&target, &reversed).unwrap().station.code, "DT_B");
    }

    #[test]
    fn test_skips_stations_without_coordinates() {
        let stations = vec![
            Station::new("DT_NONE", Some("broken".to_string()), None),
            station("DT_0009", 34.0, 127.0),
        ];
        let nearest = nearest_station(&seoul(), &stations).unwrap();
        assert_eq!(nearest.station.code, "DT_0009");
    }

    #[test]
    fn test_empty_and_unusable_lists() {
        let err = nearest_station(&seoul(), &[]).unwrap_err();
        assert!(matches!(err, SeaguardError::NoStationFound { .. }));

        let err = nearest_station(&seoul(), &[Station::new("DT_X", None, None)]).unwrap_err();
        assert!(matches!(err, SeaguardError::NoStationFound { .. }));
    }

    #[test]
    fn test_distance_never_exceeds_any_candidate() {
        // Deterministic grid of candidates around the peninsula
        let mut stations = Vec::new();
        for i in 0..12 {
            for j in 0..12 {
                let lat = 33.0 + f64::from(i) * 0.5;
                let lon = 124.5 + f64::from(j) * 0.5;
                stations.push(station(&format!("DT_{i:02}{j:02}"), lat, lon));
            }
        }
        let targets = [
            seoul(),
            Coordinate::new(35.1796, 129.0756).unwrap(),
            Coordinate::new(33.4996, 126.5312).unwrap(),
        ];
        for target in targets {
            let nearest = nearest_station(&target, &stations).unwrap();
            assert!(stations
                .iter()
                .all(|s| nearest.distance_km <= target.distance_km(&s.coordinate.unwrap())));
        }
    }
}
