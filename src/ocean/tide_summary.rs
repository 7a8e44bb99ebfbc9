//! Tide series summarisation
//!
//! Raw `tideObs` payloads carry a reading per minute, far more than an LLM
//! prompt needs. The series is reduced to statistics, a trend, turning points
//! and an hourly-ish sample.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sunrise::{Coordinates, SolarDay, SolarEvent};
use tracing::debug;

use crate::marine::payload::{first_value, preview, value_to_i64, value_to_string};
use crate::models::{
    Coordinate, Daylight, ObservationDigest, TideReading, TideStatistics, TideSummary, TideTrend,
};

const LEVEL_KEYS: [&str; 2] = ["tide_level", "tideLevel"];
const TIME_KEYS: [&str; 2] = ["record_time", "recordTime"];

/// Readings compared on each side of the trend window
const TREND_WINDOW: usize = 10;
/// Mean difference in cm that counts as movement
const TREND_THRESHOLD_CM: f64 = 5.0;
const SAMPLE_TARGET: usize = 48;
const MAX_SAMPLES: usize = 24;
const MAX_TURNING_POINTS: usize = 5;
const RAW_PREVIEW_CHARS: usize = 500;
/// Readings beyond this magnitude are sensor faults, not tides
const MAX_PLAUSIBLE_LEVEL_CM: i64 = 10_000;

/// Sunrise and sunset at `coordinate` on `date`; `None` during polar day or night
#[must_use]
pub fn daylight(coordinate: &Coordinate, date: NaiveDate) -> Option<Daylight> {
    let coordinates = Coordinates::new(coordinate.latitude, coordinate.longitude)?;
    let solar_day = SolarDay::new(coordinates, date);
    let sunrise: DateTime<Utc> = solar_day.event_time(SolarEvent::Sunrise)?;
    let sunset: DateTime<Utc> = solar_day.event_time(SolarEvent::Sunset)?;
    Some(Daylight { sunrise, sunset })
}

/// Locate the observation list: `result.data` first, then top-level `data`
fn data_list(observation: &Value) -> Option<&Vec<Value>> {
    let object = observation.as_object()?;
    match object.get("result").and_then(Value::as_object) {
        Some(result) => result.get("data")?.as_array(),
        None => object.get("data")?.as_array(),
    }
}

fn average(levels: &[i64]) -> f64 {
    levels.iter().map(|&level| level as f64).sum::<f64>() / levels.len() as f64
}

fn trend(levels: &[i64]) -> TideTrend {
    if levels.len() < TREND_WINDOW * 2 {
        return TideTrend::Stable;
    }
    let recent = average(&levels[levels.len() - TREND_WINDOW..]);
    let previous_window = &levels[levels.len() - TREND_WINDOW * 2..levels.len() - TREND_WINDOW];
    let previous = average(previous_window);
    if recent > previous + TREND_THRESHOLD_CM {
        TideTrend::Rising
    } else if recent < previous - TREND_THRESHOLD_CM {
        TideTrend::Falling
    } else {
        TideTrend::Stable
    }
}

/// Strict local extrema on the correct side of the mean
fn turning_points(records: &[TideReading], mean: f64) -> (Vec<TideReading>, Vec<TideReading>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    for window in records.windows(3) {
        let (before, point, after) = (&window[0], &window[1], &window[2]);
        let level = point.level as f64;
        if point.level > before.level && point.level > after.level && level >= mean {
            highs.push(point.clone());
        } else if point.level < before.level && point.level < after.level && level <= mean {
            lows.push(point.clone());
        }
    }
    highs.truncate(MAX_TURNING_POINTS);
    lows.truncate(MAX_TURNING_POINTS);
    (highs, lows)
}

fn sample(records: &[TideReading]) -> Vec<TideReading> {
    let interval = (records.len() / SAMPLE_TARGET).max(1);
    records
        .iter()
        .step_by(interval)
        .take(MAX_SAMPLES)
        .cloned()
        .collect()
}

fn empty(
    reason: &str,
    total_records: usize,
    observation: &Value,
    daylight: Option<Daylight>,
) -> ObservationDigest {
    ObservationDigest::Empty {
        summary: reason.to_string(),
        total_records,
        raw_preview: preview(&observation.to_string(), RAW_PREVIEW_CHARS),
        daylight,
    }
}

/// Reduce a raw observation payload to what the safety prompt needs
#[must_use]
pub fn summarize(
    observation: &Value,
    coordinate: &Coordinate,
    date: NaiveDate,
) -> ObservationDigest {
    let daylight = daylight(coordinate, date);

    let Some(items) = data_list(observation).filter(|items| !items.is_empty()) else {
        return empty("no data", 0, observation, daylight);
    };

    let mut levels = Vec::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());
    for item in items.iter().filter_map(Value::as_object) {
        let Some(level) = first_value(item, &LEVEL_KEYS)
            .and_then(value_to_i64)
            .filter(|level| (-MAX_PLAUSIBLE_LEVEL_CM..=MAX_PLAUSIBLE_LEVEL_CM).contains(level))
        else {
            continue;
        };
        levels.push(level);
        if let Some(time) = first_value(item, &TIME_KEYS)
            .and_then(value_to_string)
            .filter(|t| !t.is_empty())
        {
            records.push(TideReading { time, level });
        }
    }

    let (Some(&max), Some(&min), Some(&current)) =
        (levels.iter().max(), levels.iter().min(), levels.last())
    else {
        return empty("no tide level data", items.len(), observation, daylight);
    };

    let mean = average(&levels);
    let (high_tides, low_tides) = turning_points(&records, mean);
    debug!(
        "Summarised {} tide readings ({} timed): {} highs, {} lows",
        levels.len(),
        records.len(),
        high_tides.len(),
        low_tides.len()
    );

    ObservationDigest::Summary(TideSummary {
        total_records: items.len(),
        statistics: TideStatistics {
            max_tide_cm: max,
            min_tide_cm: min,
            avg_tide_cm: (mean * 10.0).round() / 10.0,
            current_tide_cm: current,
            trend: trend(&levels),
        },
        high_tides,
        low_tides,
        sampled_data: sample(&records),
        daylight,
    })
}
