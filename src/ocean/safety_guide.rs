//! Safety guide generation from nearby tide observations

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::locator::{TideLocator, TideQuery};
use super::tide_summary::summarize;
use crate::llm::{CompletionRequest, LanguageModel, extract_json_object};
use crate::marine::MarineDataSource;
use crate::marine::payload::preview;
use crate::models::{
    Coordinate, DEFAULT_EMERGENCY_CONTACTS, ObservationDigest, RiskLevel, SafetyAssessment,
    StationInfo, TideReading,
};
use crate::{Result, SeaguardError};

const SYSTEM_MESSAGE: &str = "You are a marine safety expert. Analyse the tide data and write a \
safety guide that members of the public can follow. Base it on the data, keep jargon to a \
minimum and give concrete actions.";

/// Safety guide returned to clients
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SafetyGuide {
    pub location: Coordinate,
    /// Requested date as `YYYYMMDD`
    pub date: String,
    #[serde(flatten)]
    pub assessment: SafetyAssessment,
    /// Raw provider payload
    pub ocean_data: Value,
    pub station_info: StationInfo,
}

/// Locates observations, asks the model for an assessment and validates it
#[derive(Clone)]
pub struct SafetyGuideService {
    locator: TideLocator,
    llm: Arc<dyn LanguageModel>,
}

impl SafetyGuideService {
    pub fn new(marine: Arc<dyn MarineDataSource>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            locator: TideLocator::new(marine),
            llm,
        }
    }

    #[instrument(skip(self), fields(model = self.llm.model_name()))]
    pub async fn generate(&self, query: &TideQuery) -> Result<SafetyGuide> {
        let start_time = Instant::now();
        let lookup = self.locator.locate(query).await?;

        let digest = summarize(&lookup.observation, &query.coordinate, query.date);
        let prompt = build_prompt(&query.coordinate, &query.date_param(), &digest);
        debug!("Safety prompt is {} chars", prompt.chars().count());

        let request = CompletionRequest::new(prompt)
            .with_system(SYSTEM_MESSAGE)
            .with_json_output();
        let text = self.llm.complete(&request).await?;

        let assessment = parse_assessment(&text).inspect_err(|e| {
            warn!("Rejected model assessment ({}): {}", e, preview(&text, 300));
        })?;

        info!(
            "Safety guide for {}: {} ({}) in {:.3}s",
            query.coordinate.format_coordinates(),
            assessment.risk_level,
            assessment.risk_score,
            start_time.elapsed().as_secs_f64()
        );

        Ok(SafetyGuide {
            location: query.coordinate,
            date: query.date_param(),
            assessment,
            station_info: StationInfo::from(&lookup.station),
            ocean_data: lookup.observation,
        })
    }
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// First three turning points, or "no data"
fn render_turning_points(points: &[TideReading]) -> String {
    if points.is_empty() {
        "no data".to_string()
    } else {
        render_json(&points[..points.len().min(3)])
    }
}

/// Deterministic assessment prompt for a location, date and tide digest
#[must_use]
pub fn build_prompt(coordinate: &Coordinate, date: &str, digest: &ObservationDigest) -> String {
    let mut prompt = format!(
        "=== Location ===\nLatitude: {}\nLongitude: {}\nDate: {}\n\n=== Tide summary ===\n",
        coordinate.latitude, coordinate.longitude, date
    );

    match digest {
        ObservationDigest::Summary(summary) => {
            let stats = &summary.statistics;
            prompt.push_str(&format!(
                "Current level: {}cm\nTrend: {}\nHighest level: {}cm\nLowest level: {}cm\n\
                 Average level: {}cm\n\nHigh tides: {}\nLow tides: {}\n",
                stats.current_tide_cm,
                stats.trend.describe(),
                stats.max_tide_cm,
                stats.min_tide_cm,
                stats.avg_tide_cm,
                render_turning_points(&summary.high_tides),
                render_turning_points(&summary.low_tides),
            ));
        }
        ObservationDigest::Empty { summary, .. } => {
            prompt.push_str(&format!("No usable tide readings: {summary}\n"));
        }
    }

    if let Some(daylight) = digest.daylight() {
        prompt.push_str(&format!(
            "Sunrise: {} UTC\nSunset: {} UTC\n",
            daylight.sunrise.format("%H:%M"),
            daylight.sunset.format("%H:%M")
        ));
    }

    prompt.push_str("\nFull data:\n");
    prompt.push_str(&render_json(digest));
    prompt.push_str(
        "\n\nAnalyse the data above and answer with a JSON object of this shape:\n\
         {\n\
         \x20 \"risk_level\": \"<low|medium|high|critical>\",\n\
         \x20 \"risk_score\": <integer 0-100>,\n\
         \x20 \"summary\": \"<2-3 sentence summary of conditions>\",\n\
         \x20 \"warnings\": [\"<specific hazard>\", ...],\n\
         \x20 \"recommendations\": [\"<concrete action>\", ...],\n\
         \x20 \"emergency_contacts\": [\"119\", \"Korea Coast Guard 122\"]\n\
         }\n\n\
         Risk bands (risk_level must match risk_score):\n\
         - critical (90-100): evacuate immediately, life-threatening\n\
         - high (70-89): very dangerous, no marine activity\n\
         - medium (40-69): caution, limited activity only\n\
         - low (0-39): safe, follow the usual precautions\n\n\
         Consider:\n\
         1. When high and low tide fall relative to daylight\n\
         2. Whether the level is rising or falling\n\
         3. Unusual levels compared with the average\n\
         4. Safe windows for coastal activity\n\n\
         List at least one warning unless the risk is low.\n\
         Output JSON only.",
    );
    prompt
}

fn string_list(object: &Map<String, Value>, field: &str) -> Result<Option<Vec<String>>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    SeaguardError::assessment_parse(format!("{field} must contain only strings"))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(_) => Err(SeaguardError::assessment_parse(format!(
            "{field} must be an array of strings"
        ))),
    }
}

fn required_list(object: &Map<String, Value>, field: &str) -> Result<Vec<String>> {
    string_list(object, field)?
        .ok_or_else(|| SeaguardError::assessment_parse(format!("missing field {field}")))
}

fn risk_score(value: Option<&Value>) -> Result<u8> {
    let value = value.ok_or_else(|| SeaguardError::assessment_parse("missing field risk_score"))?;
    let score = value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })
        .ok_or_else(|| {
            SeaguardError::assessment_parse(format!("risk_score must be an integer, got {value}"))
        })?;
    u8::try_from(score)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| {
            SeaguardError::assessment_parse(format!("risk_score {score} is outside 0-100"))
        })
}

/// Validate model output into a [`SafetyAssessment`]
pub fn parse_assessment(text: &str) -> Result<SafetyAssessment> {
    let json = extract_json_object(text)
        .ok_or_else(|| SeaguardError::assessment_parse("no JSON object in model output"))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SeaguardError::assessment_parse(format!("invalid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| SeaguardError::assessment_parse("model output is not a JSON object"))?;

    let risk_level: RiskLevel = object
        .get("risk_level")
        .and_then(Value::as_str)
        .ok_or_else(|| SeaguardError::assessment_parse("missing field risk_level"))?
        .parse()
        .map_err(SeaguardError::assessment_parse)?;
    let risk_score = risk_score(object.get("risk_score"))?;

    let expected = RiskLevel::from_score(risk_score);
    if expected != risk_level {
        return Err(SeaguardError::assessment_parse(format!(
            "risk_level {risk_level} does not match risk_score {risk_score} (expected {expected})"
        )));
    }

    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SeaguardError::assessment_parse("missing field summary"))?
        .to_string();
    let warnings = required_list(object, "warnings")?;
    let recommendations = required_list(object, "recommendations")?;

    if risk_level != RiskLevel::Low && warnings.is_empty() {
        return Err(SeaguardError::assessment_parse(format!(
            "warnings must not be empty for {risk_level} risk"
        )));
    }

    let emergency_contacts = string_list(object, "emergency_contacts")?
        .filter(|contacts| !contacts.is_empty())
        .unwrap_or_else(|| DEFAULT_EMERGENCY_CONTACTS.map(str::to_string).to_vec());

    Ok(SafetyAssessment {
        risk_level,
        risk_score,
        summary,
        warnings,
        recommendations,
        emergency_contacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use serde_json::json;

    const VALID: &str = r#"{
        "risk_level": "medium",
        "risk_score": 55,
        "summary": "The tide is rising towards a high of 820cm this afternoon.",
        "warnings": ["Stay off tidal flats after 14:00"],
        "recommendations": ["Wear a life jacket"],
        "emergency_contacts": ["119"]
    }"#;

    #[test]
    fn test_parse_valid_assessment() {
        let assessment = parse_assessment(VALID).unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.risk_score, 55);
        assert_eq!(assessment.emergency_contacts, vec!["119".to_string()]);
    }

    #[test]
    fn test_parse_fenced_assessment_with_prose() {
        let text = format!("Here is the guide:\n```json\n{VALID}\n```\nStay safe!");
        assert!(parse_assessment(&text).is_ok());
        let text = format!("```\n{VALID}\n```");
        assert!(parse_assessment(&text).is_ok());
    }

    #[test]
    fn test_default_emergency_contacts() {
        let text = r#"{"risk_level":"low","risk_score":10,"summary":"Calm.","warnings":[],"recommendations":[]}"#;
        let assessment = parse_assessment(text).unwrap();
        assert_eq!(assessment.emergency_contacts, vec!["119", "Korea Coast Guard 122"]);
        assert!(assessment.warnings.is_empty());
    }

    #[rstest]
    #[case::band_mismatch(r#"{"risk_level":"low","risk_score":75,"summary":"s","warnings":["w"],"recommendations":[]}"#)]
    #[case::score_too_high(r#"{"risk_level":"critical","risk_score":101,"summary":"s","warnings":["w"],"recommendations":[]}"#)]
    #[case::negative_score(r#"{"risk_level":"low","risk_score":-1,"summary":"s","warnings":[],"recommendations":[]}"#)]
    #[case::fractional_score(r#"{"risk_level":"low","risk_score":12.5,"summary":"s","warnings":[],"recommendations":[]}"#)]
    #[case::string_score(r#"{"risk_level":"low","risk_score":"12","summary":"s","warnings":[],"recommendations":[]}"#)]
    #[case::unknown_level(r#"{"risk_level":"severe","risk_score":95,"summary":"s","warnings":["w"],"recommendations":[]}"#)]
    #[case::missing_summary(r#"{"risk_level":"low","risk_score":5,"warnings":[],"recommendations":[]}"#)]
    #[case::missing_warnings(r#"{"risk_level":"low","risk_score":5,"summary":"s","recommendations":[]}"#)]
    #[case::non_string_warning(r#"{"risk_level":"low","risk_score":5,"summary":"s","warnings":[1],"recommendations":[]}"#)]
    #[case::high_without_warnings(r#"{"risk_level":"high","risk_score":80,"summary":"s","warnings":[],"recommendations":["r"]}"#)]
    #[case::not_json("The sea looks calm today.")]
    #[case::array(r#"[{"risk_level":"low"}]"#)]
    fn test_rejects_invalid_assessment(#[case] text: &str) {
        let err = parse_assessment(text).unwrap_err();
        assert!(matches!(err, SeaguardError::AssessmentParse { .. }), "{err}");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_whole_number_float_score_is_accepted() {
        let text = r#"{"risk_level":"high","risk_score":70.0,"summary":"s","warnings":["w"],"recommendations":[]}"#;
        assert_eq!(parse_assessment(text).unwrap().risk_score, 70);
    }

    #[test]
    fn test_prompt_is_deterministic_and_embeds_summary() {
        let coordinate = Coordinate::new(37.5665, 126.978).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let observation = json!({"result": {"data": [
            {"record_time": "2025-01-15 00:00:00", "tide_level": "512"},
            {"record_time": "2025-01-15 00:01:00", "tide_level": "530"},
            {"record_time": "2025-01-15 00:02:00", "tide_level": "521"},
        ]}});
        let digest = summarize(&observation, &coordinate, date);

        let first = build_prompt(&coordinate, "20250115", &digest);
        let second = build_prompt(&coordinate, "20250115", &digest);
        assert_eq!(first, second);
        assert!(first.contains("Latitude: 37.5665"));
        assert!(first.contains("Date: 20250115"));
        assert!(first.contains("Current level: 521cm"));
        assert!(first.contains("\"level\": 530"));
        assert!(first.contains("Sunrise:"));
        assert!(first.contains("Output JSON only."));
    }

    #[test]
    fn test_prompt_for_empty_digest() {
        let coordinate = Coordinate::new(35.0, 129.0).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let digest = summarize(&json!({"result": {}}), &coordinate, date);
        let prompt = build_prompt(&coordinate, "20250115", &digest);
        assert!(prompt.contains("No usable tide readings: no data"));
    }
}
