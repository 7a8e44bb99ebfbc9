//! Lenient parsing of scenario model output. Every parser falls back to
//! neutral defaults instead of failing the turn.

use serde_json::{Map, Value};
use tracing::warn;

use super::{ChoiceFeedback, Evaluation, SurvivalEstimate};
use crate::llm::extract_json_object;
use crate::marine::payload::preview;

const DEFAULT_SURVIVAL_RATE: u8 = 50;
const DEFAULT_CHANGE: &str = "0";
const DEFAULT_COMMENT: &str = "Choice recorded.";

/// Three numbered actions (`1.`/`1)` through `3.`/`3)`). Anything other than
/// exactly three becomes `[full_text, "", ""]`.
#[must_use]
pub fn parse_choices(text: &str) -> [String; 3] {
    let choices: Vec<String> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            ["1", "2", "3"].iter().find_map(|n| {
                line.strip_prefix(n)
                    .and_then(|rest| rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')))
                    .map(|rest| rest.trim().to_string())
            })
        })
        .collect();

    match <[String; 3]>::try_from(choices) {
        Ok(choices) => choices,
        Err(found) => {
            warn!("Expected 3 choices, found {}; returning raw text", found.len());
            [text.to_string(), String::new(), String::new()]
        }
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let json = extract_json_object(text)?;
    match serde_json::from_str(json) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Signed change text from a JSON string or number, e.g. `"+15"`
fn change_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => {
            let n = n.as_f64()?;
            Some(if n > 0.0 {
                format!("+{n}")
            } else {
                format!("{n}")
            })
        }
        _ => None,
    }
}

fn rate(value: Option<&Value>) -> Option<u8> {
    let value = value?;
    let rate = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().trim_end_matches('%').parse().ok()))?;
    rate.is_finite().then(|| rate.round().clamp(0.0, 100.0) as u8)
}

#[must_use]
pub fn parse_survival(text: &str) -> SurvivalEstimate {
    let Some(object) = parse_object(text) else {
        warn!("Unparseable survival estimate: {}", preview(text, 200));
        return SurvivalEstimate::default();
    };
    SurvivalEstimate {
        survival_rate: rate(object.get("survival_rate")).unwrap_or(DEFAULT_SURVIVAL_RATE),
        change: change_text(object.get("change")).unwrap_or_else(|| DEFAULT_CHANGE.to_string()),
    }
}

#[must_use]
pub fn parse_feedback(text: &str, chosen_action: &str) -> ChoiceFeedback {
    let Some(object) = parse_object(text) else {
        warn!("Unparseable choice feedback: {}", preview(text, 200));
        return ChoiceFeedback::neutral(chosen_action);
    };
    let string = |field: &str| {
        object
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "null")
            .map(str::to_string)
    };

    ChoiceFeedback {
        chosen_action: string("chosen_action").unwrap_or_else(|| chosen_action.to_string()),
        evaluation: string("evaluation")
            .and_then(|e| e.parse().ok())
            .unwrap_or(Evaluation::Neutral),
        comment: string("comment").unwrap_or_else(|| DEFAULT_COMMENT.to_string()),
        better_choice: string("better_choice"),
        survival_impact: change_text(object.get("survival_impact"))
            .unwrap_or_else(|| DEFAULT_CHANGE.to_string()),
    }
}

impl Default for SurvivalEstimate {
    fn default() -> Self {
        Self {
            survival_rate: DEFAULT_SURVIVAL_RATE,
            change: DEFAULT_CHANGE.to_string(),
        }
    }
}

impl ChoiceFeedback {
    /// Feedback used when the model's answer is unusable
    #[must_use]
    pub fn neutral(chosen_action: &str) -> Self {
        Self {
            chosen_action: chosen_action.to_string(),
            evaluation: Evaluation::Neutral,
            comment: DEFAULT_COMMENT.to_string(),
            better_choice: None,
            survival_impact: DEFAULT_CHANGE.to_string(),
        }
    }
}
