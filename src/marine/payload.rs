//! Tolerant accessors for KHOA JSON payloads.
//!
//! The OceanGrid endpoints are inconsistent about envelope layout and field
//! casing (`ObsCode`, `obs_code`, `obs_post_id`, ...). These helpers find the
//! record array wherever it is nested and look fields up by any of their
//! known aliases.

use serde_json::{Map, Value};

/// Keys that commonly wrap the record array
const CONTAINER_KEYS: [&str; 8] = [
    "data", "Data", "result", "Result", "item", "items", "list", "List",
];

/// Lowercase and strip everything that is not alphanumeric
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// `{"value": x}` style wrappers collapse to `x`
fn unwrap_value(value: &Value) -> &Value {
    if let Value::Object(map) = value {
        for key in ["value", "Value", "val"] {
            if let Some(inner) = map.get(key).filter(|v| !is_blank(v)) {
                return inner;
            }
        }
    }
    value
}

/// First non-blank value under any of `keys`, exact match before normalized match
#[must_use]
pub fn first_value<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        if let Some(value) = item.get(*key).filter(|v| !is_blank(v)) {
            return Some(unwrap_value(value));
        }
    }
    for key in keys {
        let wanted = normalize_key(key);
        let found = item
            .iter()
            .find(|(k, v)| normalize_key(k) == wanted && !is_blank(v));
        if let Some((_, value)) = found {
            return Some(unwrap_value(value));
        }
    }
    None
}

/// Render a scalar as text; numbers keep their JSON formatting
#[must_use]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a scalar as `f64`, accepting numeric strings
#[must_use]
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a scalar as an integer the way a strict `int()` would:
/// integral numbers, truncated floats, or integer strings
#[must_use]
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn looks_like_station(map: &Map<String, Value>) -> bool {
    let keys: Vec<String> = map.keys().map(|k| normalize_key(k)).collect();
    let has = |k: &str| keys.iter().any(|key| key == k);
    has("obspostid") || has("obscode") || (has("obslat") && has("obslon"))
}

/// Locate the record array inside an arbitrarily nested payload
#[must_use]
pub fn extract_items(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            if looks_like_station(map) {
                return vec![payload];
            }
            for key in CONTAINER_KEYS {
                if let Some(inner) = map.get(key) {
                    let items = extract_items(inner);
                    if !items.is_empty() {
                        return items;
                    }
                }
            }
            for inner in map.values() {
                let items = extract_items(inner);
                if !items.is_empty() {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Error text reported by the provider inside a 200 response, if any
#[must_use]
pub fn extract_error_message(payload: &Value) -> Option<String> {
    let map = payload.as_object()?;
    for key in ["error", "Error", "message", "Message"] {
        if let Some(value) = map.get(key).filter(|v| is_truthy(v)) {
            return Some(render(value));
        }
    }
    let result = map
        .get("result")
        .filter(|v| is_truthy(v))
        .or_else(|| map.get("Result"))?;
    let result = result.as_object()?;
    for key in ["msg", "message", "error", "Error", "code", "resultCode"] {
        if let Some(value) = result.get(key).filter(|v| is_truthy(v)) {
            return Some(render(value));
        }
    }
    None
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
    }
}

fn render(value: &Value) -> String {
    value_to_string(value).unwrap_or_else(|| value.to_string())
}

/// Cut a payload down to `limit` characters for logs and previews
#[must_use]
pub fn preview(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Obs_Post-Id"), "obspostid");
        assert_eq!(normalize_key("obsLat"), "obslat");
    }

    #[test]
    fn test_first_value_prefers_exact_then_normalized() {
        let item = json!({"OBS_CODE": "DT_0002", "ObsName": ""});
        let map = item.as_object().unwrap();
        assert_eq!(
            first_value(map, &["ObsCode", "obs_code"]),
            Some(&json!("DT_0002"))
        );
        // blank strings are skipped
        assert_eq!(first_value(map, &["ObsName"]), None);
    }

    #[test]
    fn test_first_value_unwraps_value_objects() {
        let item = json!({"obs_lat": {"value": "37.45"}});
        let map = item.as_object().unwrap();
        let lat = first_value(map, &["ObsLat"]).and_then(value_to_f64);
        assert_eq!(lat, Some(37.45));
    }

    #[test]
    fn test_extract_items_nested_result_data() {
        let payload = json!({"result": {"meta": {}, "data": [{"a": 1}, {"a": 2}]}});
        assert_eq!(extract_items(&payload).len(), 2);
    }

    #[test]
    fn test_extract_items_single_station_object() {
        let payload = json!({"result": {"data": {"obs_post_id": "DT_0001", "obs_lat": 37.0}}});
        let items = extract_items(&payload);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["obs_post_id"], json!("DT_0001"));
    }

    #[test]
    fn test_extract_items_searches_unknown_keys() {
        let payload = json!({"body": {"rows": [1, 2, 3]}});
        assert_eq!(extract_items(&payload).len(), 3);
        assert!(extract_items(&json!({"result": {"error": "bad key"}})).is_empty());
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(&json!({"result": {"error": "invalid service key"}})),
            Some("invalid service key".to_string())
        );
        assert_eq!(
            extract_error_message(&json!({"message": "quota exceeded"})),
            Some("quota exceeded".to_string())
        );
        assert_eq!(extract_error_message(&json!({"result": {"data": []}})), None);
        assert_eq!(extract_error_message(&json!([1, 2])), None);
    }

    #[test]
    fn test_value_to_i64() {
        assert_eq!(value_to_i64(&json!(412)), Some(412));
        assert_eq!(value_to_i64(&json!("412")), Some(412));
        assert_eq!(value_to_i64(&json!(41.9)), Some(41));
        assert_eq!(value_to_i64(&json!("41.9")), None);
        assert_eq!(value_to_i64(&json!(null)), None);
    }
}
