//! Safety assessment produced from observation data

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Categorical hazard level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band a 0–100 score: 0–39 low, 40–69 medium, 70–89 high, 90–100 critical
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => RiskLevel::Low,
            40..=69 => RiskLevel::Medium,
            70..=89 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!(
                "risk_level '{other}' is not one of low, medium, high, critical"
            )),
        }
    }
}

/// Structured safety assessment, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyAssessment {
    pub risk_level: RiskLevel,
    /// Always within 0..=100
    pub risk_score: u8,
    pub summary: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub emergency_contacts: Vec<String>,
}

/// Contacts used when the model omits them
pub const DEFAULT_EMERGENCY_CONTACTS: [&str; 2] = ["119", "Korea Coast Guard 122"];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, RiskLevel::Low)]
    #[case(39, RiskLevel::Low)]
    #[case(40, RiskLevel::Medium)]
    #[case(69, RiskLevel::Medium)]
    #[case(70, RiskLevel::High)]
    #[case(89, RiskLevel::High)]
    #[case(90, RiskLevel::Critical)]
    #[case(100, RiskLevel::Critical)]
    fn test_score_bands(#[case] score: u8, #[case] expected: RiskLevel) {
        assert_eq!(RiskLevel::from_score(score), expected);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("HIGH".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert_eq!(" low ".parse::<RiskLevel>(), Ok(RiskLevel::Low));
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
