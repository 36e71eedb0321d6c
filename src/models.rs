use serde::{Deserialize, Deserializer, Serialize};

use crate::risk::RiskBand;

/// A user row as served by the user-management service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElderlyUser {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// The service stores age as text; it is parsed on demand.
    #[serde(default, deserialize_with = "text_or_number")]
    pub age: String,
}

impl ElderlyUser {
    pub fn age_years(&self) -> Option<u32> {
        self.age.trim().parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FesResponseDetail {
    #[serde(default)]
    pub response_id: i64,
    pub question_id: u8,
    pub response_score: u8,
}

/// One completed Falls Efficacy Scale questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FesResponse {
    pub response_id: i64,
    pub user_id: i64,
    pub response_date: String,
    pub total_score: i64,
    #[serde(default)]
    pub response_details: Vec<FesResponseDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default)]
    pub test_id: i64,
    pub test_name: String,
    pub time_taken: f64,
    pub abrupt_percentage: f64,
    /// Level assigned by the capture device at test time, if any.
    #[serde(default)]
    pub risk_level: Option<String>,
}

impl TestResult {
    pub fn recorded_band(&self) -> Option<RiskBand> {
        self.risk_level.as_deref().and_then(|level| level.parse().ok())
    }
}

/// One battery of device-timed physical tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfAssessmentSession {
    pub session_id: i64,
    pub user_id: i64,
    pub session_date: String,
    #[serde(default, deserialize_with = "nullable_score")]
    pub total_score: Option<i64>,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

/// Flat per-test timing row used by the cohort time-taken chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTiming {
    pub user_id: i64,
    pub test_name: String,
    pub time_taken: f64,
    #[serde(default)]
    pub session_date: String,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

/// Accepts a bare integer, `null`, or the `{"Int64": n, "Valid": bool}`
/// object emitted for nullable SQL columns by the self-assessment service.
fn nullable_score<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Plain(i64),
        Float(f64),
        Wrapped {
            #[serde(rename = "Int64")]
            value: i64,
            #[serde(rename = "Valid", default = "valid_default")]
            valid: bool,
        },
    }

    fn valid_default() -> bool {
        true
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Plain(value)) => Some(value),
        Some(Raw::Float(value)) if value.is_finite() => Some(value.round() as i64),
        Some(Raw::Float(_)) => None,
        Some(Raw::Wrapped { value, valid }) => valid.then_some(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_score_accepts_wrapped_null_int() {
        let json = r#"{
            "session_id": 4,
            "user_id": 1,
            "session_date": "2025-01-20T10:00:00Z",
            "total_score": {"Int64": 82, "Valid": true},
            "test_results": []
        }"#;
        let session: SelfAssessmentSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.total_score, Some(82));
    }

    #[test]
    fn invalid_wrapped_score_is_none() {
        let json = r#"{
            "session_id": 4,
            "user_id": 1,
            "session_date": "2025-01-20T10:00:00Z",
            "total_score": {"Int64": 0, "Valid": false}
        }"#;
        let session: SelfAssessmentSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.total_score, None);
        assert!(session.test_results.is_empty());
    }

    #[test]
    fn session_score_accepts_plain_and_missing() {
        let plain: SelfAssessmentSession = serde_json::from_str(
            r#"{"session_id": 1, "user_id": 2, "session_date": "2025-02-01", "total_score": 64}"#,
        )
        .unwrap();
        assert_eq!(plain.total_score, Some(64));

        let missing: SelfAssessmentSession = serde_json::from_str(
            r#"{"session_id": 1, "user_id": 2, "session_date": "2025-02-01"}"#,
        )
        .unwrap();
        assert_eq!(missing.total_score, None);
    }

    #[test]
    fn user_age_accepts_text_or_number() {
        let text: ElderlyUser = serde_json::from_str(
            r#"{"user_id": 1, "name": "Alice Tan", "email": "alice@example.com", "age": "61"}"#,
        )
        .unwrap();
        let number: ElderlyUser =
            serde_json::from_str(r#"{"user_id": 2, "name": "Ben Ong", "age": 74}"#).unwrap();
        assert_eq!(text.age_years(), Some(61));
        assert_eq!(number.age_years(), Some(74));
    }

    #[test]
    fn recorded_band_parses_device_level() {
        let result = TestResult {
            test_id: 1,
            test_name: "Timed Up and Go Test".to_string(),
            time_taken: 12.0,
            abrupt_percentage: 18.0,
            risk_level: Some("moderate".to_string()),
        };
        assert_eq!(result.recorded_band(), Some(RiskBand::Moderate));
    }
}
