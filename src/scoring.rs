//! Composite 0-100 scores for device-timed physical tests.
//!
//! Each test type carries a time tolerance and an abrupt-movement tolerance.
//! Time and abruptness are scored separately against those tolerances and
//! blended 70/30.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{SelfAssessmentSession, TestResult};

pub const TIME_WEIGHT: f64 = 0.7;
pub const ABRUPT_WEIGHT: f64 = 0.3;
pub const MAX_SESSION_SCORE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestKind {
    TimedUpAndGo,
    FiveTimesSitToStand,
    DynamicGaitIndex,
    FourStageBalance,
    Other,
}

impl TestKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Timed Up and Go Test" => TestKind::TimedUpAndGo,
            "Five Times Sit to Stand Test" => TestKind::FiveTimesSitToStand,
            "Dynamic Gait Index (DGI)" => TestKind::DynamicGaitIndex,
            "4 Stage Balance Test" => TestKind::FourStageBalance,
            _ => TestKind::Other,
        }
    }

    pub fn tolerance(&self) -> Tolerance {
        let (time, abrupt) = match self {
            TestKind::TimedUpAndGo => (20.0, 30.0),
            TestKind::FiveTimesSitToStand => (25.0, 40.0),
            TestKind::DynamicGaitIndex => (25.0, 20.0),
            TestKind::FourStageBalance => (40.0, 15.0),
            TestKind::Other => (12.0, 50.0),
        };
        Tolerance { time, abrupt }
    }

    /// Balance is held for as long as possible; every other test is timed
    /// to completion, so shorter is better.
    pub fn longer_is_better(&self) -> bool {
        matches!(self, TestKind::FourStageBalance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub time: f64,
    pub abrupt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TestStatus {
    Unhealthy,
    Moderate,
    Healthy,
}

impl TestStatus {
    pub fn from_score(score: u8) -> Self {
        Self::from_score_with(score, &StatusCutoffs::default())
    }

    pub fn from_score_with(score: u8, cutoffs: &StatusCutoffs) -> Self {
        if score >= cutoffs.healthy {
            TestStatus::Healthy
        } else if score >= cutoffs.moderate {
            TestStatus::Moderate
        } else {
            TestStatus::Unhealthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Healthy => "Healthy",
            TestStatus::Moderate => "Moderate",
            TestStatus::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCutoffs {
    pub healthy: u8,
    pub moderate: u8,
}

impl Default for StatusCutoffs {
    fn default() -> Self {
        StatusCutoffs {
            healthy: 80,
            moderate: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub time: f64,
    pub abrupt: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            time: TIME_WEIGHT,
            abrupt: ABRUPT_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestScore {
    pub kind: TestKind,
    pub time_score: f64,
    pub abrupt_score: f64,
    pub score: u8,
    pub status: TestStatus,
}

/// Lower-is-better sub-score: full marks inside the tolerance, then one
/// point lost per percent over it.
fn penalty_score(value: f64, tolerance: f64) -> f64 {
    if value <= tolerance {
        100.0
    } else {
        (100.0 - ((value - tolerance) / tolerance) * 100.0).max(0.0)
    }
}

fn time_score(kind: TestKind, time_taken: f64, tolerance: f64) -> f64 {
    if kind.longer_is_better() {
        if time_taken.is_nan() || time_taken <= 0.0 {
            0.0
        } else {
            ((time_taken / tolerance) * 100.0).round().min(100.0)
        }
    } else {
        penalty_score(time_taken, tolerance)
    }
}

pub fn test_score(time_taken: f64, abrupt_percentage: f64, test_name: &str) -> TestScore {
    test_score_with(
        time_taken,
        abrupt_percentage,
        test_name,
        &ScoreWeights::default(),
        &StatusCutoffs::default(),
    )
}

pub fn test_score_with(
    time_taken: f64,
    abrupt_percentage: f64,
    test_name: &str,
    weights: &ScoreWeights,
    cutoffs: &StatusCutoffs,
) -> TestScore {
    let kind = TestKind::from_name(test_name);
    let tolerance = kind.tolerance();

    let time_score = finite_or_zero(time_score(kind, time_taken, tolerance.time));
    let abrupt_score = finite_or_zero(penalty_score(abrupt_percentage, tolerance.abrupt));

    let blended = time_score * weights.time + abrupt_score * weights.abrupt;
    let score = blended.round().clamp(0.0, 100.0) as u8;

    TestScore {
        kind,
        time_score,
        abrupt_score,
        score,
        status: TestStatus::from_score_with(score, cutoffs),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn score_result(result: &TestResult) -> TestScore {
    test_score(result.time_taken, result.abrupt_percentage, &result.test_name)
}

/// Rounded mean of the session's per-test scores; `None` without tests.
pub fn session_score(session: &SelfAssessmentSession) -> Option<u8> {
    if session.test_results.is_empty() {
        return None;
    }
    let total: f64 = session
        .test_results
        .iter()
        .map(|result| score_result(result).score as f64)
        .sum();
    Some((total / session.test_results.len() as f64).round() as u8)
}

/// The 0-100 composite for a session. Sessions with test results are always
/// recomputed, since the stored total holds the sum of per-test scores.
/// Without results the stored total is used only if it is already on the
/// 0-100 scale.
pub fn resolved_session_score(session: &SelfAssessmentSession) -> Option<i64> {
    if let Some(score) = session_score(session) {
        return Some(i64::from(score));
    }
    session
        .total_score
        .filter(|total| (0..=MAX_SESSION_SCORE).contains(total))
}

/// Score change per test between two sessions, matched by test name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreChange {
    pub test_name: String,
    pub previous: Option<u8>,
    pub latest: u8,
}

impl ScoreChange {
    pub fn delta(&self) -> Option<i16> {
        self.previous.map(|prev| self.latest as i16 - prev as i16)
    }
}

pub fn compare_sessions(
    previous: &SelfAssessmentSession,
    latest: &SelfAssessmentSession,
) -> Vec<ScoreChange> {
    latest
        .test_results
        .iter()
        .map(|result| ScoreChange {
            test_name: result.test_name.clone(),
            previous: previous
                .test_results
                .iter()
                .find(|old| old.test_name == result.test_name)
                .map(|old| score_result(old).score),
            latest: score_result(result).score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, time: f64, abrupt: f64) -> TestResult {
        TestResult {
            test_id: 0,
            test_name: name.to_string(),
            time_taken: time,
            abrupt_percentage: abrupt,
            risk_level: None,
        }
    }

    #[test]
    fn exactly_at_tolerances_scores_full() {
        let score = test_score(20.0, 30.0, "Timed Up and Go Test");
        assert_eq!(score.score, 100);
        assert_eq!(score.status, TestStatus::Healthy);
    }

    #[test]
    fn balance_test_caps_long_holds() {
        let score = test_score(45.0, 10.0, "4 Stage Balance Test");
        assert_eq!(score.abrupt_score, 100.0);
        assert_eq!(score.time_score, 100.0);
        assert_eq!(score.score, 100);
        assert_eq!(score.status, TestStatus::Healthy);
    }

    #[test]
    fn balance_test_rewards_longer_holds() {
        assert_eq!(test_score(0.0, 0.0, "4 Stage Balance Test").time_score, 0.0);
        assert_eq!(test_score(-3.0, 0.0, "4 Stage Balance Test").time_score, 0.0);
        // 20 / 40 -> 50, blended with a clean abrupt score: 35 + 30
        let half = test_score(20.0, 0.0, "4 Stage Balance Test");
        assert_eq!(half.time_score, 50.0);
        assert_eq!(half.score, 65);
        assert_eq!(half.status, TestStatus::Moderate);
    }

    #[test]
    fn slow_timed_tests_lose_points_linearly() {
        // 30s on a 25s tolerance is 20% over.
        let score = test_score(30.0, 0.0, "Five Times Sit to Stand Test");
        assert!((score.time_score - 80.0).abs() < 1e-9);
        assert_eq!(score.score, 86);
    }

    #[test]
    fn unknown_tests_use_default_tolerance() {
        let score = test_score(12.0, 50.0, "Chair Rise");
        assert_eq!(score.kind, TestKind::Other);
        assert_eq!(score.score, 100);
        let slow = test_score(18.0, 50.0, "Chair Rise");
        assert!((slow.time_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn score_stays_in_range_for_extreme_inputs() {
        for name in [
            "Timed Up and Go Test",
            "Five Times Sit to Stand Test",
            "Dynamic Gait Index (DGI)",
            "4 Stage Balance Test",
            "unknown",
        ] {
            for (time, abrupt) in [(1e9, 1e9), (f64::MAX, 100.0), (f64::NAN, 10.0), (0.0, -5.0)] {
                let score = test_score(time, abrupt, name);
                assert!(score.score <= 100, "{name} {time} {abrupt}");
            }
            let worst = test_score(1e9, 1e9, name);
            assert_eq!(worst.status, TestStatus::Unhealthy);
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let a = test_score(23.4, 33.3, "Dynamic Gait Index (DGI)");
        let b = test_score(23.4, 33.3, "Dynamic Gait Index (DGI)");
        assert_eq!(a, b);
    }

    #[test]
    fn status_boundaries() {
        assert_eq!(TestStatus::from_score(80), TestStatus::Healthy);
        assert_eq!(TestStatus::from_score(79), TestStatus::Moderate);
        assert_eq!(TestStatus::from_score(50), TestStatus::Moderate);
        assert_eq!(TestStatus::from_score(49), TestStatus::Unhealthy);
    }

    #[test]
    fn session_score_averages_tests() {
        let session = SelfAssessmentSession {
            session_id: 1,
            user_id: 1,
            session_date: "2025-01-01".to_string(),
            total_score: None,
            test_results: vec![
                result("Timed Up and Go Test", 10.0, 10.0),
                result("4 Stage Balance Test", 20.0, 0.0),
            ],
        };
        // 100 and 65
        assert_eq!(session_score(&session), Some(83));

        let empty = SelfAssessmentSession {
            test_results: Vec::new(),
            ..session
        };
        assert_eq!(session_score(&empty), None);
    }

    #[test]
    fn stored_sum_is_replaced_by_mean_of_tests() {
        // four tests at 65 each, stored as their sum
        let session = SelfAssessmentSession {
            session_id: 1,
            user_id: 1,
            session_date: "2025-01-01".to_string(),
            total_score: Some(260),
            test_results: vec![result("Timed Up and Go Test", 30.0, 0.0); 4],
        };
        assert_eq!(resolved_session_score(&session), Some(65));

        let stored_only = SelfAssessmentSession {
            total_score: Some(82),
            test_results: Vec::new(),
            ..session.clone()
        };
        assert_eq!(resolved_session_score(&stored_only), Some(82));

        let out_of_scale = SelfAssessmentSession {
            total_score: Some(260),
            test_results: Vec::new(),
            ..session
        };
        assert_eq!(resolved_session_score(&out_of_scale), None);
    }

    #[test]
    fn compare_matches_tests_by_name() {
        let previous = SelfAssessmentSession {
            session_id: 1,
            user_id: 1,
            session_date: "2025-01-01".to_string(),
            total_score: None,
            test_results: vec![result("Timed Up and Go Test", 30.0, 0.0)],
        };
        let latest = SelfAssessmentSession {
            session_id: 2,
            session_date: "2025-02-01".to_string(),
            test_results: vec![
                result("Timed Up and Go Test", 20.0, 0.0),
                result("4 Stage Balance Test", 40.0, 0.0),
            ],
            ..previous.clone()
        };
        let changes = compare_sessions(&previous, &latest);
        assert_eq!(changes[0].previous, Some(65));
        assert_eq!(changes[0].delta(), Some(35));
        assert_eq!(changes[1].previous, None);
        assert_eq!(changes[1].delta(), None);
    }
}
