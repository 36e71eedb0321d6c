use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Dated};
use crate::error::AnalyticsError;
use crate::models::{FesResponse, SelfAssessmentSession};
use crate::scoring;

pub const FES_MIN_TOTAL: f64 = 16.0;
pub const FES_SPAN: f64 = 64.0;

/// Fall-risk band. Ordered `Low < Moderate < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Moderate => "moderate",
            RiskBand::High => "high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskBand {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskBand::Low),
            "moderate" => Ok(RiskBand::Moderate),
            "high" => Ok(RiskBand::High),
            other => Err(AnalyticsError::malformed(other, "unknown risk level")),
        }
    }
}

/// Band boundaries on the 0-100 risk percentage scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds {
            moderate: 30.0,
            high: 60.0,
        }
    }
}

pub fn classify_risk(percentage: f64) -> RiskBand {
    classify_risk_with(percentage, &RiskThresholds::default())
}

/// `percentage` must be a number; `RiskAssessment::from_percentage` screens
/// out NaN before classifying.
pub fn classify_risk_with(percentage: f64, thresholds: &RiskThresholds) -> RiskBand {
    if percentage < thresholds.moderate {
        RiskBand::Low
    } else if percentage < thresholds.high {
        RiskBand::Moderate
    } else {
        RiskBand::High
    }
}

/// FES total (16-64) mapped onto a 0-100 risk percentage, clamped.
pub fn fes_risk_percentage(total_score: i64) -> f64 {
    (((total_score as f64 - FES_MIN_TOTAL) / FES_SPAN) * 100.0).clamp(0.0, 100.0)
}

/// Session composite (0-100, higher is healthier) as a risk percentage.
pub fn self_assessment_risk_percentage(session_score: i64) -> f64 {
    (100.0 - session_score as f64).clamp(0.0, 100.0)
}

/// A classification together with the percentage that produced it, or an
/// explicit marker that there was nothing to classify.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RiskAssessment {
    Assessed { band: RiskBand, percentage: f64 },
    NotAssessed,
}

impl RiskAssessment {
    /// NaN has nothing to classify and yields `NotAssessed`.
    pub fn from_percentage(percentage: f64, thresholds: &RiskThresholds) -> Self {
        if percentage.is_nan() {
            return RiskAssessment::NotAssessed;
        }
        RiskAssessment::Assessed {
            band: classify_risk_with(percentage, thresholds),
            percentage,
        }
    }

    pub fn band(&self) -> Option<RiskBand> {
        match self {
            RiskAssessment::Assessed { band, .. } => Some(*band),
            RiskAssessment::NotAssessed => None,
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        match self {
            RiskAssessment::Assessed { percentage, .. } => Some(*percentage),
            RiskAssessment::NotAssessed => None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.band().map_or("not assessed", |band| band.as_str())
    }
}

/// Risk from the most recent FES response in `responses`.
pub fn fes_risk(responses: &[FesResponse], thresholds: &RiskThresholds) -> RiskAssessment {
    match latest(responses) {
        Some(response) => {
            RiskAssessment::from_percentage(fes_risk_percentage(response.total_score), thresholds)
        }
        None => RiskAssessment::NotAssessed,
    }
}

/// Risk from the most recent session that carries a score, as resolved by
/// `scoring::resolved_session_score`.
pub fn self_assessment_risk(
    sessions: &[SelfAssessmentSession],
    thresholds: &RiskThresholds,
) -> RiskAssessment {
    let scored: Vec<(&SelfAssessmentSession, i64)> = sessions
        .iter()
        .filter_map(|session| scoring::resolved_session_score(session).map(|score| (session, score)))
        .collect();

    let newest = scored
        .iter()
        .fold(None::<&(&SelfAssessmentSession, i64)>, |best, candidate| match best {
            Some(best) if best.0.parsed_date() >= candidate.0.parsed_date() => Some(best),
            _ => Some(candidate),
        });

    match newest {
        Some((_, score)) => {
            RiskAssessment::from_percentage(self_assessment_risk_percentage(*score), thresholds)
        }
        None => RiskAssessment::NotAssessed,
    }
}

fn latest<T: Dated>(records: &[T]) -> Option<&T> {
    aggregate::latest_by_key(records, |_| ()).remove(&())
}

/// Overall risk from two independent sources: the more severe band wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallRisk {
    pub fes: RiskAssessment,
    pub self_assessment: RiskAssessment,
    pub overall: Option<RiskBand>,
}

pub fn combine_risk(a: Option<RiskBand>, b: Option<RiskBand>) -> Option<RiskBand> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (one, None) | (None, one) => one,
    }
}

pub fn overall_risk(fes: RiskAssessment, self_assessment: RiskAssessment) -> OverallRisk {
    OverallRisk {
        fes,
        self_assessment,
        overall: combine_risk(fes.band(), self_assessment.band()),
    }
}

/// Band for a single live test, from its abrupt-movement percentage.
pub fn abrupt_risk(abrupt_percentage: f64) -> RiskBand {
    if abrupt_percentage > 30.0 {
        RiskBand::High
    } else if abrupt_percentage > 15.0 {
        RiskBand::Moderate
    } else {
        RiskBand::Low
    }
}

/// Session-level band from its per-test bands: two or more high tests make
/// the session high, else two or more moderate make it moderate.
pub fn session_risk_level(bands: impl IntoIterator<Item = RiskBand>) -> Option<RiskBand> {
    let (mut low, mut moderate, mut high) = (0usize, 0usize, 0usize);
    for band in bands {
        match band {
            RiskBand::Low => low += 1,
            RiskBand::Moderate => moderate += 1,
            RiskBand::High => high += 1,
        }
    }
    if low + moderate + high == 0 {
        None
    } else if high >= 2 {
        Some(RiskBand::High)
    } else if moderate >= 2 {
        Some(RiskBand::Moderate)
    } else {
        Some(RiskBand::Low)
    }
}

/// Per-test bands of a session: the device-recorded level when present,
/// otherwise derived from the abrupt percentage.
pub fn session_test_bands(session: &SelfAssessmentSession) -> Vec<RiskBand> {
    session
        .test_results
        .iter()
        .map(|result| {
            result
                .recorded_band()
                .unwrap_or_else(|| abrupt_risk(result.abrupt_percentage))
        })
        .collect()
}

/// Most severe first; unassessed entries sort last.
pub fn severity_order(a: Option<RiskBand>, b: Option<RiskBand>) -> Ordering {
    b.cmp(&a)
}
