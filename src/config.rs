use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnalyticsError;
use crate::muscle;
use crate::risk::RiskThresholds;
use crate::scoring::{ScoreWeights, StatusCutoffs};
use crate::trend;

/// Tunable thresholds. Every field defaults to the values the dashboard
/// has always used, so an empty `{}` file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub risk_thresholds: RiskThresholds,
    pub forecast_horizon: usize,
    pub muscle_weak_above: f64,
    pub reminder_after_days: i64,
    pub score_weights: ScoreWeights,
    pub status_cutoffs: StatusCutoffs,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            risk_thresholds: RiskThresholds::default(),
            forecast_horizon: trend::DEFAULT_HORIZON,
            muscle_weak_above: muscle::WEAK_ABOVE,
            reminder_after_days: 30,
            score_weights: ScoreWeights::default(),
            status_cutoffs: StatusCutoffs::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let invalid = |reason: String| Err(AnalyticsError::InvalidConfig(reason));
        let RiskThresholds { moderate, high } = self.risk_thresholds;
        if !(0.0..=100.0).contains(&moderate) || !(0.0..=100.0).contains(&high) || moderate >= high {
            return invalid(format!(
                "risk thresholds must satisfy 0 <= moderate < high <= 100, got {moderate} and {high}"
            ));
        }
        if self.forecast_horizon == 0 {
            return invalid("forecast_horizon must be positive".to_string());
        }
        if self.reminder_after_days < 0 {
            return invalid("reminder_after_days must not be negative".to_string());
        }
        let ScoreWeights { time, abrupt } = self.score_weights;
        if time < 0.0 || abrupt < 0.0 || ((time + abrupt) - 1.0).abs() > 1e-6 {
            return invalid(format!("score weights must be non-negative and sum to 1, got {time} + {abrupt}"));
        }
        if self.status_cutoffs.moderate > self.status_cutoffs.healthy {
            return invalid("moderate status cutoff is above the healthy cutoff".to_string());
        }
        Ok(())
    }
}

/// Loads and validates a JSON config; `None` yields the defaults.
pub fn load(path: Option<&Path>) -> anyhow::Result<AnalyticsConfig> {
    let config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            let config: AnalyticsConfig = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse config at {}", path.display()))?;
            info!(path = %path.display(), "loaded config");
            config
        }
        None => AnalyticsConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast_horizon, 6);
        assert_eq!(config.risk_thresholds.moderate, 30.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"forecast_horizon": 3, "risk_thresholds": {{"moderate": 25, "high": 55}}}}"#)
            .unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.forecast_horizon, 3);
        assert_eq!(config.risk_thresholds.high, 55.0);
        assert_eq!(config.reminder_after_days, 30);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = AnalyticsConfig {
            risk_thresholds: RiskThresholds {
                moderate: 70.0,
                high: 40.0,
            },
            ..AnalyticsConfig::default()
        };
        assert!(matches!(config.validate(), Err(AnalyticsError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let config = AnalyticsConfig {
            score_weights: ScoreWeights {
                time: 0.5,
                abrupt: 0.2,
            },
            ..AnalyticsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/fallrisk.json"))).is_err());
    }
}
