use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("insufficient data: need at least {needed} {what}, found {found}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("malformed record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalyticsError {
    pub fn insufficient(what: &'static str, needed: usize, found: usize) -> Self {
        AnalyticsError::InsufficientData {
            what,
            needed,
            found,
        }
    }

    pub fn malformed(record: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalyticsError::MalformedRecord {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
