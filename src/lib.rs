//! Fall-risk analytics for elderly self-assessment and Falls Efficacy Scale
//! records: risk bands, test scores, muscle-group strength, monthly trends.

pub mod aggregate;
pub mod cohort;
pub mod config;
pub mod error;
pub mod models;
pub mod muscle;
pub mod period;
pub mod report;
pub mod risk;
pub mod scoring;
pub mod source;
pub mod trend;

pub use error::{AnalyticsError, Result};
