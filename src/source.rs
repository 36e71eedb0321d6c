//! Loading record snapshots exported from the backend services.
//!
//! A data directory holds `users.json` (or `users.csv`),
//! `fes_responses.json`, `sessions.json` and optionally `test_times.csv`.
//! Any file may be missing; its records are then empty.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{ElderlyUser, FesResponse, SelfAssessmentSession, TestTiming};

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub users: Vec<ElderlyUser>,
    pub fes_responses: Vec<FesResponse>,
    pub sessions: Vec<SelfAssessmentSession>,
    pub test_times: Vec<TestTiming>,
}

impl Snapshot {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let users = match first_existing(dir, &["users.json", "users.csv"]) {
            Some(path) => load_records(&path)?,
            None => Vec::new(),
        };
        let fes_responses = load_optional(&dir.join("fes_responses.json"))?;
        let sessions = load_optional(&dir.join("sessions.json"))?;
        let mut test_times: Vec<TestTiming> = load_optional(&dir.join("test_times.csv"))?;

        // Without an explicit timing export, flatten the sessions.
        if test_times.is_empty() {
            test_times = flatten_timings(&sessions);
        }

        debug!(
            users = users.len(),
            fes_responses = fes_responses.len(),
            sessions = sessions.len(),
            test_times = test_times.len(),
            "snapshot loaded"
        );

        Ok(Snapshot {
            users,
            fes_responses,
            sessions,
            test_times,
        })
    }

    pub fn user(&self, user_id: i64) -> Option<&ElderlyUser> {
        self.users.iter().find(|user| user.user_id == user_id)
    }

    pub fn fes_for(&self, user_id: i64) -> Vec<FesResponse> {
        self.fes_responses
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn sessions_for(&self, user_id: i64) -> Vec<SelfAssessmentSession> {
        self.sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|name| dir.join(name)).find(|path| path.exists())
}

fn load_optional<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if path.exists() {
        load_records(path)
    } else {
        debug!(path = %path.display(), "no export found, using empty set");
        Ok(Vec::new())
    }
}

/// Reads a JSON array or a CSV file with a header row, by extension.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => load_csv(path),
        _ => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))
        }
    }
}

/// Malformed CSV rows are skipped rather than failing the whole import.
fn load_csv<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(err) => warn!(path = %path.display(), row = index + 1, error = %err, "skipping malformed row"),
        }
    }

    Ok(records)
}

pub fn flatten_timings(sessions: &[SelfAssessmentSession]) -> Vec<TestTiming> {
    sessions
        .iter()
        .flat_map(|session| {
            session.test_results.iter().map(move |result| TestTiming {
                user_id: session.user_id,
                test_name: result.test_name.clone(),
                time_taken: result.time_taken,
                session_date: session.session_date.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_and_csv_exports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("users.csv"),
            "user_id,name,email,age\n1,Alice Tan,alice@example.com,61\nbad,row,,\n2,Ben Ong,ben@example.com,74\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("sessions.json"),
            r#"[{
                "session_id": 1,
                "user_id": 1,
                "session_date": "2025-01-20T10:00:00Z",
                "total_score": {"Int64": 90, "Valid": true},
                "test_results": [
                    {"test_id": 1, "test_name": "Timed Up and Go Test", "time_taken": 11.5, "abrupt_percentage": 12}
                ]
            }]"#,
        )
        .unwrap();

        let snapshot = Snapshot::load(dir.path()).unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.user(2).map(|u| u.name.as_str()), Some("Ben Ong"));
        assert!(snapshot.fes_responses.is_empty());
        assert_eq!(snapshot.sessions[0].total_score, Some(90));
        assert_eq!(snapshot.test_times.len(), 1);
        assert_eq!(snapshot.test_times[0].time_taken, 11.5);
    }

    #[test]
    fn broken_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fes_responses.json"), "[{").unwrap();
        assert!(Snapshot::load(dir.path()).is_err());
    }

    #[test]
    fn empty_directory_loads_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::load(dir.path()).unwrap();
        assert!(snapshot.users.is_empty());
        assert!(snapshot.sessions.is_empty());
    }
}
