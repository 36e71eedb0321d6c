//! Grouping and reduction over dated records.
//!
//! Records with an unparseable date never abort an aggregation: they rank
//! below every valid date when picking the latest record, and they are
//! skipped (with a warning) when bucketing by month.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

use crate::models::{FesResponse, SelfAssessmentSession, TestTiming};
use crate::period::{self, MonthBucket};

/// A record carrying a raw service timestamp.
pub trait Dated {
    fn raw_date(&self) -> &str;

    fn parsed_date(&self) -> Option<NaiveDateTime> {
        period::parse_timestamp(self.raw_date())
    }

    fn month(&self) -> Option<MonthBucket> {
        period::month_key(self.raw_date())
    }
}

impl Dated for FesResponse {
    fn raw_date(&self) -> &str {
        &self.response_date
    }
}

impl Dated for SelfAssessmentSession {
    fn raw_date(&self) -> &str {
        &self.session_date
    }
}

impl Dated for TestTiming {
    fn raw_date(&self) -> &str {
        &self.session_date
    }
}

/// Running sum and count for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub sum: f64,
    pub count: usize,
}

impl Totals {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// `None` for an empty bucket instead of a NaN.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// The most recent record per key. Unparseable dates lose to any valid
/// date; among equal dates the first record seen wins.
pub fn latest_by_key<'a, T, K, F>(records: &'a [T], key: F) -> HashMap<K, &'a T>
where
    T: Dated,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut latest: HashMap<K, (&'a T, Option<NaiveDateTime>)> = HashMap::new();

    for record in records {
        let date = record.parsed_date();
        match latest.entry(key(record)) {
            Entry::Vacant(slot) => {
                slot.insert((record, date));
            }
            Entry::Occupied(mut slot) => {
                // Option orders None below Some, which is the policy we want.
                if date > slot.get().1 {
                    slot.insert((record, date));
                }
            }
        }
    }

    latest
        .into_iter()
        .map(|(key, (record, _))| (key, record))
        .collect()
}

/// Records of one subject sorted oldest first; undated records lead.
pub fn chronological<'a, T: Dated + 'a>(records: impl IntoIterator<Item = &'a T>) -> Vec<&'a T> {
    let mut ordered: Vec<(&T, Option<NaiveDateTime>)> = records
        .into_iter()
        .map(|record| (record, record.parsed_date()))
        .collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1));
    ordered.into_iter().map(|(record, _)| record).collect()
}

/// Per-key running totals of `value(record)`; records whose value is
/// `None` are ignored.
pub fn totals_by_key<T, K, FK, FV>(records: &[T], key: FK, value: FV) -> BTreeMap<K, Totals>
where
    K: Ord,
    FK: Fn(&T) -> Option<K>,
    FV: Fn(&T) -> Option<f64>,
{
    let mut totals: BTreeMap<K, Totals> = BTreeMap::new();
    for record in records {
        let (Some(key), Some(value)) = (key(record), value(record)) else {
            continue;
        };
        if value.is_finite() {
            totals.entry(key).or_default().add(value);
        }
    }
    totals
}

/// Monthly totals of `value(record)`, keyed chronologically.
pub fn monthly_totals<T, F>(records: &[T], value: F) -> BTreeMap<MonthBucket, Totals>
where
    T: Dated,
    F: Fn(&T) -> Option<f64>,
{
    totals_by_key(
        records,
        |record| {
            let month = record.month();
            if month.is_none() {
                warn!(date = record.raw_date(), "skipping record with unparseable date");
            }
            month
        },
        value,
    )
}

/// Monthly averages in chronological order, empty buckets dropped.
pub fn monthly_averages<T, F>(records: &[T], value: F) -> Vec<(MonthBucket, f64)>
where
    T: Dated,
    F: Fn(&T) -> Option<f64>,
{
    monthly_totals(records, value)
        .into_iter()
        .filter_map(|(month, totals)| totals.average().map(|avg| (month, avg)))
        .collect()
}

/// Mean time taken per test name, sorted by name.
pub fn average_time_by_test(timings: &[TestTiming]) -> Vec<(String, f64)> {
    totals_by_key(
        timings,
        |timing| Some(timing.test_name.clone()),
        |timing| (timing.time_taken >= 0.0).then_some(timing.time_taken),
    )
    .into_iter()
    .filter_map(|(name, totals)| totals.average().map(|avg| (name, avg)))
    .collect()
}

/// Mean score per FES question id (1..=16) across many responses.
/// Questions nobody answered average to `None`.
pub fn average_question_scores(responses: &[FesResponse]) -> [Option<f64>; 16] {
    let mut totals = [Totals::default(); 16];
    for detail in responses.iter().flat_map(|r| r.response_details.iter()) {
        match detail.question_id {
            id @ 1..=16 => totals[id as usize - 1].add(detail.response_score as f64),
            other => warn!(
                response_id = detail.response_id,
                question_id = other,
                "skipping answer to unknown question"
            ),
        }
    }
    totals.map(|t| t.average())
}
