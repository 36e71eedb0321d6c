//! Cohort views for the admin dashboard: age filtering, per-user risk
//! rows ranked by severity, and reminder rows ranked by inactivity.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{self, Dated};
use crate::error::AnalyticsError;
use crate::models::{ElderlyUser, FesResponse, SelfAssessmentSession};
use crate::risk::{self, OverallRisk, RiskBand, RiskThresholds};

/// Age filter from the dashboard selector: `all`, `60-69` or `90+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGroup {
    All,
    Range { min: u32, max: u32 },
    AtLeast(u32),
}

impl AgeGroup {
    pub fn contains(&self, user: &ElderlyUser) -> bool {
        match (self, user.age_years()) {
            (AgeGroup::All, _) => true,
            (AgeGroup::Range { min, max }, Some(age)) => (*min..=*max).contains(&age),
            (AgeGroup::AtLeast(min), Some(age)) => age >= *min,
            (_, None) => false,
        }
    }
}

impl FromStr for AgeGroup {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let malformed = || AnalyticsError::malformed(value, "expected all, MIN-MAX or MIN+");
        if value.eq_ignore_ascii_case("all") {
            return Ok(AgeGroup::All);
        }
        if let Some(min) = value.strip_suffix('+') {
            return min.parse().map(AgeGroup::AtLeast).map_err(|_| malformed());
        }
        let (min, max) = value.split_once('-').ok_or_else(malformed)?;
        let min: u32 = min.trim().parse().map_err(|_| malformed())?;
        let max: u32 = max.trim().parse().map_err(|_| malformed())?;
        if min > max {
            return Err(malformed());
        }
        Ok(AgeGroup::Range { min, max })
    }
}

pub fn filter_users<'a>(users: &'a [ElderlyUser], group: &AgeGroup) -> Vec<&'a ElderlyUser> {
    users.iter().filter(|user| group.contains(user)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRiskRow {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub risk: OverallRisk,
    /// Level of the latest session derived from its individual tests.
    pub session_level: Option<RiskBand>,
}

/// Overall risk for each user, most severe first, ties by user id.
pub fn risk_table(
    users: &[&ElderlyUser],
    responses: &[FesResponse],
    sessions: &[SelfAssessmentSession],
    thresholds: &RiskThresholds,
) -> Vec<UserRiskRow> {
    let fes_by_user = group_by_user(responses, |r| r.user_id);
    let sessions_by_user = group_by_user(sessions, |s| s.user_id);

    let mut rows: Vec<UserRiskRow> = users
        .iter()
        .map(|user| {
            let fes: Vec<FesResponse> = fes_by_user
                .get(&user.user_id)
                .map(|list| list.iter().map(|r| (*r).clone()).collect())
                .unwrap_or_default();
            let own_sessions: Vec<SelfAssessmentSession> = sessions_by_user
                .get(&user.user_id)
                .map(|list| list.iter().map(|s| (*s).clone()).collect())
                .unwrap_or_default();

            let session_level = aggregate::latest_by_key(&own_sessions, |_| ())
                .get(&())
                .and_then(|latest| risk::session_risk_level(risk::session_test_bands(latest)));

            UserRiskRow {
                user_id: user.user_id,
                name: user.name.clone(),
                email: user.email.clone(),
                risk: risk::overall_risk(
                    risk::fes_risk(&fes, thresholds),
                    risk::self_assessment_risk(&own_sessions, thresholds),
                ),
                session_level,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        risk::severity_order(a.risk.overall, b.risk.overall).then(a.user_id.cmp(&b.user_id))
    });
    rows
}

fn group_by_user<T, F>(records: &[T], user_of: F) -> HashMap<i64, Vec<&T>>
where
    F: Fn(&T) -> i64,
{
    let mut grouped: HashMap<i64, Vec<&T>> = HashMap::new();
    for record in records {
        grouped.entry(user_of(record)).or_default().push(record);
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderRow {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    /// Days since the latest FES response; `None` if never completed.
    pub days_since_fes: Option<i64>,
    /// Days since the latest self-assessment session; `None` if never completed.
    pub days_since_assessment: Option<i64>,
    pub due: bool,
}

impl ReminderRow {
    pub fn longest_gap(&self) -> i64 {
        self.days_since_fes
            .unwrap_or(0)
            .max(self.days_since_assessment.unwrap_or(0))
    }
}

/// Inactivity per user relative to `today`, longest gap first. A user is
/// due once either gap reaches `after_days` or either assessment was never
/// taken. Sessions without a score are incomplete and ignored.
pub fn reminder_table(
    users: &[&ElderlyUser],
    responses: &[FesResponse],
    sessions: &[SelfAssessmentSession],
    today: NaiveDate,
    after_days: i64,
) -> Vec<ReminderRow> {
    let completed: Vec<SelfAssessmentSession> = sessions
        .iter()
        .filter(|s| s.total_score.is_some())
        .cloned()
        .collect();
    let last_fes = latest_dates(responses, |r| r.user_id);
    let last_session = latest_dates(&completed, |s| s.user_id);

    let mut rows: Vec<ReminderRow> = users
        .iter()
        .map(|user| {
            let days_since = |dates: &HashMap<i64, NaiveDate>| {
                dates
                    .get(&user.user_id)
                    .map(|date| (today - *date).num_days().max(0))
            };
            let days_since_fes = days_since(&last_fes);
            let days_since_assessment = days_since(&last_session);
            let overdue = |gap: Option<i64>| gap.map_or(true, |days| days >= after_days);

            ReminderRow {
                user_id: user.user_id,
                name: user.name.clone(),
                email: user.email.clone(),
                days_since_fes,
                days_since_assessment,
                due: overdue(days_since_fes) || overdue(days_since_assessment),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.longest_gap()
            .cmp(&a.longest_gap())
            .then(a.user_id.cmp(&b.user_id))
    });
    rows
}

fn latest_dates<T: Dated, F>(records: &[T], user_of: F) -> HashMap<i64, NaiveDate>
where
    F: Fn(&T) -> i64,
{
    aggregate::latest_by_key(records, user_of)
        .into_iter()
        .filter_map(|(user, record)| record.parsed_date().map(|stamp| (user, stamp.date())))
        .collect()
}
