use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate;
use crate::cohort::{self, AgeGroup, ReminderRow, UserRiskRow};
use crate::config::AnalyticsConfig;
use crate::models::{FesResponse, SelfAssessmentSession};
use crate::period::MonthBucket;
use crate::risk::RiskBand;
use crate::scoring;
use crate::source::Snapshot;
use crate::trend;

/// Headcount per overall band; `None` counts users with no assessment.
pub fn summarize_by_band(rows: &[UserRiskRow]) -> BTreeMap<Option<RiskBand>, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.risk.overall).or_insert(0) += 1;
    }
    counts
}

pub fn fes_monthly_series(responses: &[FesResponse]) -> Vec<(MonthBucket, f64)> {
    aggregate::monthly_averages(responses, |r| Some(r.total_score as f64))
}

pub fn session_monthly_series(
    sessions: &[SelfAssessmentSession],
) -> Vec<(MonthBucket, f64)> {
    aggregate::monthly_averages(sessions, |s| {
        scoring::resolved_session_score(s).map(|score| score as f64)
    })
}

fn write_trend(output: &mut String, title: &str, series: &[(MonthBucket, f64)], horizon: usize) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");

    if series.is_empty() {
        let _ = writeln!(output, "No data recorded for this cohort.");
        return;
    }

    for (month, average) in series {
        let _ = writeln!(output, "- {month}: {average:.2}");
    }

    match trend::project(series, horizon) {
        Ok(projection) => {
            let _ = writeln!(
                output,
                "Trend: {:+.2} per month. Projection:",
                projection.fit.slope
            );
            for point in &projection.forecast {
                let _ = writeln!(output, "- {} (projected): {:.2}", point.month, point.value);
            }
        }
        Err(err) => {
            let _ = writeln!(output, "No projection: {err}.");
        }
    }
}

fn format_gap(days: Option<i64>) -> String {
    days.map_or_else(|| "never".to_string(), |d| format!("{d} days ago"))
}

pub fn build_report(
    snapshot: &Snapshot,
    age_group: &AgeGroup,
    label: Option<&str>,
    today: NaiveDate,
    config: &AnalyticsConfig,
) -> String {
    let users = cohort::filter_users(&snapshot.users, age_group);
    let ids: Vec<i64> = users.iter().map(|u| u.user_id).collect();
    let responses: Vec<FesResponse> = snapshot
        .fes_responses
        .iter()
        .filter(|r| ids.contains(&r.user_id))
        .cloned()
        .collect();
    let sessions: Vec<SelfAssessmentSession> = snapshot
        .sessions
        .iter()
        .filter(|s| ids.contains(&s.user_id))
        .cloned()
        .collect();
    let timings: Vec<_> = snapshot
        .test_times
        .iter()
        .filter(|t| ids.contains(&t.user_id))
        .cloned()
        .collect();

    let risk_rows = cohort::risk_table(&users, &responses, &sessions, &config.risk_thresholds);
    let reminders: Vec<ReminderRow> = cohort::reminder_table(
        &users,
        &responses,
        &sessions,
        today,
        config.reminder_after_days,
    )
    .into_iter()
    .filter(|row| row.due)
    .collect();

    let mut output = String::new();
    let cohort_label = label.unwrap_or("all elderly users");

    let _ = writeln!(output, "# Fall Risk Cohort Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} users) on {}",
        cohort_label,
        users.len(),
        today
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if risk_rows.is_empty() {
        let _ = writeln!(output, "No users in this cohort.");
    } else {
        for (band, count) in summarize_by_band(&risk_rows).iter().rev() {
            let name = band.map_or("not assessed", |b| b.as_str());
            let _ = writeln!(output, "- {name}: {count} users");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Users");

    let assessed: Vec<&UserRiskRow> = risk_rows.iter().filter(|r| r.risk.overall.is_some()).collect();
    if assessed.is_empty() {
        let _ = writeln!(output, "No assessed users in this cohort.");
    } else {
        for row in assessed.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) overall {} (FES {}, self-assessment {})",
                row.name,
                row.email,
                row.risk.overall.map_or("not assessed", |b| b.as_str()),
                row.risk.fes.label(),
                row.risk.self_assessment.label(),
            );
        }
    }

    write_trend(
        &mut output,
        "Monthly FES Total",
        &fes_monthly_series(&responses),
        config.forecast_horizon,
    );
    write_trend(
        &mut output,
        "Monthly Self-Assessment Score",
        &session_monthly_series(&sessions),
        config.forecast_horizon,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Average Time per Test");
    let averages = aggregate::average_time_by_test(&timings);
    if averages.is_empty() {
        let _ = writeln!(output, "No timed tests recorded.");
    } else {
        for (name, seconds) in averages {
            let _ = writeln!(output, "- {name}: {seconds:.2}s");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Average Score per FES Question");
    let question_averages = aggregate::average_question_scores(&responses);
    if question_averages.iter().all(Option::is_none) {
        let _ = writeln!(output, "No question-level answers recorded.");
    } else {
        for (index, average) in question_averages.iter().enumerate() {
            if let Some(average) = average {
                let _ = writeln!(output, "- Q{}: {:.2}", index + 1, average);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reminders Due");
    if reminders.is_empty() {
        let _ = writeln!(output, "Everyone is up to date.");
    } else {
        for row in &reminders {
            let _ = writeln!(
                output,
                "- {} ({}): FES {}, self-assessment {}",
                row.name,
                row.email,
                format_gap(row.days_since_fes),
                format_gap(row.days_since_assessment),
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElderlyUser;

    fn snapshot() -> Snapshot {
        let user = |user_id: i64, age: &str| ElderlyUser {
            user_id,
            name: format!("User {user_id}"),
            email: format!("user{user_id}@example.com"),
            age: age.to_string(),
        };
        let fes = |response_id: i64, user_id: i64, date: &str, total: i64| FesResponse {
            response_id,
            user_id,
            response_date: date.to_string(),
            total_score: total,
            response_details: Vec::new(),
        };
        Snapshot {
            users: vec![user(1, "65"), user(2, "82")],
            fes_responses: vec![
                fes(1, 1, "2025-01-10T00:00:00Z", 20),
                fes(2, 1, "2025-02-10T00:00:00Z", 24),
                fes(3, 2, "2025-02-12T00:00:00Z", 60),
            ],
            sessions: Vec::new(),
            test_times: Vec::new(),
        }
    }

    #[test]
    fn report_lists_risk_trend_and_reminders() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let report = build_report(
            &snapshot(),
            &AgeGroup::All,
            None,
            today,
            &AnalyticsConfig::default(),
        );

        assert!(report.contains("# Fall Risk Cohort Report"));
        assert!(report.contains("- high: 1 users"));
        assert!(report.contains("- 01-2025: 20.00"));
        assert!(report.contains("- 02-2025: 42.00"));
        assert!(report.contains("- 08-2025 (projected)"));
        assert!(report.contains("No data recorded for this cohort."));
        assert!(report.contains("No question-level answers recorded."));
        // Nobody has a completed self-assessment session.
        assert!(report.contains("User 1 (user1@example.com): FES 19 days ago, self-assessment never"));
    }

    #[test]
    fn age_filter_narrows_the_cohort() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let report = build_report(
            &snapshot(),
            &"60-69".parse().unwrap(),
            Some("60-69"),
            today,
            &AnalyticsConfig::default(),
        );
        assert!(report.contains("Generated for 60-69 (1 users)"));
        assert!(!report.contains("User 2"));
        assert!(report.contains("- 02-2025: 24.00"));

        let eighties = build_report(
            &snapshot(),
            &"80-89".parse().unwrap(),
            Some("80-89"),
            today,
            &AnalyticsConfig::default(),
        );
        assert!(eighties.contains("No projection: insufficient data"));
    }
}
