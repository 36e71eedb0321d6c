use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fallrisk_analytics::cohort::{self, AgeGroup};
use fallrisk_analytics::source::Snapshot;
use fallrisk_analytics::{aggregate, config, muscle, report, risk, scoring, trend};

#[derive(Parser)]
#[command(name = "fallrisk")]
#[command(about = "Fall risk analytics for elderly self-assessment and FES records", long_about = None)]
struct Cli {
    /// JSON file overriding the default thresholds
    #[arg(long, global = true, env = "FALLRISK_CONFIG")]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TrendSource {
    Fes,
    Sessions,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single physical test
    Score {
        #[arg(long)]
        test: String,
        #[arg(long)]
        time: f64,
        #[arg(long)]
        abrupt: f64,
    },
    /// Overall fall risk per user, most severe first
    Risk {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, default_value = "all")]
        age_group: String,
    },
    /// Monthly averages with a linear projection
    Trend {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, value_enum, default_value_t = TrendSource::Fes)]
        source: TrendSource,
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Muscle-group strength from a user's latest FES response
    Muscles {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        user: i64,
    },
    /// Latest vs previous session scores for one user
    Compare {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        user: i64,
    },
    /// Users ranked by days since their last assessment
    Reminders {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long, default_value = "all")]
        age_group: String,
        /// Only list users who are due
        #[arg(long)]
        due: bool,
    },
    /// Generate a markdown cohort report
    Report {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value = "all")]
        age_group: String,
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_age_group(value: &str) -> anyhow::Result<AgeGroup> {
    value
        .parse()
        .with_context(|| format!("invalid age group {value:?}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Score { test, time, abrupt } => {
            let score = scoring::test_score_with(
                time,
                abrupt,
                &test,
                &config.score_weights,
                &config.status_cutoffs,
            );
            println!(
                "{}: score {} ({}) [time {:.1}, abrupt {:.1}]",
                test, score.score, score.status, score.time_score, score.abrupt_score
            );
        }
        Commands::Risk {
            data,
            user,
            age_group,
        } => {
            let snapshot = Snapshot::load(&data)?;
            let group = parse_age_group(&age_group)?;
            let users: Vec<_> = cohort::filter_users(&snapshot.users, &group)
                .into_iter()
                .filter(|u| user.map_or(true, |id| u.user_id == id))
                .collect();
            let rows = cohort::risk_table(
                &users,
                &snapshot.fes_responses,
                &snapshot.sessions,
                &config.risk_thresholds,
            );

            if rows.is_empty() {
                println!("No users match this filter.");
                return Ok(());
            }

            for row in rows {
                let percent = |assessment: risk::RiskAssessment| {
                    assessment
                        .percentage()
                        .map_or_else(|| "-".to_string(), |p| format!("{p:.1}%"))
                };
                println!(
                    "- {} (user {}): {} [FES {} {}, self-assessment {} {}, latest session {}]",
                    row.name,
                    row.user_id,
                    row.risk.overall.map_or("not assessed", |b| b.as_str()),
                    row.risk.fes.label(),
                    percent(row.risk.fes),
                    row.risk.self_assessment.label(),
                    percent(row.risk.self_assessment),
                    row.session_level.map_or("-", |b| b.as_str()),
                );
            }
        }
        Commands::Trend {
            data,
            source,
            horizon,
        } => {
            let snapshot = Snapshot::load(&data)?;
            let series = match source {
                TrendSource::Fes => report::fes_monthly_series(&snapshot.fes_responses),
                TrendSource::Sessions => report::session_monthly_series(&snapshot.sessions),
            };
            for (month, average) in &series {
                println!("{month}: {average:.2}");
            }
            match trend::project(&series, horizon.unwrap_or(config.forecast_horizon)) {
                Ok(projection) => {
                    println!(
                        "slope {:.3}, intercept {:.3}",
                        projection.fit.slope, projection.fit.intercept
                    );
                    for point in projection.forecast {
                        println!("{} (projected): {:.2}", point.month, point.value);
                    }
                }
                Err(err) => warn!(error = %err, "skipping projection"),
            }
        }
        Commands::Muscles { data, user } => {
            let snapshot = Snapshot::load(&data)?;
            let responses = snapshot.fes_for(user);
            let latest = aggregate::latest_by_key(&responses, |r| r.user_id);
            let Some(response) = latest.get(&user) else {
                println!("User {user} has no FES responses.");
                return Ok(());
            };
            let strengths = muscle::muscle_strengths_with(response, config.muscle_weak_above);
            for group in muscle::MuscleGroup::ALL {
                if let Some(strength) = strengths.get(&group) {
                    println!(
                        "{}: {:.2} {:?}{}",
                        group,
                        strength.average_score,
                        strength.label,
                        if strength.missing > 0 {
                            format!(" ({} unanswered)", strength.missing)
                        } else {
                            String::new()
                        }
                    );
                }
            }
        }
        Commands::Compare { data, user } => {
            let snapshot = Snapshot::load(&data)?;
            let sessions = snapshot.sessions_for(user);
            let ordered = aggregate::chronological(&sessions);
            let [.., previous, latest] = ordered.as_slice() else {
                println!("User {user} needs at least two sessions to compare.");
                return Ok(());
            };
            for change in scoring::compare_sessions(previous, latest) {
                let delta = change
                    .delta()
                    .map_or_else(|| "new".to_string(), |d| format!("{d:+}"));
                println!("{}: {} ({})", change.test_name, change.latest, delta);
            }

            let responses = snapshot.fes_for(user);
            let fes_ordered = aggregate::chronological(&responses);
            if let [.., previous, latest] = fes_ordered.as_slice() {
                println!(
                    "FES risk: {:.1}% -> {:.1}%",
                    risk::fes_risk_percentage(previous.total_score),
                    risk::fes_risk_percentage(latest.total_score)
                );
            }
        }
        Commands::Reminders {
            data,
            today,
            age_group,
            due,
        } => {
            let snapshot = Snapshot::load(&data)?;
            let group = parse_age_group(&age_group)?;
            let users = cohort::filter_users(&snapshot.users, &group);
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let rows = cohort::reminder_table(
                &users,
                &snapshot.fes_responses,
                &snapshot.sessions,
                today,
                config.reminder_after_days,
            );
            let fmt_days = |days: Option<i64>| days.map_or_else(|| "never".to_string(), |d| d.to_string());

            for row in rows.iter().filter(|row| !due || row.due) {
                println!(
                    "- {} ({}): FES {}, self-assessment {}{}",
                    row.name,
                    row.email,
                    fmt_days(row.days_since_fes),
                    fmt_days(row.days_since_assessment),
                    if row.due { " [due]" } else { "" }
                );
            }
        }
        Commands::Report {
            data,
            age_group,
            today,
            out,
        } => {
            let snapshot = Snapshot::load(&data)?;
            let group = parse_age_group(&age_group)?;
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let label = (group != AgeGroup::All).then_some(age_group.as_str());
            let report = report::build_report(&snapshot, &group, label, today, &config);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
