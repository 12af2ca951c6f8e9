//! Habit reminder runner.
//!
//! # Responsibility
//! - Load tracker configuration, layering flags and `HABIT_*` variables
//!   over the optional JSON file.
//! - Open the configured database and run one pass of a reminder job.

use chrono::Utc;
use clap::{Parser, ValueEnum};
use habit_core::db::{open_db, open_db_in_memory};
use habit_core::{
    init_logging_from_config, ConfigOverrides, LogMessenger, ReminderJobs, ReminderReport,
    SqliteHabitLogRepository, SqliteHabitRepository, SqliteUserRepository, TrackerConfig,
};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Job {
    /// Remind about habits scheduled for the current minute.
    Reminders,
    /// Notify about useful habits not completed today.
    Completion,
    /// Send each owner their completion ratio for today.
    Summary,
    /// Run all three jobs in order.
    All,
}

#[derive(Debug, Parser)]
#[command(name = "habit_cli")]
#[command(about = "Runs one pass of the habit tracker reminder jobs")]
struct Cli {
    /// Job to run
    #[arg(value_enum, default_value_t = Job::Reminders)]
    job: Job,

    /// Path to a JSON configuration file
    #[arg(short, long, env = "HABIT_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (in-memory when unset)
    #[arg(long, env = "HABIT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "HABIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, env = "HABIT_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Chat for owners who have not linked one
    #[arg(long, env = "HABIT_DEFAULT_CHAT_ID")]
    default_chat_id: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db_path.clone(),
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            default_chat_id: self.default_chat_id.clone(),
        }
    }

    fn load_config(&self) -> Result<TrackerConfig, Box<dyn Error>> {
        let config = TrackerConfig::load(self.config.as_deref())?;
        Ok(config.merge(self.overrides()))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) => {
            println!(
                "sent={} skipped={} failed={}",
                report.sent, report.skipped, report.failed
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=job_run module=cli status=error error={err}");
            eprintln!("habit_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ReminderReport, Box<dyn Error>> {
    let config = cli.load_config()?;
    init_logging_from_config(&config)?;

    let conn = match config.db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let habits = SqliteHabitRepository::try_new(&conn)?;
    let logs = SqliteHabitLogRepository::try_new(&conn)?;
    let users = SqliteUserRepository::try_new(&conn)?;
    let jobs = ReminderJobs::new(&habits, &logs, &users, LogMessenger)
        .with_default_chat_id(config.default_chat_id.clone());

    let now = Utc::now();
    info!("event=job_run module=cli status=start job={:?}", cli.job);
    let report = match cli.job {
        Job::Reminders => jobs.send_habit_reminders(now)?,
        Job::Completion => jobs.check_habit_completion(now)?,
        Job::Summary => jobs.send_daily_summary(now)?,
        Job::All => {
            let mut total = ReminderReport::default();
            for report in [
                jobs.send_habit_reminders(now)?,
                jobs.check_habit_completion(now)?,
                jobs.send_daily_summary(now)?,
            ] {
                total.sent += report.sent;
                total.skipped += report.skipped;
                total.failed += report.failed;
            }
            total
        }
    };
    Ok(report)
}
