use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::config::RetentionPolicy;
use crate::models::{
    parse_loose_date, DailySnapshot, FunnelCounters, History, WeeklySnapshot, WEEK_KEY_FORMAT,
};
use crate::storage::{self, StorageError};

pub fn should_snapshot_weekly(date: NaiveDate, weekly_day: Weekday) -> bool {
    date.weekday() == weekly_day
}

/// Monday of `date`'s ISO week as `DD/MM/YYYY`.
pub fn week_key_for(date: NaiveDate) -> String {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    monday.format(WEEK_KEY_FORMAT).to_string()
}

fn weekly_date(entry: &WeeklySnapshot) -> Option<NaiveDate> {
    entry.date.or_else(|| parse_loose_date(&entry.week))
}

/// Missing or unreadable history starts a fresh one. Single bad entries
/// are dropped while reading and do not discard the rest of the file.
pub fn load_history(path: &Path) -> History {
    match storage::read_json::<History>(path) {
        Ok(history) => history,
        Err(err) if err.is_not_found() => {
            tracing::info!(path = %path.display(), "No history file yet, starting empty");
            History::default()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Unreadable history file, starting empty");
            History::default()
        }
    }
}

pub fn save_history(path: &Path, history: &History) -> Result<(), StorageError> {
    storage::write_json_atomic(path, history)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub daily_entries: usize,
    pub weekly_entries: usize,
    pub weekly_key: Option<String>,
}

/// Prune both tracks relative to `today` and record this run.
///
/// A second run on the same date replaces that date's daily entry, and a
/// second weekly run in the same week replaces that week's entry.
pub fn record_run(
    history: &mut History,
    today: NaiveDate,
    funnel: FunnelCounters,
    total_contacts: u64,
    policy: &RetentionPolicy,
) -> RecordOutcome {
    let daily_cutoff = today - Duration::days(policy.daily_days);
    history.daily.retain(|entry| entry.date >= daily_cutoff && entry.date != today);
    history.daily.push(DailySnapshot {
        date: today,
        funnel,
        total_contacts,
    });

    let weekly_cutoff = today - Duration::days(policy.weekly_days);
    history.weekly.retain(|entry| match weekly_date(entry) {
        Some(date) => date >= weekly_cutoff,
        None => {
            tracing::warn!(week = %entry.week, "Dropping weekly entry with unparseable date");
            false
        }
    });

    let weekly_key = if should_snapshot_weekly(today, policy.weekly_day) {
        let key = week_key_for(today);
        history.weekly.retain(|entry| entry.week != key);
        history.weekly.push(WeeklySnapshot {
            week: key.clone(),
            date: Some(today),
            funnel,
            total_contacts,
        });
        tracing::info!(week = %key, "Weekly snapshot recorded");
        Some(key)
    } else {
        None
    };

    RecordOutcome {
        daily_entries: history.daily.len(),
        weekly_entries: history.weekly.len(),
        weekly_key,
    }
}
