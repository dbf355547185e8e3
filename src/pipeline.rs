use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::aggregate::aggregate;
use crate::config::{ListIds, RetentionPolicy};
use crate::crm::{fetch_all_contacts, ContactSource};
use crate::error::PipelineError;
use crate::history::{self, RecordOutcome};
use crate::models::FunnelCounters;
use crate::scrub::{scrub, ScrubbedContact};
use crate::snapshot::{self, Snapshot, SnapshotCache};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub history_path: PathBuf,
    pub page_size: usize,
    pub page_delay: Duration,
    pub lists: ListIds,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The CRM returned no contacts; nothing was written.
    Skipped,
    Published {
        total_contacts: u64,
        funnel: FunnelCounters,
        history: RecordOutcome,
    },
}

pub async fn run_once<S: ContactSource>(
    source: &S,
    options: &RunOptions,
    cache: &mut SnapshotCache,
    now: DateTime<Utc>,
) -> Result<RunOutcome, PipelineError> {
    tracing::info!(page_size = options.page_size, "Starting contact fetch");
    let contacts = fetch_all_contacts(source, options.page_size, options.page_delay).await?;

    if contacts.is_empty() {
        tracing::warn!("CRM returned no contacts, skipping publication");
        return Ok(RunOutcome::Skipped);
    }

    let scrubbed: Vec<ScrubbedContact> = contacts.iter().map(scrub).collect();
    drop(contacts);
    let metrics = aggregate(scrubbed.iter().map(ScrubbedContact::as_contact), &options.lists);
    let funnel = metrics.funnel;
    tracing::info!(
        leads = funnel.leads,
        platform_members = funnel.platform_members,
        profiled = funnel.profiled,
        enrolled = funnel.enrolled,
        paying = funnel.paying,
        in_target = metrics.in_target,
        "Metrics calculated"
    );

    let snapshot = Snapshot::new(scrubbed, metrics, now);
    let total_contacts = snapshot.total_contacts;
    let snapshot_path = cache.path().to_path_buf();
    snapshot::write_snapshot(&snapshot_path, &snapshot).map_err(|source| {
        PipelineError::SnapshotWrite {
            path: snapshot_path.clone(),
            source,
        }
    })?;
    // The cache now holds what consumers will read.
    cache.refresh().map_err(|source| PipelineError::SnapshotVerify {
        path: snapshot_path.clone(),
        source,
    })?;

    let mut retained = history::load_history(&options.history_path);
    let recorded = history::record_run(
        &mut retained,
        now.date_naive(),
        funnel,
        total_contacts,
        &options.retention,
    );
    history::save_history(&options.history_path, &retained).map_err(|source| {
        PipelineError::HistoryWrite {
            path: options.history_path.clone(),
            source,
        }
    })?;
    tracing::info!(
        daily = recorded.daily_entries,
        weekly = recorded.weekly_entries,
        "History updated"
    );

    Ok(RunOutcome::Published {
        total_contacts,
        funnel,
        history: recorded,
    })
}
