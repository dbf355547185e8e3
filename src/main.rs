use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Utc, Weekday};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod canon;
mod classify;
mod config;
mod crm;
mod delta;
mod error;
mod export;
mod history;
mod models;
mod normalize;
mod pipeline;
mod report;
mod scrub;
mod snapshot;
mod storage;
mod taxonomy;

use aggregate::Scope;
use config::{CrmSettings, ListIds, RetentionPolicy};
use crm::CrmClient;
use error::PipelineError;
use export::Dimension;
use pipeline::{RunOptions, RunOutcome};
use snapshot::SnapshotCache;

#[derive(Parser)]
#[command(name = "funnel-snapshot")]
#[command(about = "CRM funnel snapshots and weekly trend history for the marketing dashboard", long_about = None)]
struct Cli {
    /// Published snapshot artifact
    #[arg(long, global = true, env = "DATASETS_FILE", default_value = "datasets.json")]
    snapshot: PathBuf,
    /// Retained daily/weekly history artifact
    #[arg(long, global = true, env = "HISTORY_FILE", default_value = "historical-data.json")]
    history: PathBuf,
    #[arg(long, global = true, env = "BREVO_API_URL", default_value = config::DEFAULT_API_URL)]
    api_url: String,
    #[arg(long, global = true, default_value_t = 1000)]
    page_size: usize,
    #[arg(long, global = true, default_value_t = 100)]
    page_delay_ms: u64,
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,
    #[arg(long, global = true, default_value_t = 6)]
    platform_list: i64,
    #[arg(long, global = true, default_value_t = 69)]
    webinar_list: i64,
    /// Day of the week on which a weekly entry is recorded
    #[arg(long, global = true, default_value = "wed")]
    weekly_day: Weekday,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch contacts, publish the snapshot and update history (default)
    Run,
    /// Print the week-over-week funnel report
    Delta {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export one chart distribution from the published snapshot as CSV
    Export {
        #[arg(long, value_enum)]
        dimension: Dimension,
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
        #[arg(long, default_value_t = 2)]
        min_count: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    fn lists(&self) -> ListIds {
        ListIds {
            platform: self.platform_list,
            webinar: self.webinar_list,
        }
    }

    fn crm_settings(&self) -> Result<CrmSettings, PipelineError> {
        Ok(CrmSettings::new(
            config::api_key_from_env()?,
            self.api_url.clone(),
            self.page_size,
            Duration::from_secs(self.timeout_secs),
            Duration::from_millis(self.page_delay_ms),
        )?)
    }

    fn run_options(&self, settings: &CrmSettings) -> RunOptions {
        RunOptions {
            history_path: self.history.clone(),
            page_size: settings.page_size,
            page_delay: settings.page_delay,
            lists: self.lists(),
            retention: RetentionPolicy {
                weekly_day: self.weekly_day,
                ..RetentionPolicy::default()
            },
        }
    }
}

fn write_output(out: Option<&PathBuf>, content: &[u8]) -> anyhow::Result<()> {
    match out {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(content)?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => {
            let settings = cli.crm_settings()?;
            let client = CrmClient::new(&settings).map_err(PipelineError::from)?;
            let mut cache = SnapshotCache::new(&cli.snapshot);
            let outcome =
                pipeline::run_once(&client, &cli.run_options(&settings), &mut cache, Utc::now())
                    .await?;
            match outcome {
                RunOutcome::Skipped => println!("No contacts found, nothing published."),
                RunOutcome::Published {
                    total_contacts,
                    history,
                    ..
                } => {
                    println!(
                        "Published {} contacts to {}.",
                        total_contacts,
                        cli.snapshot.display()
                    );
                    if let Some(week) = history.weekly_key {
                        println!("Weekly snapshot recorded for week starting {week}.");
                    }
                }
            }
        }
        Commands::Delta { out } => {
            let retained = history::load_history(&cli.history);
            let report = report::build_delta_report(&retained);
            write_output(out.as_ref(), report.as_bytes())?;
        }
        Commands::Export {
            dimension,
            scope,
            min_count,
            out,
        } => {
            let mut cache = SnapshotCache::new(&cli.snapshot);
            let published = cache
                .get()
                .with_context(|| format!("failed to read snapshot {}", cli.snapshot.display()))?;
            tracing::info!(
                generated_at = %published.generated_at,
                total_contacts = published.total_contacts,
                "Exporting from snapshot"
            );
            let distribution = export::chart_distribution(
                &published.contacts,
                &cli.lists(),
                *scope,
                *dimension,
                *min_count,
            );
            let mut buffer = Vec::new();
            export::write_csv(&mut buffer, &distribution)?;
            write_output(out.as_ref(), &buffer)?;
        }
    }

    Ok(())
}
