//! CLI command definitions and dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast;

use vidpipe::config::{default_config_path, load_config, Config};
use vidpipe::pipeline::JobProgress;
use vidpipe::service::{ListFormat, VideoQueue};
use vidpipe::worker::{JobFilter, JobId, JobStatus, Scheduler};
use vidpipe::{telemetry, Result, SourceKind};

/// Background queue that imports videos, fetches transcripts and
/// generates AI descriptions.
#[derive(Debug, Parser)]
#[command(name = "vidpipe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "VIDPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Table,
    Json,
    Csv,
}

impl From<FormatArg> for ListFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Table => ListFormat::Table,
            FormatArg::Json => ListFormat::Json,
            FormatArg::Csv => ListFormat::Csv,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Queue one or more video URLs (or bare ids) for processing
    Import {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Lower runs first
        #[arg(long, default_value_t = vidpipe::worker::DEFAULT_PRIORITY)]
        priority: i32,
    },
    /// List queued and processed videos
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        format: FormatArg,
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        source: Option<SourceKind>,
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },
    /// Queue and library statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Remove orphaned data, compact the database and clear caches
    Optimize,
    /// Reset thumbnails to the provider's derived image
    RegenThumbnails {
        /// Only this job; all jobs when omitted
        id: Option<i64>,
    },
    /// Return a failed or skipped job to the queue
    Retry { id: i64 },
    /// Delete a job
    Delete { id: i64 },
    /// Process one batch and exit
    RunOnce,
    /// Process the queue on a fixed interval until interrupted
    Run {
        /// Seconds between batches; defaults to the configured interval
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Probe the vendor API
    Health,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = self.load_config()?;
        telemetry::init(&config.logging)?;

        let (events_tx, events_rx) = broadcast::channel::<JobProgress>(256);
        let daemon = matches!(self.command, Commands::Run { .. });
        let queue = VideoQueue::open(&config, daemon.then_some(events_tx))?;

        match &self.command {
            Commands::Import { urls, priority } => {
                for url in urls {
                    let outcome = queue.import_with(url, *priority, Default::default())?;
                    if outcome.created {
                        println!(
                            "✓ Queued {} video {} as job {}",
                            outcome.source, outcome.video_id, outcome.job_id
                        );
                    } else {
                        println!(
                            "⚠ {} video {} is already queued as job {}",
                            outcome.source, outcome.video_id, outcome.job_id
                        );
                    }
                }
            }
            Commands::List {
                format,
                status,
                source,
                limit,
            } => {
                let filter = JobFilter {
                    status: *status,
                    source_kind: *source,
                    limit: Some(*limit),
                    ..Default::default()
                };
                println!("{}", queue.list((*format).into(), &filter)?);
            }
            Commands::Stats { json } => {
                let stats = queue.stats()?;
                if *json {
                    println!("{}", to_json(&stats)?);
                } else {
                    print_kv("Total videos", &stats.videos.total_videos.to_string());
                    print_kv("Total views", &stats.videos.total_views.to_string());
                    print_kv(
                        "Total duration",
                        &format!("{:.1} hours", stats.total_duration_hours()),
                    );
                    print_kv("Average views", &stats.videos.avg_views.to_string());
                    for status in JobStatus::ALL {
                        print_kv(
                            &format!("Jobs {}", status),
                            &stats.queue.get(status).to_string(),
                        );
                    }
                }
            }
            Commands::Optimize => {
                let report = queue.optimize()?;
                println!(
                    "✓ Removed {} orphaned transcript(s){}",
                    report.orphaned_transcripts,
                    if report.caches_cleared {
                        ", caches cleared"
                    } else {
                        ""
                    }
                );
            }
            Commands::RegenThumbnails { id } => {
                let report = queue.regenerate_thumbnails(id.map(JobId)).await?;
                println!(
                    "✓ {} updated, {} unchanged, {} skipped, {} republished, {} failed",
                    report.updated,
                    report.unchanged,
                    report.skipped,
                    report.republished,
                    report.failed
                );
            }
            Commands::Retry { id } => {
                queue.retry(JobId(*id))?;
                println!("✓ Job {} queued again", id);
            }
            Commands::Delete { id } => {
                queue.delete(JobId(*id))?;
                println!("✓ Job {} deleted", id);
            }
            Commands::RunOnce => {
                let report = queue.run_once().await?;
                println!("{}", to_json(&report)?);
            }
            Commands::Health => match queue.health().await {
                Some(status) => println!("{}", to_json(&status?)?),
                None => println!("⚠ No vendor configured"),
            },
            Commands::Run { interval } => {
                let interval = interval.unwrap_or(config.queue.interval_secs).max(1);
                run_daemon(&queue, events_rx, Duration::from_secs(interval)).await;
            }
        }
        Ok(())
    }

    fn load_config(&self) -> Result<Config> {
        if let Some(path) = &self.config {
            return Ok(load_config(path)?);
        }
        match default_config_path() {
            Some(path) if path.exists() => Ok(load_config(&path)?),
            _ => Ok(Config::default()),
        }
    }
}

async fn run_daemon(
    queue: &VideoQueue,
    events: broadcast::Receiver<JobProgress>,
    interval: Duration,
) {
    // Detached: the channel stays open for the life of the process.
    std::thread::spawn(move || log_progress(events));

    let scheduler = Arc::new(Scheduler::new(queue.runner(), interval));
    let (trigger_tx, trigger_rx) = broadcast::channel::<()>(4);
    let handle = scheduler.start(trigger_rx);

    let on_interrupt = Arc::clone(&scheduler);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Shutdown requested");
        on_interrupt.stop();
        let _ = trigger_tx.send(());
    }) {
        log::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    log::info!("Processing queue every {}s", interval.as_secs());
    if tokio::task::spawn_blocking(move || handle.join()).await.is_err() {
        log::error!("Scheduler thread could not be joined");
    }
}

fn log_progress(mut events: broadcast::Receiver<JobProgress>) {
    loop {
        match events.blocking_recv() {
            Ok(progress) => match serde_json::to_string(&progress.event) {
                Ok(event) => tracing::info!(job_id = %progress.job_id, %event, "progress"),
                Err(e) => log::warn!("Unserializable progress event: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("Dropped {} progress event(s)", n)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| vidpipe::VidpipeError::Output(e.to_string()))
}

fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}
