//! ListenTube Watch - command-line client for audio extraction jobs
//!
//! Submits a video link, follows the job's progress by polling, and saves
//! the finished audio file.

mod cli;
mod error;
mod format;
mod watch;

use crate::cli::Cli;
use crate::error::Result;
use clap::Parser;
use listentube_tasks::{HttpTaskApi, PollingScheduler, SchedulerConfig, TaskManager, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("listentube_watch=info".parse()?)
        .add_directive("listentube_tasks=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    let args = Cli::parse();
    info!("Server: {}", args.server);

    let store = Arc::new(TaskStore::new());
    let api = Arc::new(HttpTaskApi::new(&args.server)?);
    let scheduler = Arc::new(PollingScheduler::new(
        store.clone(),
        api.clone(),
        SchedulerConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        },
    ));
    let manager = TaskManager::new(store, api);

    match watch::run(&manager, scheduler, &args.url, &args.format, &args.output_dir).await {
        Ok(path) => {
            info!("Task complete! Saved to {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Task failed!");
            Err(e)
        }
    }
}
