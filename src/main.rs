//! Command-line entry point: builds a pool of queue workers from
//! configuration and supervises it, optionally detached from the terminal.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use capataz::core::{ConnectOutcome, JobSource, PollOutcome};
use capataz::prelude::{
    Daemonizer, ForkBackend, PoolConfig, QueueWorker, Result, Supervisor, TimeLimited, Worker,
    WorkerPool,
};

/// Fork-based worker pool supervisor.
#[derive(Debug, Parser)]
#[command(name = "capataz", version, about)]
struct Cli {
    /// Detach from the terminal and run in the background.
    #[arg(short, long)]
    daemon: bool,

    /// Run as this system user (requires privilege).
    #[arg(short, long)]
    user: Option<String>,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured number of worker processes.
    #[arg(short = 'n', long)]
    workers: Option<usize>,
}

/// Placeholder job source: logs a heartbeat instead of talking to a real
/// broker. Replace with a broker-backed implementation to do actual work.
struct IdleJobSource {
    interval: Duration,
}

impl IdleJobSource {
    fn new() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl JobSource for IdleJobSource {
    fn poll_once(&mut self) -> PollOutcome {
        thread::sleep(self.interval);
        tracing::debug!("no jobs, idling");
        PollOutcome::Timeout
    }

    fn wait_for_connection(&mut self) -> ConnectOutcome {
        ConnectOutcome::Success
    }
}

fn build_worker(config: &PoolConfig) -> Arc<dyn Worker> {
    let queue: Arc<dyn Worker> = Arc::new(QueueWorker::new(
        Box::new(|| Box::new(IdleJobSource::new())),
        config.reconnect_backoff,
    ));
    match config.max_run_duration {
        Some(max_run) => Arc::new(TimeLimited::new(queue, max_run)),
        None => queue,
    }
}

fn supervise(config: &PoolConfig) -> Result<()> {
    let worker = build_worker(config);
    let count = config.worker_count;
    let timeout = config.shutdown_timeout;
    let mut supervisor = Supervisor::new(move || {
        let mut pool = WorkerPool::new(Arc::new(ForkBackend::new()));
        pool.create_many(worker, count)?;
        Ok(pool)
    })
    .with_shutdown_timeout(timeout);
    supervisor.run()
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }
    if let Some(user) = cli.user {
        config.user = Some(user);
    }
    config.validate()?;

    if cli.daemon {
        let mut daemonizer = Daemonizer::new();
        if let Some(user) = &config.user {
            daemonizer.assume_identity(user)?;
        }
        // Returns in the invoking process once the detached stage is
        // spawned; the supervisor runs in the grandchild.
        daemonizer.run(move || supervise(&config))
    } else {
        supervise(&config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("capataz: {e}");
        std::process::exit(1);
    }
}
