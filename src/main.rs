use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetsnap::config::LogConfig;
use fleetsnap::{util, Config, FleetCore};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "fleetsnap", version, about = "Back up and restore fleet-managed cluster resources")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,

    /// Config file (defaults to ~/.fleetsnap/config.toml)
    #[arg(long, global = true, env = "FLEETSNAP_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the default config and logs
    #[arg(long, global = true, env = "FLEETSNAP_HOME")]
    data_dir: Option<PathBuf>,

    /// API server base URL
    #[arg(long, global = true, env = "FLEETSNAP_SERVER")]
    server: Option<String>,

    /// Bearer token for the API server
    #[arg(long, global = true, env = "FLEETSNAP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    insecure: bool,

    /// Worker count per pool run
    #[arg(long, global = true)]
    max_concurrency: Option<usize>,

    /// Log what would be written without writing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Exit non-zero when any resource failed or was skipped
    #[arg(long, global = true)]
    fail_on_errors: bool,

    /// Only process these kinds (repeatable; Namespace is always included)
    #[arg(long = "kind", global = true)]
    kinds: Vec<String>,

    /// Log level filter (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Snapshot cluster resources into a directory
    Backup {
        /// Snapshot root to write
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },
    /// Apply a snapshot directory to the cluster
    Restore {
        /// Snapshot root to read
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },
}

impl Args {
    /// Overlay command line values on the loaded config
    fn apply(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.cluster.server = server.clone();
        }
        if self.token.is_some() {
            config.cluster.token = self.token.clone();
        }
        if self.insecure {
            config.cluster.insecure = true;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.fail_on_errors {
            config.fail_on_errors = true;
        }
        if !self.kinds.is_empty() {
            config.kinds = Some(self.kinds.clone());
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.log_file.is_some() {
            config.log.file = self.log_file.clone();
        }
        match &self.cmd {
            Cmd::Backup { dir: Some(dir) } => config.backup_dir = dir.clone(),
            Cmd::Restore { dir: Some(dir) } => config.restore_dir = dir.clone(),
            _ => {}
        }
    }
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log.level))
        .with_context(|| format!("Invalid log level: {}", log.level))?;

    match &log.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false) // Disable ANSI colors in log file
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    util::init_data_dir(args.data_dir.clone());

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.log)?;

    let fail_on_errors = config.fail_on_errors;
    let core = FleetCore::connect(config).context("Failed to create cluster client")?;

    // Ctrl-C cancels the whole run; running tasks observe the token
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    let has_failures = match args.cmd {
        Cmd::Backup { .. } => {
            let summary = core
                .backup_collector()
                .perform_backup(cancel)
                .await
                .context("Backup failed")?;
            print!("{summary}");
            summary.has_failures()
        }
        Cmd::Restore { .. } => {
            let summary = core
                .restore_applier()
                .perform_restore(cancel)
                .await
                .context("Restore failed")?;
            print!("{summary}");
            summary.has_failures()
        }
    };

    if has_failures && fail_on_errors {
        anyhow::bail!("Some resources failed or were skipped");
    }
    Ok(())
}
