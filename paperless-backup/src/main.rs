//! Paperless Backup - Main entry point
//!
//! Stops paperless-ngx, archives its docker volumes, verifies the archive,
//! prunes old backups and brings the service back.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperless_backup::{
    archive::Archiver,
    config::Config,
    daemon::shutdown::ShutdownCoordinator,
    executor::{BackupExecutor, BackupJob},
    utils,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full backup (default)
    Run,
    /// Verify an existing archive without touching the service
    Verify {
        /// Archive to read end to end
        archive: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = args.command.unwrap_or(Command::Run);
    if let Command::Config = command {
        return match config.to_toml() {
            Ok(rendered) => {
                print!("{}", rendered);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    if let Err(e) = init_logging(&config, log_level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let outcome = match command {
        Command::Verify { archive } => verify(archive).await,
        _ => run(config).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, level: &str) -> Result<()> {
    std::fs::create_dir_all(&config.backup.dir).with_context(|| {
        format!(
            "Failed to create backup directory {}",
            config.backup.dir.display()
        )
    })?;
    utils::logger::init(level, &config.log_path())
}

async fn run(config: Config) -> Result<()> {
    tracing::debug!(
        "paperless-backup v{} using {}",
        env!("CARGO_PKG_VERSION"),
        config.backup.dir.display()
    );

    // Create shutdown coordinator
    let shutdown_coordinator = ShutdownCoordinator::new();
    let cancel_token = shutdown_coordinator.token();

    let signal_handle = tokio::spawn(async move {
        shutdown_coordinator.wait_for_signal().await;
    });

    let job = BackupJob::from(&config);
    let mut executor = BackupExecutor::for_host(&config).with_cancel(cancel_token.clone());

    // The pipeline blocks on disk and child processes; keep it off the
    // signal-handling thread.
    let result = tokio::task::spawn_blocking(move || executor.execute(&job)).await;

    // Release the signal watcher
    cancel_token.cancel();
    let _ = signal_handle.await;

    let report = result.context("Backup task panicked")??;
    tracing::debug!(
        "Archive {} holds {} entries; {} old backups deleted",
        report.archive.display(),
        report.summary.entries,
        report.cleanup.deleted
    );

    Ok(())
}

async fn verify(archive: PathBuf) -> Result<()> {
    let entries = tokio::task::spawn_blocking(move || Archiver::new().verify(&archive))
        .await
        .context("Verify task panicked")??;

    println!("{}", entries);
    Ok(())
}
