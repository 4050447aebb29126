pub mod daemon_path;
pub mod process;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{daemon_binary_path, kill_previous_trackers, restart_tracker};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    config::AppConfig,
    storage::ledger_storage::LedgerStorageImpl,
    tracker::start_tracker,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Grindwatch", version, long_about = None)]
#[command(about = "Screen-sampling activity and earnings tracker for GTA Online", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts the tracker daemon")]
    Init {
        #[arg(
            long,
            help = "Application directory. By default tries to save into %APPDATA% on Windows or $XDG_STATE_HOME on Linux"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Summarize recorded activity and earnings")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(
        about = "Run the tracker directly in the current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into %APPDATA% on Windows or $XDG_STATE_HOME on Linux"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop a currently running tracker.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = create_application_default_path()?;
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init { dir } => {
            restart_tracker(dir.as_deref())?;
            Ok(())
        }
        Commands::Stop {} => {
            kill_previous_trackers(&daemon_binary_path());
            Ok(())
        }
        Commands::Serve { dir } => {
            let dir = dir.unwrap_or(app_dir);
            let config = AppConfig::load_or_create(&dir.join("config.json"))?;
            start_tracker(dir, config).await?;
            Ok(())
        }
        Commands::Report { command } => {
            let storage = LedgerStorageImpl::new(app_dir)?;
            process_report_command(storage, command).await
        }
    }
}
