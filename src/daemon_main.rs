// This runs the tracker on windows without creating a console. Disable during development to see
// stdout.
#![windows_subsystem = "windows"]

use std::env::args;

use anyhow::Result;
use clap::Parser;
use grindwatch::{
    config::{AppConfig, DisplayMode},
    tracker::{args::DaemonArgs, start_tracker},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, TRACKER_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() {
    run_service(args().collect::<Vec<_>>()).unwrap();
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    if !args.force {
        #[cfg(feature = "win")]
        {
            let mut command_args = command_args;
            println!("Starting detached process");
            use std::os::windows::process::CommandExt;
            use windows::Win32::System::Threading::DETACHED_PROCESS;

            command_args.push("--force".into());
            let process_name = std::env::current_exe()?;
            println!("Process {:?}", process_name);
            let mut command = std::process::Command::new(process_name);
            command.args(command_args.into_iter().skip(1));
            command.creation_flags(DETACHED_PROCESS.0);
            command.stdin(std::process::Stdio::null());
            command.stdout(std::process::Stdio::null());
            command.stderr(std::process::Stdio::null());
            #[allow(clippy::zombie_processes)]
            command.spawn()?;
            println!("Created tracker daemon");
            return Ok(());
        }
    }

    run(args)
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(TRACKER_PREFIX, &app_dir, args.log, args.log_console)?;

    let mut config = AppConfig::load_or_create(&app_dir.join("config.json"))?;
    // Presentation-only overrides, tracking itself is unaffected.
    if args.console_only {
        config.display.mode = DisplayMode::Window;
    } else if args.no_overlay && config.display.mode == DisplayMode::Overlay {
        config.display.mode = DisplayMode::Window;
    }

    single_thread_runtime()?.block_on(async move { start_tracker(app_dir, config).await })?;
    Ok(())
}
