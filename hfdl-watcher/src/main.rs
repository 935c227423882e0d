use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use hfdl_watcher::config::WatcherConfig;
use hfdl_watcher::model::StationRegistry;
use hfdl_watcher::module::acquisition::AcquisitionChain;
use hfdl_watcher::module::decoder::{DisplaySupervisor, ProcessSupervisor, Supervisor};
use hfdl_watcher::module::scheduled::{Outcome, WatchLoop, WatchOptions};

#[derive(Parser)]
#[command(name = "hfdl-watcher")]
#[command(about = "Keeps an HFDL decoder on the busiest ground station frequencies")]
#[command(version)]
struct Cli {
    /// Config file (default: config.toml)
    #[arg(long, env = "HFDL_WATCHER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select frequencies and keep dumphfdl running on them
    Run,

    /// Show the frequencies that would be chosen without starting a decoder
    Scan {
        /// Keep re-selecting every watch interval
        #[arg(long)]
        continuous: bool,

        /// Also show the experimental selection strategies
        #[arg(long)]
        experiments: bool,

        /// Only core stations: no fringe, no fill
        #[arg(long, conflicts_with = "named_only")]
        core_only: bool,

        /// Only core and fringe stations: no fill
        #[arg(long)]
        named_only: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match WatcherConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = match hfdl_watcher::logging::init_logging(&config.log_dir, "hfdl-watcher", &config.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &mut config).await {
        Ok(outcome) => {
            tracing::info!("HFDL watcher finished ({:?})", outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("HFDL watcher stopped: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &mut WatcherConfig) -> Result<Outcome> {
    let mut options = WatchOptions::from_config(config);

    if let Command::Scan {
        continuous,
        experiments,
        core_only,
        named_only,
    } = &command
    {
        options.once = !continuous;
        options.experiments = *experiments;
        if *core_only {
            config.selection.fringe_ids.clear();
            config.selection.skip_fill = true;
        }
        if *named_only {
            config.selection.skip_fill = true;
        }
    }

    tracing::info!("HFDL watcher starting...");

    let registry = Arc::new(StationRegistry::new());
    let chain = AcquisitionChain::from_config(&config.acquisition, registry.clone())?;

    match command {
        Command::Run => {
            let supervisor = ProcessSupervisor::new(config.decoder.clone(), registry.clone());
            watch(chain, registry, config, supervisor, options).await
        }
        Command::Scan { .. } => {
            let supervisor = DisplaySupervisor::new(config.decoder.clone());
            watch(chain, registry, config, supervisor, options).await
        }
    }
}

async fn watch<S: Supervisor>(
    chain: AcquisitionChain,
    registry: Arc<StationRegistry>,
    config: &WatcherConfig,
    supervisor: S,
    options: WatchOptions,
) -> Result<Outcome> {
    let mut watch_loop = WatchLoop::new(chain, registry, config.selection.clone(), supervisor, options);
    Ok(watch_loop.run(shutdown_signal()).await?)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown requested");
}
