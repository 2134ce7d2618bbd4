//! Guildwarden - membership lifecycle and role-hierarchy authorization
//!
//! Main entry point for the guildwarden binary. Loads configuration,
//! wires the engine, session registry and scheduler behind the service
//! facade, and runs the event loop until shutdown.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};

use guildwarden::cli::{Cli, Commands, ConfigSubcommand};
use guildwarden::config::{self, GuildConfig};
use guildwarden::engine::{MemberDirectory, TransitionEngine};
use guildwarden::gateway::MemoryGateway;
use guildwarden::logging::{self, LogGuards};
use guildwarden::scheduler::Scheduler;
use guildwarden::service::Service;
use guildwarden::version;
use guildwarden::{Error, Result};

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // For commands that don't need full logging, use simple setup
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Run { config } => config.clone(),
        _ => None,
    };

    // Load config (or use defaults)
    let config = match GuildConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // The guards must be kept alive for the lifetime of the program
    let _log_guards: LogGuards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    // Log version info at startup
    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting Guildwarden"
    );

    match cli.command {
        Commands::Run { .. } => run_service(config),
        Commands::Version | Commands::Config { .. } => {
            // Already handled above
            unreachable!();
        }
    }
}

/// Run the service in normal operation mode
fn run_service(config: GuildConfig) -> Result<()> {
    info!(
        name = %config.service.name.as_deref().unwrap_or("guildwarden"),
        baseline = %config.roles.baseline,
        moderator = %config.roles.moderator,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(if config.service.worker_threads > 0 {
            config.service.worker_threads as usize
        } else {
            num_cpus::get().min(8)
        })
        .thread_name("guildwarden")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async_service_main(config))
}

/// Async service main loop
async fn async_service_main(config: GuildConfig) -> Result<()> {
    let resolved = config.resolve()?;

    info!(
        roles = resolved.graph.len(),
        agent_top_rank = resolved.agent.top_rank,
        stage_channel = %resolved.service.stage_channel,
        "Role graph resolved"
    );

    // Standalone mode runs against the in-memory gateway; a platform
    // adapter would slot its own implementation in here.
    let gateway = Arc::new(MemoryGateway::new());
    let directory = Arc::new(MemberDirectory::new());
    let scheduler = Arc::new(Scheduler::with_poll_interval(resolved.countdown_poll));

    let engine = Arc::new(TransitionEngine::new(
        resolved.engine,
        resolved.agent,
        resolved.graph.clone(),
        directory.clone(),
        resolved.prefix,
        gateway.clone(),
        scheduler.clone(),
    ));

    let service = Service::new(
        resolved.service,
        engine,
        directory,
        scheduler.clone(),
        gateway,
        resolved.graph,
    );

    // Set up graceful shutdown on Ctrl+C
    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    // Periodic cleanup of finished scheduler tasks
    let mut cleanup_timer = tokio::time::interval(Duration::from_secs(300));
    cleanup_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Service event loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received");
                break;
            }

            _ = cleanup_timer.tick() => {
                service.scheduler().cleanup_finished(100);
                debug!(
                    pending = service.scheduler().pending_count(),
                    fired = service.scheduler().fired_count(),
                    cancelled = service.scheduler().cancelled_count(),
                    "Scheduler cleanup"
                );
            }
        }
    }

    info!(
        fired = scheduler.fired_count(),
        cancelled = scheduler.cancelled_count(),
        "Service shutting down"
    );

    Ok(())
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config, json } => {
            let cfg = GuildConfig::load(config.as_deref())?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&cfg)
                        .map_err(|e| Error::Internal(e.to_string()))?
                );
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => {
            match GuildConfig::load(config.as_deref()) {
                Ok(_) => {
                    println!("Configuration is valid.");
                }
                Err(e) => {
                    eprint!("{}", e.format_for_terminal());
                    std::process::exit(e.exit_code());
                }
            }
        }
    }

    Ok(())
}
