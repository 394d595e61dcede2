//! smartmon-exporter
//!
//! Prometheus exporter for S.M.A.R.T. disk health metrics with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod startup_checks;

use clap::Parser;
use smartmon_exporter::collector::{Collector, SnapshotCache};
use smartmon_exporter::error::StartupError;
use smartmon_exporter::server;
use smartmon_exporter::state::AppState;
use smartmon_exporter::tool::Tool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_test};
use config::{
    resolve_config, show_config, user_config_report, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", args.log_level);
    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Runs the exporter until a shutdown signal arrives.
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let tool = match startup_checks::select_tool(&config) {
        Ok(tool) => tool,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    // A smartctl that cannot report its version cannot produce JSON either
    let tool_info = match startup_checks::probe_tool(&tool).await {
        Ok(info) => info,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };
    if let Tool::Smartctl(smartctl) = &tool {
        info!(
            "Using smartctl {} at {}",
            tool_info.version,
            smartctl.path().display()
        );
    }

    let collector = Collector::new(Arc::new(tool), config.collector_settings()?).with_tool_info(tool_info);
    let cache = SnapshotCache::new(collector, config.debounce());
    let state = Arc::new(AppState::new(cache));

    // Perform initial collection so /health and the first scrape have data
    info!("Performing initial collection cycle");
    let (snapshot, _) = state.cache.get_or_collect().await;
    if snapshot.discovery_succeeded() {
        info!(
            "Initial collection completed: {} devices, {} failed",
            snapshot.attempted, snapshot.failed
        );
    } else {
        warn!("Initial collection could not discover devices");
    }

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let app = server::router(state, config.enable_health.unwrap_or(true));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!("smartmon-exporter listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("smartmon-exporter stopped gracefully");
    Ok(())
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.show_user_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        if args.show_config {
            return show_config(&config, args.config_format);
        }

        if args.show_user_config {
            let report = if args.no_config {
                "# --no-config given; built-in defaults are in effect\n".to_string()
            } else {
                user_config_report(args.config.as_deref())?
            };
            print!("{report}");
            return Ok(());
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        let config = load_validated_config(&args)?;

        return match command {
            Commands::Check { devices } => command_check(*devices, &config).await,

            Commands::Test {
                iterations,
                verbose,
                exposition,
            } => command_test(*iterations, *verbose, *exposition, &config).await,

            Commands::CheckRequirements => {
                setup_logging(&args)?;
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                match startup_checks::validate_requirements(&config) {
                    Ok(_) => {
                        println!("\n✅ All requirements met - ready for production!");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }

            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args)?;

    info!("Starting smartmon-exporter {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = startup_checks::validate_requirements(&config) {
        error!("❌ Startup validation failed: {}", e);
    }

    serve(config).await
}
