use clap::Parser;
use tracing::info;

use docrelay::{Config, UploadServer};

/// Word document upload relay.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, env = "DOCRELAY_CONFIG", default_value = "config.toml")]
    config: String,

    /// Validate the configuration and exit.
    #[arg(long)]
    validate: bool,
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load configuration
    let mut config = match Config::load_with_env(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.config);
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            if let Err(e) = config.apply_env_overrides() {
                eprintln!("Invalid environment override: {e}");
                std::process::exit(1);
            }
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    if args.validate {
        println!("Configuration is valid.");
        return;
    }

    // Initialize logging
    if let Err(e) = docrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        docrelay::logging::init_console_only(&config.logging.level);
    }

    info!("docrelay - Word document upload relay");
    info!(
        "Server configured on {}:{} ({} storage)",
        config.server.host, config.server.port, config.storage.provider
    );

    config.server.public_url = config.server.public_url.trim_end_matches('/').to_string();

    if let Err(e) = UploadServer::new(config).run(shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
