//! Ensemble gateway: fans predictions out to remote classifiers and streams
//! their state to connected observers.

use std::sync::Arc;

use ensemble_core::GatewayConfig;
use ensemble_realtime::HealthLoop;
use ensemble_runtime::HttpTransport;
use ensemble_server::{build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("Ensemble gateway: majority-vote front end for remote classifiers");
    println!();
    println!("Usage: ensemble-gateway [command]");
    println!();
    println!("Commands:");
    println!("  serve      Start the server (default)");
    println!("  config     Print the resolved configuration as JSON");
    println!("  help       Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "serve" => {}
            "config" => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!(
                    "Unknown command: {}. Use 'ensemble-gateway help' for usage.",
                    other
                );
                std::process::exit(1);
            }
        }
    }

    // Initialize tracing; RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Environment: {}", config.env);
    let port = config.port;
    let interval = config.health_interval;

    // Build application state
    let transport = Arc::new(HttpTransport::new());
    let state = Arc::new(AppState::new(config, transport)?);
    info!(
        "Registered models: {}",
        state.registry.keys().join(", ")
    );

    // Start background health loop
    let health_loop = HealthLoop::spawn(state.broadcaster.clone(), interval);

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ensemble gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    health_loop.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
