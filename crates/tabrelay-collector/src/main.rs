//! tabrelay — local collector for browser tab reports.

use std::path::PathBuf;
use std::sync::Arc;

use tabrelay_collector::{serve, CollectorState};
use tabrelay_core::CollectorConfig;
use tabrelay_manager::config::DEFAULT_CONFIG_PATH;
use tabrelay_manager::{ManagerConfig, SystemProcessTable, TabMemoryManager};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("tabrelay — local collector for browser tab reports");
    println!();
    println!("Usage: tabrelay [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve           Start the collector");
    println!("  manage [config]          Start the collector and the tab memory manager");
    println!("                           (config defaults to {})", DEFAULT_CONFIG_PATH);
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  TABRELAY_HOST            Bind address (default 127.0.0.1)");
    println!("  PORT                     Listen port (default 8080)");
    println!("  TABRELAY_LOG_PATH        Snapshot file (default log.json)");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut manager_config = None;
    if args.len() > 1 {
        match args[1].as_str() {
            "serve" => {}
            "manage" => {
                let path = args
                    .get(2)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
                manager_config = Some(ManagerConfig::load(&path)?);
            }
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'tabrelay help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let mut config = CollectorConfig::from_env();
    if let Some(manager_config) = &manager_config {
        // The manager reads what the collector writes.
        config.log_path = manager_config.snapshot_path.clone();
    }
    let state = Arc::new(CollectorState::new(&config));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}/", addr);
    info!("Writing tab snapshots to {}", config.log_path.display());

    let (stop_tx, stop_rx) = watch::channel(false);
    let manager_task = manager_config.map(|manager_config| {
        let processes = Arc::new(SystemProcessTable::new(manager_config.process_name.clone()));
        let manager = Arc::new(TabMemoryManager::new(manager_config, processes));
        tokio::spawn(manager.run(stop_rx))
    });

    serve(listener, state, shutdown_signal()).await?;

    let _ = stop_tx.send(true);
    if let Some(task) = manager_task {
        let _ = task.await;
    }

    info!("The server is stopped");
    Ok(())
}
