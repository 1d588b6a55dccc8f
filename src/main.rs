mod app;
mod cli;
mod config;

use app::LiquidMeshApp;
use clap::Parser;
use cli::{Cli, Commands};
use config::AppConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();

    if let Err(e) = run().await {
        error!("application error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    init_tracing("info");

    info!("loading configuration...");
    let config = AppConfig::load()?;
    info!(
        peer_id = %config.node.peer_id,
        listen = ?config.node.listen_addresses,
        quic = config.node.enable_quic,
        insecurity = config.node.insecurity,
        "configuration loaded"
    );

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run) | None => run_node(config).await,
        Some(Commands::Info) => show_info(config),
        Some(Commands::Monitor { interval }) => monitor_network(config, interval).await,
    }
}

async fn run_node(config: AppConfig) -> anyhow::Result<()> {
    let app = LiquidMeshApp::new(&config)?;
    app.start().await?;

    info!("node running, press ctrl-c to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    app.stop().await;
    Ok(())
}

fn show_info(config: AppConfig) -> anyhow::Result<()> {
    println!("\nNode Configuration");
    println!("─────────────────────────────────────");
    println!("  Peer ID:      {}", config.node.peer_id);
    println!("  Listen:       {:?}", config.node.listen_addresses);
    println!("  Direct peers: {:?}", config.node.direct_peers);
    println!("  QUIC enabled: {}", config.node.enable_quic);
    println!("  Insecurity:   {}", config.node.insecurity);
    println!("\nTLS Configuration");
    println!("─────────────────────────────────────");
    println!("  CA cert:      {}", config.tls.ca_cert_path);
    println!("  Node cert:    {}", config.tls.node_cert_path);
    Ok(())
}

async fn monitor_network(config: AppConfig, interval: u64) -> anyhow::Result<()> {
    let app = LiquidMeshApp::new(&config)?;
    app.start().await?;

    println!("\nLiquidMesh Network Monitor");
    println!("─────────────────────────────────────");
    println!("  Update interval: {}s", interval);
    println!("  Peer ID:         {}", config.node.peer_id);
    println!("─────────────────────────────────────\n");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {
                info!("monitor tick");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                app.stop().await;
                return Ok(());
            }
        }
    }
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
