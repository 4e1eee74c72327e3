use std::net::SocketAddr;
use std::path::PathBuf;

use battlink_edge::{Config, Engine, MonotonicClock, SimulatedBattery, UdpTransport};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "battlink-edge")]
#[command(about = "Battery telemetry reporter for a battlink controller")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "battlink-edge.toml")]
    config: PathBuf,

    /// Controller address, overriding the configuration file
    #[arg(long)]
    peer: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "battlink_edge=info,battlink_core=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    if let Some(peer) = cli.peer {
        config.peer.addr = peer;
    }
    config.validate()?;

    let transport = UdpTransport::bind(config.transport.bind_addr, config.peer.addr).await?;

    info!(
        peer = %transport.peer(),
        local_addr = %transport.local_addr()?,
        encoding = ?config.telemetry.encoding,
        "Starting battlink-edge"
    );

    let mut engine = Engine::new(
        transport,
        SimulatedBattery::new(),
        config.link,
        config.telemetry,
    );

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, disconnecting...");
                cancel_on_signal.cancel();
            }
            Err(e) => error!(error = %e, "Unable to listen for Ctrl+C"),
        }
    });

    engine.run(&MonotonicClock::new(), cancel).await;

    info!("battlink-edge shut down complete");
    Ok(())
}
