mod controller;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{error, info, warn};

use controller::{Approval, Controller, ControllerConfig};

#[derive(Parser)]
#[command(name = "battlink-harness")]
#[command(about = "Simulated controller for battlink edge devices")]
struct Cli {
    /// Path to the harness configuration file
    #[arg(short, long, default_value = "battlink-harness.toml")]
    config: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HarnessConfig {
    bind_addr: SocketAddr,
    approval: Approval,
    approve_after: u32,
    silent_after_secs: Option<u64>,
}

impl HarnessConfig {
    fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5683)),
            approval: Approval::Grant,
            approve_after: 2,
            silent_after_secs: None,
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "battlink_harness=info".to_owned());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        HarnessConfig::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        HarnessConfig::default()
    };

    let socket = UdpSocket::bind(config.bind_addr).await?;
    info!(
        addr = %socket.local_addr()?,
        approval = ?config.approval,
        approve_after = config.approve_after,
        "Controller listening"
    );

    let mut controller = Controller::new(ControllerConfig {
        approval: config.approval,
        approve_after: config.approve_after,
        silent_after: config.silent_after_secs.map(Duration::from_secs),
    });

    let started = Instant::now();
    let mut buf = [0u8; 1152];

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, src) = match received {
                    Ok(v) => v,
                    Err(e) => {
                        error!(error = %e, "Receive failed");
                        continue;
                    }
                };

                let response = match controller.handle(src, &buf[..len], started.elapsed()) {
                    Ok(Some(response)) => response,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(%src, error = %e, "Dropping malformed request");
                        continue;
                    }
                };

                if let Err(e) = socket.send_to(response.as_bytes(), src).await {
                    warn!(%src, error = %e, "Reply not delivered");
                }
            }
        }
    }

    Ok(())
}
