use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub peer: PeerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    /// Address and port of the controller
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Local address for the UDP socket
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Silence after which the controller is considered gone
    pub liveness_timeout_secs: u64,
    /// How often the controller is expected to confirm liveness
    pub heartbeat_period_secs: u64,
    /// Interval between decision cycles
    pub cadence_secs: u64,
    /// Interval between loop iterations
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub encoding: TelemetryEncoding,
    pub clock: TimestampClock,
}

/// Body format of `battery` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryEncoding {
    /// 10-byte little-endian record.
    #[default]
    Binary,
    /// Voltage as text, e.g. `3.87V`.
    Text,
}

/// Source of the telemetry `timestamp` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampClock {
    /// Seconds since the device started.
    #[default]
    Boot,
    /// Unix seconds.
    Epoch,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cadence must be at least one second")]
    ZeroCadence,

    #[error("poll interval must be at least one millisecond")]
    ZeroPollInterval,

    #[error(
        "liveness timeout ({timeout_secs}s) must exceed the heartbeat period ({heartbeat_secs}s)"
    )]
    TimeoutNotAboveHeartbeat {
        timeout_secs: u64,
        heartbeat_secs: u64,
    },
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.link.validate()
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cadence_secs == 0 {
            return Err(ConfigError::ZeroCadence);
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.liveness_timeout_secs <= self.heartbeat_period_secs {
            return Err(ConfigError::TimeoutNotAboveHeartbeat {
                timeout_secs: self.liveness_timeout_secs,
                heartbeat_secs: self.heartbeat_period_secs,
            });
        }

        Ok(())
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_period_secs)
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer: PeerConfig {
                addr: SocketAddr::from(([192, 168, 4, 1], 5683)),
            },
            transport: TransportConfig::default(),
            link: LinkConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: 40,
            heartbeat_period_secs: 30,
            cadence_secs: 5,
            poll_interval_ms: 50,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            encoding: TelemetryEncoding::Binary,
            clock: TimestampClock::Boot,
        }
    }
}
