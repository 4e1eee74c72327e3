pub mod clock;
pub mod config;
pub mod engine;
pub mod link;
pub mod telemetry;
pub mod transport;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    Config, ConfigError, LinkConfig, PeerConfig, TelemetryConfig, TelemetryEncoding,
    TimestampClock, TransportConfig,
};
pub use engine::{Engine, SendError};
pub use link::{Action, ConnectionState, CyclePlan, Event, LinkState, Notice, Response};
pub use telemetry::{SimulatedBattery, TelemetrySource};
pub use transport::{MockTransport, Transport, TransportError, UdpTransport};
