pub mod protocol;

pub use protocol::{
    Frame, FrameBuilder, FrameSection, MessageId, MessageType, Method, ParseResult, ParsedFrame,
    PowerStatus, ProtocolError, ResponseCode, TelemetryRecord, encode_response,
};

/// Application-level routes carried in the Uri-Path option.
pub mod paths {
    /// GET, no payload. Answered with `ALIVE` while the controller runs.
    pub const HEARTBEAT: &str = "heartbeat";
    /// PUT `REQ`. Asks the controller operator for permission to report.
    pub const CONNECT: &str = "connect";
    /// PUT telemetry, binary or text.
    pub const BATTERY: &str = "battery";
    /// PUT `BYE`. Drops this device's authorization.
    pub const DISCONNECT: &str = "disconnect";
}

/// Request bodies sent by the device.
pub mod bodies {
    pub const CONNECT_REQUEST: &[u8] = b"REQ";
    pub const DISCONNECT_REQUEST: &[u8] = b"BYE";
}

/// Response texts the controller answers with.
pub mod replies {
    pub const ALIVE: &str = "ALIVE";
    pub const ONLINE: &str = "online";
    pub const PENDING: &str = "pending";
    pub const DENIED: &str = "denied";
}
