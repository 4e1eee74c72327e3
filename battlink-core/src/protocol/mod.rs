mod error;
mod frame;
mod telemetry;

pub use error::{FrameSection, ParseResult, ProtocolError};
pub use frame::*;
pub use telemetry::*;

/// Version 1, type bits 00 (Confirmable), token length 0. Requests are
/// never retransmitted despite the Confirmable type.
pub const HEADER_BYTE: u8 = 0x40;
pub const PROTOCOL_VERSION: u8 = 0x01;
pub const MAX_FRAME_SIZE: usize = 128;
pub const MAX_PATH_LEN: usize = 12;
pub const PAYLOAD_MARKER: u8 = 0xFF;
/// Uri-Path option number, written as the delta of the first option.
pub const URI_PATH_OPTION: u8 = 11;
/// Header byte + code byte + message id.
pub const FIXED_HEADER_SIZE: usize = 4;
