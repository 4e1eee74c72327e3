pub type ParseResult<T> = core::result::Result<T, ProtocolError>;

/// Which part of a frame exceeded its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSection {
    Path,
    Frame,
}

impl core::fmt::Display for FrameSection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameSection::Path => f.write_str("path"),
            FrameSection::Frame => f.write_str("frame"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{section} too large: {size} bytes, max {max}")]
    FrameTooLarge {
        section: FrameSection,
        size: usize,
        max: usize,
    },

    #[error("insufficient data: needed {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid token length {0}")]
    InvalidTokenLength(u8),

    #[error("invalid option header {0:#04X}")]
    InvalidOption(u8),

    #[error("payload marker without payload")]
    EmptyPayload,

    #[error("invalid power status {0}")]
    InvalidStatus(u8),
}
