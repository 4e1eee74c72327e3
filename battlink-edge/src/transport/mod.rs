pub mod mock;
pub mod udp;

pub use mock::MockTransport;
pub use udp::UdpTransport;

use std::io;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer {peer} unreachable: {source}")]
    PeerUnreachable {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("send to {peer} failed: {source}")]
    SendFailed {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("short send to {peer}: {sent} of {len} bytes")]
    ShortSend {
        peer: SocketAddr,
        sent: usize,
        len: usize,
    },

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),
}

/// Datagram link to the controller. Nothing here blocks.
pub trait Transport {
    /// Fire-and-forget send to the controller.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Take one pending datagram, if any, returning its source and length.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<(SocketAddr, usize)>, TransportError>;
}
