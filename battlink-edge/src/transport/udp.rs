use std::io::{self, ErrorKind};
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use super::{Transport, TransportError};

pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(local: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self.socket.try_send_to(frame, self.peer) {
            Ok(sent) if sent == frame.len() => Ok(()),
            Ok(sent) => Err(TransportError::ShortSend {
                peer: self.peer,
                sent,
                len: frame.len(),
            }),
            Err(e) if is_unreachable(&e) => Err(TransportError::PeerUnreachable {
                peer: self.peer,
                source: e,
            }),
            Err(e) => Err(TransportError::SendFailed {
                peer: self.peer,
                source: e,
            }),
        }
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<(SocketAddr, usize)>, TransportError> {
        match self.socket.try_recv_from(buf) {
            Ok((len, src)) => Ok(Some((src, len))),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }
}

fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable
    )
}
