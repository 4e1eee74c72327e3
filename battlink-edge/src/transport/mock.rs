use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use super::{Transport, TransportError};

/// In-memory transport that records every frame sent and replays
/// queued datagrams.
pub struct MockTransport {
    peer: SocketAddr,
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<(SocketAddr, Vec<u8>)>,
    fail_sends: bool,
}

impl MockTransport {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            sent: Vec::new(),
            inbound: VecDeque::new(),
            fail_sends: false,
        }
    }

    /// Queue a datagram as if it came from the controller.
    pub fn push_inbound(&mut self, datagram: &[u8]) {
        self.inbound.push_back((self.peer, datagram.to_vec()));
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Make every following send fail, or succeed again.
    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::PeerUnreachable {
                peer: self.peer,
                source: io::Error::from(io::ErrorKind::HostUnreachable),
            });
        }

        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<(SocketAddr, usize)>, TransportError> {
        let Some((src, datagram)) = self.inbound.pop_front() else {
            return Ok(None);
        };

        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some((src, len)))
    }
}
