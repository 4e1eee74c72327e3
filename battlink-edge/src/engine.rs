use crate::Action;
use crate::Clock;
use crate::ConnectionState;
use crate::Event;
use crate::LinkConfig;
use crate::Notice;
use crate::Response;
use crate::TelemetryConfig;
use crate::TelemetryEncoding;
use crate::TelemetrySource;
use crate::TimestampClock;
use crate::Transport;
use crate::TransportError;

use std::net::SocketAddr;
use std::time::Duration;

use battlink_core::{Frame, FrameBuilder, MessageId, Method, ProtocolError, bodies, paths};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Largest datagram read from the transport in one go.
const MAX_DATAGRAM_SIZE: usize = 1152;
/// Upper bound on datagrams handled per loop iteration.
const MAX_DATAGRAMS_PER_STEP: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("frame rejected: {0}")]
    Frame(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Drives the controller link: drains inbound replies, enforces the
/// liveness timeout and runs one decision cycle per cadence interval.
pub struct Engine<T: Transport, S: TelemetrySource> {
    transport: T,
    source: S,
    frames: FrameBuilder,
    state: ConnectionState,
    link: LinkConfig,
    telemetry: TelemetryConfig,
}

impl<T: Transport, S: TelemetrySource> Engine<T, S> {
    pub fn new(transport: T, source: S, link: LinkConfig, telemetry: TelemetryConfig) -> Self {
        Self {
            transport,
            source,
            frames: FrameBuilder::new(),
            state: ConnectionState::new(),
            link,
            telemetry,
        }
    }

    pub fn with_frame_builder(mut self, frames: FrameBuilder) -> Self {
        self.frames = frames;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn next_message_id(&self) -> MessageId {
        self.frames.next_message_id()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Poll until cancelled, then send the disconnect request.
    #[instrument(name = "engine", skip_all)]
    pub async fn run<C: Clock>(&mut self, clock: &C, cancel: CancellationToken) {
        info!(
            cadence_secs = self.link.cadence_secs,
            liveness_timeout_secs = self.link.liveness_timeout_secs,
            "Engine started"
        );

        let mut ticker = tokio::time::interval(self.link.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Engine shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.step(clock.now());
                }
            }
        }

        self.disconnect(clock.now());
    }

    /// One loop iteration. Never blocks.
    pub fn step(&mut self, now: Duration) {
        self.pump(now);
        self.check_liveness(now);

        if self.state.cycle_due(now, self.link.cadence()) {
            self.run_cycle(now);
        }
    }

    fn pump(&mut self, now: Duration) {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        for _ in 0..MAX_DATAGRAMS_PER_STEP {
            match self.transport.try_recv(&mut buf) {
                Ok(Some((src, len))) => self.handle_datagram(src, &buf[..len], now),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Receive failed");
                    break;
                }
            }
        }
    }

    pub fn handle_datagram(&mut self, src: SocketAddr, datagram: &[u8], now: Duration) {
        let frame = match Frame::parse(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%src, error = %e, "Dropping malformed datagram");
                return;
            }
        };

        if !frame.is_response() {
            debug!(%src, code = frame.code, "Ignoring non-response datagram");
            return;
        }

        debug!(%src, message_id = frame.message_id.0, "Response received");
        self.handle_response(frame.payload, now);
    }

    pub fn handle_response(&mut self, payload: &[u8], now: Duration) {
        let response = Response::from_payload(payload);

        if response == Response::Unrecognized {
            debug!(
                payload = %String::from_utf8_lossy(payload),
                "Ignoring unrecognized response"
            );
        }

        self.apply(Event::Response(response), now);
    }

    pub fn check_liveness(&mut self, now: Duration) {
        self.apply(
            Event::LivenessCheck {
                timeout: self.link.liveness_timeout(),
            },
            now,
        );
    }

    /// Send this cycle's requests. Returns how many went out.
    pub fn run_cycle(&mut self, now: Duration) -> usize {
        let plan = self.state.plan_cycle();

        if plan.is_search_only() {
            info!("Searching for controller liveness");
        }

        let mut sent = 0;
        for action in plan.actions() {
            if self.perform(action, now) {
                sent += 1;
            }
        }

        self.state.mark_action(now);
        sent
    }

    /// Send the disconnect request, then drop authorization regardless of
    /// whether the request made it out.
    pub fn disconnect(&mut self, now: Duration) {
        match self.send(Method::Put, paths::DISCONNECT, bodies::DISCONNECT_REQUEST) {
            Ok(message_id) => info!(message_id = message_id.0, "Disconnect request sent"),
            Err(e) => warn!(error = %e, "Disconnect request not sent"),
        }

        self.apply(Event::Disconnect, now);
    }

    fn perform(&mut self, action: Action, now: Duration) -> bool {
        let result = match action {
            Action::Probe | Action::RequestAuthorization => {
                self.send(action.method(), action.path(), action.static_body())
            }
            Action::Report => {
                let timestamp = self.timestamp(now);
                let record = self.source.sample(timestamp);

                match self.telemetry.encoding {
                    TelemetryEncoding::Binary => {
                        self.send(action.method(), action.path(), &record.encode())
                    }
                    TelemetryEncoding::Text => {
                        let text = record.to_text();
                        info!(voltage = %text, "Reporting telemetry");
                        self.send(action.method(), action.path(), text.as_bytes())
                    }
                }
            }
        };

        match result {
            Ok(message_id) => {
                debug!(?action, message_id = message_id.0, "Request sent");
                true
            }
            Err(SendError::Frame(e)) => {
                error!(?action, error = %e, "Request could not be encoded");
                false
            }
            Err(SendError::Transport(e)) => {
                warn!(?action, error = %e, "Request not delivered");
                false
            }
        }
    }

    fn send(&mut self, method: Method, path: &str, payload: &[u8]) -> Result<MessageId, SendError> {
        let frame = self.frames.build(method, path, payload)?;
        self.transport.send(frame.as_bytes())?;
        Ok(frame.message_id())
    }

    fn apply(&mut self, event: Event, now: Duration) {
        let (next, notice) = self.state.apply(event, now);
        self.state = next;

        match notice {
            Some(Notice::PeerDetected) => info!("Controller liveness detected"),
            Some(Notice::Authorized) => info!("Operator approved the connection, reporting"),
            Some(Notice::AuthorizationPending) => info!("Waiting for operator authorization"),
            Some(Notice::AuthorizationDenied) => warn!("Connection request denied"),
            Some(Notice::LivenessLost { silent_for }) => warn!(
                silent_for_secs = silent_for.as_secs(),
                "Controller lost, authorization revoked"
            ),
            Some(Notice::Disconnected) => info!("Authorization dropped locally"),
            None => {}
        }
    }

    fn timestamp(&self, now: Duration) -> u32 {
        let secs = match self.telemetry.clock {
            TimestampClock::Boot => now.as_secs(),
            TimestampClock::Epoch => jiff::Timestamp::now().as_second().max(0) as u64,
        };

        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}
