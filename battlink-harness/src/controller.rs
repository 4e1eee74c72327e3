use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use battlink_core::protocol::TELEMETRY_FRAME_SIZE;
use battlink_core::{
    Frame, MessageType, Method, ParsedFrame, ProtocolError, ResponseCode, TelemetryRecord,
    encode_response, paths, replies,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approval {
    Grant,
    Deny,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub approval: Approval,
    /// Connect requests answered with `pending` before granting.
    pub approve_after: u32,
    /// Stop answering heartbeats once this much time has passed.
    pub silent_after: Option<Duration>,
}

#[derive(Debug, Default)]
struct DeviceSession {
    connect_requests: u32,
    approved: bool,
    reports: u64,
}

/// Simulated controller: answers heartbeats and decides on connect
/// requests, one session per device address.
pub struct Controller {
    config: ControllerConfig,
    sessions: HashMap<SocketAddr, DeviceSession>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Handle one datagram and return the reply to send back, if any.
    pub fn handle(
        &mut self,
        src: SocketAddr,
        datagram: &[u8],
        uptime: Duration,
    ) -> Result<Option<Frame>, ProtocolError> {
        let request = Frame::parse(datagram)?;

        let Some(method) = request.method() else {
            debug!(%src, code = request.code, "Ignoring non-request datagram");
            return Ok(None);
        };

        match (method, request.path.as_str()) {
            (Method::Get, paths::HEARTBEAT) => {
                if self.config.silent_after.is_some_and(|after| uptime >= after) {
                    debug!(%src, "Staying silent on heartbeat");
                    return Ok(None);
                }
                reply(&request, ResponseCode::Content, replies::ALIVE).map(Some)
            }
            (Method::Put, paths::CONNECT) => {
                let text = self.connect(src);
                reply(&request, ResponseCode::Changed, text).map(Some)
            }
            (Method::Put, paths::BATTERY) => {
                let code = self.report(src, request.payload);
                reply(&request, code, "").map(Some)
            }
            (Method::Put, paths::DISCONNECT) => {
                self.sessions.remove(&src);
                info!(%src, "Device disconnected");
                reply(&request, ResponseCode::Changed, "").map(Some)
            }
            (method, path) => {
                warn!(%src, %method, path, "Unknown route");
                reply(&request, ResponseCode::NotFound, "").map(Some)
            }
        }
    }

    pub fn is_approved(&self, device: SocketAddr) -> bool {
        self.sessions.get(&device).is_some_and(|s| s.approved)
    }

    pub fn reports(&self, device: SocketAddr) -> u64 {
        self.sessions.get(&device).map_or(0, |s| s.reports)
    }

    fn connect(&mut self, src: SocketAddr) -> &'static str {
        let session = self.sessions.entry(src).or_default();

        if self.config.approval == Approval::Deny {
            info!(%src, "Connection request denied");
            return replies::DENIED;
        }

        if session.approved {
            return replies::ONLINE;
        }

        session.connect_requests += 1;
        if session.connect_requests > self.config.approve_after {
            session.approved = true;
            info!(%src, requests = session.connect_requests, "Connection approved");
            replies::ONLINE
        } else {
            info!(%src, requests = session.connect_requests, "Connection request pending");
            replies::PENDING
        }
    }

    fn report(&mut self, src: SocketAddr, payload: &[u8]) -> ResponseCode {
        let Some(session) = self.sessions.get_mut(&src).filter(|s| s.approved) else {
            warn!(%src, "Report from unapproved device");
            return ResponseCode::Forbidden;
        };

        session.reports += 1;

        if payload.len() == TELEMETRY_FRAME_SIZE {
            match TelemetryRecord::decode(payload) {
                Ok(record) => {
                    info!(
                        %src,
                        voltage_mv = record.voltage_mv,
                        current_ma = record.current_ma,
                        status = ?record.status,
                        temperature_c = record.temperature_c,
                        timestamp = record.timestamp,
                        "Telemetry received"
                    );
                    return ResponseCode::Changed;
                }
                Err(e) => {
                    warn!(%src, error = %e, "Malformed telemetry");
                    return ResponseCode::BadRequest;
                }
            }
        }

        info!(%src, text = %String::from_utf8_lossy(payload), "Telemetry received");
        ResponseCode::Changed
    }
}

fn reply(request: &ParsedFrame<'_>, code: ResponseCode, text: &str) -> Result<Frame, ProtocolError> {
    encode_response(
        MessageType::Acknowledgement,
        code,
        request.message_id,
        text.as_bytes(),
    )
}
