//! Liveness and authorization tracking for the controller link.
//!
//! All transitions go through [`ConnectionState::apply`], which never
//! leaves `authorized` set while `peer_alive` is clear.

use std::time::Duration;

use battlink_core::{Method, bodies, paths, replies};

/// Controller reply, matched exactly against the known texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Alive,
    Online,
    Pending,
    Denied,
    Unrecognized,
}

impl Response {
    pub fn from_payload(payload: &[u8]) -> Self {
        match core::str::from_utf8(payload) {
            Ok(replies::ALIVE) => Response::Alive,
            Ok(replies::ONLINE) => Response::Online,
            Ok(replies::PENDING) => Response::Pending,
            Ok(replies::DENIED) => Response::Denied,
            _ => Response::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Response(Response),
    LivenessCheck { timeout: Duration },
    Disconnect,
}

/// Log-worthy outcome of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    PeerDetected,
    Authorized,
    AuthorizationPending,
    AuthorizationDenied,
    LivenessLost { silent_for: Duration },
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No liveness signal seen yet.
    Unknown,
    /// Liveness was seen once and has since been lost.
    Searching,
    ConnectedUnauthorized,
    ConnectedAuthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// GET `heartbeat`.
    Probe,
    /// PUT `connect` with `REQ`.
    RequestAuthorization,
    /// PUT `battery` with the current telemetry.
    Report,
}

impl Action {
    pub fn method(self) -> Method {
        match self {
            Action::Probe => Method::Get,
            Action::RequestAuthorization | Action::Report => Method::Put,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Action::Probe => paths::HEARTBEAT,
            Action::RequestAuthorization => paths::CONNECT,
            Action::Report => paths::BATTERY,
        }
    }

    /// Fixed body, if the action has one. Reports are built per cycle.
    pub fn static_body(self) -> &'static [u8] {
        match self {
            Action::RequestAuthorization => bodies::CONNECT_REQUEST,
            Action::Probe | Action::Report => &[],
        }
    }
}

/// Requests of one decision cycle, in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePlan {
    follow_up: Option<Action>,
}

impl CyclePlan {
    pub fn is_search_only(&self) -> bool {
        self.follow_up.is_none()
    }

    pub fn actions(self) -> impl Iterator<Item = Action> {
        core::iter::once(Action::Probe).chain(self.follow_up)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    peer_alive: bool,
    authorized: bool,
    last_liveness_at: Option<Duration>,
    last_action_at: Duration,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_alive(&self) -> bool {
        self.peer_alive
    }

    pub fn authorized(&self) -> bool {
        self.authorized
    }

    pub fn last_liveness_at(&self) -> Option<Duration> {
        self.last_liveness_at
    }

    pub fn last_action_at(&self) -> Duration {
        self.last_action_at
    }

    pub fn link_state(&self) -> LinkState {
        match (self.peer_alive, self.authorized) {
            (true, true) => LinkState::ConnectedAuthorized,
            (true, false) => LinkState::ConnectedUnauthorized,
            (false, _) if self.last_liveness_at.is_some() => LinkState::Searching,
            (false, _) => LinkState::Unknown,
        }
    }

    pub fn apply(self, event: Event, now: Duration) -> (Self, Option<Notice>) {
        let mut next = self;

        let notice = match event {
            Event::Response(Response::Alive) => {
                next.peer_alive = true;
                next.last_liveness_at = Some(now);
                (!self.peer_alive).then_some(Notice::PeerDetected)
            }
            Event::Response(Response::Online) => {
                // a late grant after the peer went silent must not authorize
                if !self.peer_alive {
                    return (self, None);
                }
                next.authorized = true;
                (!self.authorized).then_some(Notice::Authorized)
            }
            Event::Response(Response::Pending) => {
                next.authorized = false;
                Some(Notice::AuthorizationPending)
            }
            Event::Response(Response::Denied) => {
                next.authorized = false;
                Some(Notice::AuthorizationDenied)
            }
            Event::Response(Response::Unrecognized) => None,
            Event::LivenessCheck { timeout } => {
                let silent_for = self
                    .last_liveness_at
                    .map(|at| now.saturating_sub(at))
                    .unwrap_or_default();

                if self.peer_alive && silent_for > timeout {
                    next.peer_alive = false;
                    next.authorized = false;
                    Some(Notice::LivenessLost { silent_for })
                } else {
                    None
                }
            }
            Event::Disconnect => {
                next.authorized = false;
                Some(Notice::Disconnected)
            }
        };

        (next, notice)
    }

    pub fn cycle_due(&self, now: Duration, cadence: Duration) -> bool {
        now.saturating_sub(self.last_action_at) >= cadence
    }

    pub fn plan_cycle(&self) -> CyclePlan {
        let follow_up = match (self.peer_alive, self.authorized) {
            (false, _) => None,
            (true, false) => Some(Action::RequestAuthorization),
            (true, true) => Some(Action::Report),
        };

        CyclePlan { follow_up }
    }

    pub fn mark_action(&mut self, now: Duration) {
        self.last_action_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(40);

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn respond(state: ConnectionState, response: Response, at: u64) -> ConnectionState {
        state.apply(Event::Response(response), secs(at)).0
    }

    fn liveness(state: ConnectionState, at: u64) -> (ConnectionState, Option<Notice>) {
        state.apply(Event::LivenessCheck { timeout: TIMEOUT }, secs(at))
    }

    fn authorized_state() -> ConnectionState {
        let state = respond(ConnectionState::new(), Response::Alive, 0);
        respond(state, Response::Online, 0)
    }

    #[test]
    fn response_matching_is_exact() {
        assert_eq!(Response::from_payload(b"ALIVE"), Response::Alive);
        assert_eq!(Response::from_payload(b"online"), Response::Online);
        assert_eq!(Response::from_payload(b"pending"), Response::Pending);
        assert_eq!(Response::from_payload(b"denied"), Response::Denied);
        assert_eq!(Response::from_payload(b"alive"), Response::Unrecognized);
        assert_eq!(Response::from_payload(b"ONLINE"), Response::Unrecognized);
        assert_eq!(Response::from_payload(b"ALIVE "), Response::Unrecognized);
        assert_eq!(Response::from_payload(b""), Response::Unrecognized);
        assert_eq!(Response::from_payload(&[0xFF, 0xFE]), Response::Unrecognized);
    }

    #[test]
    fn starts_unknown() {
        let state = ConnectionState::new();

        assert!(!state.peer_alive());
        assert!(!state.authorized());
        assert_eq!(state.link_state(), LinkState::Unknown);
    }

    #[test]
    fn alive_sets_liveness_without_touching_authorization() {
        let (state, notice) =
            ConnectionState::new().apply(Event::Response(Response::Alive), secs(3));

        assert!(state.peer_alive());
        assert!(!state.authorized());
        assert_eq!(state.last_liveness_at(), Some(secs(3)));
        assert_eq!(notice, Some(Notice::PeerDetected));

        let authorized = authorized_state();
        let (state, notice) = authorized.apply(Event::Response(Response::Alive), secs(9));
        assert!(state.authorized());
        assert_eq!(state.last_liveness_at(), Some(secs(9)));
        assert_eq!(notice, None);
    }

    #[test]
    fn denied_and_pending_always_clear_authorization() {
        for response in [Response::Denied, Response::Pending] {
            let state = respond(authorized_state(), response, 1);
            assert!(!state.authorized());
            assert!(state.peer_alive());

            let state = respond(ConnectionState::new(), response, 1);
            assert!(!state.authorized());
        }
    }

    #[test]
    fn online_requires_a_live_peer() {
        let (state, notice) =
            ConnectionState::new().apply(Event::Response(Response::Online), secs(1));

        assert!(!state.authorized());
        assert_eq!(notice, None);
    }

    #[test]
    fn online_notice_only_on_grant() {
        let alive = respond(ConnectionState::new(), Response::Alive, 0);

        let (state, notice) = alive.apply(Event::Response(Response::Online), secs(1));
        assert!(state.authorized());
        assert_eq!(state.link_state(), LinkState::ConnectedAuthorized);
        assert_eq!(notice, Some(Notice::Authorized));

        let (_, notice) = state.apply(Event::Response(Response::Online), secs(2));
        assert_eq!(notice, None);
    }

    #[test]
    fn unrecognized_is_ignored() {
        let state = authorized_state();
        let (next, notice) = state.apply(Event::Response(Response::Unrecognized), secs(5));

        assert_eq!(next, state);
        assert_eq!(notice, None);
    }

    #[test]
    fn liveness_timeout_scenario() {
        let state = respond(ConnectionState::new(), Response::Alive, 0);
        let state = respond(state, Response::Online, 1);

        let (state, notice) = liveness(state, 35);
        assert!(state.peer_alive());
        assert!(state.authorized());
        assert_eq!(notice, None);

        // exactly at the threshold is still alive
        let (state, notice) = liveness(state, 40);
        assert!(state.peer_alive());
        assert_eq!(notice, None);

        let (state, notice) = liveness(state, 41);
        assert!(!state.peer_alive());
        assert!(!state.authorized());
        assert_eq!(state.link_state(), LinkState::Searching);
        assert_eq!(
            notice,
            Some(Notice::LivenessLost {
                silent_for: secs(41)
            })
        );

        let (_, notice) = liveness(state, 90);
        assert_eq!(notice, None);
    }

    #[test]
    fn fresh_alive_resets_timeout() {
        let state = respond(ConnectionState::new(), Response::Alive, 0);
        let state = respond(state, Response::Alive, 30);

        let (state, _) = liveness(state, 65);
        assert!(state.peer_alive());

        let (state, _) = liveness(state, 71);
        assert!(!state.peer_alive());
    }

    #[test]
    fn peer_recovers_after_loss() {
        let state = respond(ConnectionState::new(), Response::Alive, 0);
        let (state, _) = liveness(state, 50);
        assert_eq!(state.link_state(), LinkState::Searching);

        let (state, notice) = state.apply(Event::Response(Response::Alive), secs(55));
        assert_eq!(state.link_state(), LinkState::ConnectedUnauthorized);
        assert_eq!(notice, Some(Notice::PeerDetected));
    }

    #[test]
    fn disconnect_keeps_liveness() {
        let (state, notice) = authorized_state().apply(Event::Disconnect, secs(10));

        assert!(state.peer_alive());
        assert!(!state.authorized());
        assert_eq!(notice, Some(Notice::Disconnected));
    }

    #[test]
    fn plan_per_state() {
        let searching: Vec<_> = ConnectionState::new().plan_cycle().actions().collect();
        assert_eq!(searching, vec![Action::Probe]);

        let alive = respond(ConnectionState::new(), Response::Alive, 0);
        let plan = alive.plan_cycle();
        assert!(!plan.is_search_only());
        assert_eq!(
            plan.actions().collect::<Vec<_>>(),
            vec![Action::Probe, Action::RequestAuthorization]
        );

        let reporting: Vec<_> = authorized_state().plan_cycle().actions().collect();
        assert_eq!(reporting, vec![Action::Probe, Action::Report]);
    }

    #[test]
    fn cadence_gate() {
        let mut state = ConnectionState::new();
        let cadence = secs(5);

        assert!(!state.cycle_due(secs(4), cadence));
        assert!(state.cycle_due(secs(5), cadence));

        state.mark_action(secs(5));
        assert!(!state.cycle_due(secs(9), cadence));
        assert!(state.cycle_due(secs(10), cadence));
    }

    #[test]
    fn actions_map_to_requests() {
        assert_eq!(Action::Probe.method(), Method::Get);
        assert_eq!(Action::Probe.path(), "heartbeat");
        assert!(Action::Probe.static_body().is_empty());

        assert_eq!(Action::RequestAuthorization.method(), Method::Put);
        assert_eq!(Action::RequestAuthorization.path(), "connect");
        assert_eq!(Action::RequestAuthorization.static_body(), b"REQ");

        assert_eq!(Action::Report.method(), Method::Put);
        assert_eq!(Action::Report.path(), "battery");
    }
}
