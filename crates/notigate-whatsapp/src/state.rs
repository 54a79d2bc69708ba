// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session state and its single transition function.
//!
//! [`SessionSnapshot::transition`] is the only code that mutates session
//! state. The supervisor publishes each snapshot on a `watch` channel; the
//! returned [`Effect`] tells the supervisor what to do next.

use notigate_core::DisconnectReason;
use serde::Serialize;

/// Where the single connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingPairing,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingPairing => "awaiting_pairing",
            ConnectionState::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the state machine.
///
/// Inputs raised by a connection carry its generation; inputs from any
/// generation other than the current one are stale and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A new connection attempt with this generation is being opened.
    ConnectStarted { generation: u64 },
    /// Opening the attempt failed before a connection object existed.
    ConnectFailed,
    /// The protocol wants the operator to scan a QR code.
    PairingRequested { generation: u64, token: String },
    Opened { generation: u64 },
    Closed {
        generation: u64,
        reason: DisconnectReason,
    },
    /// A send hit a socket-level failure on this connection.
    TransportLost { generation: u64 },
    /// A reconnect is wanted; honored only within the attempt budget.
    ReconnectRequested,
    /// A gated call found the session idle and is starting over.
    ManualConnect,
    /// Operator-requested teardown. Invalidates the old generation.
    Reset { generation: u64 },
    Shutdown,
}

/// What the supervisor must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Schedule reconnect attempt number `attempt` after the fixed delay.
    ScheduleReconnect { attempt: u32 },
    /// The transient close wants a reconnect; ask for one.
    RequestReconnect,
    /// The attempt budget is spent; only `force_reconnect` recovers.
    ReconnectExhausted,
    /// Credentials were invalidated remotely.
    LoggedOut,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    /// Generation of the current (or last) connection attempt.
    pub generation: u64,
    pub is_reconnecting: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Present only while awaiting authentication.
    pub pairing_token: Option<String>,
    /// Set by a permanent logout, cleared by a reset.
    pub logged_out: bool,
    pub shut_down: bool,
    /// The current generation has no link (closed, failed, or never opened).
    link_closed: bool,
}

impl SessionSnapshot {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            is_reconnecting: false,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            pairing_token: None,
            logged_out: false,
            shut_down: false,
            link_closed: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn is_stale(&self, input: &Transition) -> bool {
        match input {
            Transition::PairingRequested { generation, .. }
            | Transition::Opened { generation }
            | Transition::Closed { generation, .. }
            | Transition::TransportLost { generation } => *generation != self.generation,
            _ => false,
        }
    }

    /// Applies one input. Callers compare before and after to decide
    /// whether watchers need waking.
    pub fn transition(&mut self, input: Transition) -> Effect {
        if self.shut_down || self.is_stale(&input) {
            return Effect::None;
        }

        match input {
            Transition::ConnectStarted { generation } => {
                self.generation = generation;
                self.state = ConnectionState::Connecting;
                self.pairing_token = None;
                self.link_closed = false;
                Effect::None
            }
            Transition::ConnectFailed => {
                self.state = ConnectionState::Disconnected;
                self.is_reconnecting = false;
                self.pairing_token = None;
                self.link_closed = true;
                Effect::None
            }
            Transition::PairingRequested { token, .. } => {
                if self.state == ConnectionState::Connected || self.link_closed {
                    return Effect::None;
                }
                self.state = ConnectionState::AwaitingPairing;
                self.pairing_token = Some(token);
                Effect::None
            }
            Transition::Opened { .. } => {
                if self.link_closed {
                    return Effect::None;
                }
                self.state = ConnectionState::Connected;
                self.is_reconnecting = false;
                self.reconnect_attempts = 0;
                self.pairing_token = None;
                self.logged_out = false;
                Effect::None
            }
            Transition::Closed { reason, .. } => {
                if self.link_closed {
                    return Effect::None;
                }
                self.link_closed = true;
                self.state = ConnectionState::Disconnected;
                self.pairing_token = None;
                // A close ends whatever attempt was in flight.
                self.is_reconnecting = false;
                if reason.is_permanent() {
                    self.logged_out = true;
                    Effect::LoggedOut
                } else {
                    Effect::RequestReconnect
                }
            }
            Transition::TransportLost { .. } => {
                if self.state == ConnectionState::Connected {
                    self.state = ConnectionState::Disconnected;
                }
                Effect::None
            }
            Transition::ReconnectRequested => {
                if self.is_reconnecting || self.logged_out {
                    return Effect::None;
                }
                if self.reconnect_attempts >= self.max_reconnect_attempts {
                    return Effect::ReconnectExhausted;
                }
                self.is_reconnecting = true;
                self.reconnect_attempts += 1;
                Effect::ScheduleReconnect {
                    attempt: self.reconnect_attempts,
                }
            }
            Transition::ManualConnect => {
                self.reconnect_attempts = 0;
                Effect::None
            }
            Transition::Reset { generation } => {
                self.generation = generation;
                self.link_closed = true;
                self.state = ConnectionState::Disconnected;
                self.is_reconnecting = false;
                self.reconnect_attempts = 0;
                self.pairing_token = None;
                self.logged_out = false;
                Effect::None
            }
            Transition::Shutdown => {
                self.state = ConnectionState::Disconnected;
                self.is_reconnecting = false;
                self.pairing_token = None;
                self.link_closed = true;
                self.shut_down = true;
                Effect::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SessionSnapshot {
        let mut s = SessionSnapshot::new(5);
        s.transition(Transition::ConnectStarted { generation: 1 });
        s.transition(Transition::Opened { generation: 1 });
        s
    }

    fn closed(generation: u64, reason: DisconnectReason) -> Transition {
        Transition::Closed { generation, reason }
    }

    #[test]
    fn open_clears_pairing_token_and_attempts() {
        let mut s = SessionSnapshot::new(5);
        s.transition(Transition::ConnectStarted { generation: 1 });
        s.transition(Transition::PairingRequested {
            generation: 1,
            token: "qr-1".into(),
        });
        assert_eq!(s.state, ConnectionState::AwaitingPairing);
        assert_eq!(s.pairing_token.as_deref(), Some("qr-1"));

        s.reconnect_attempts = 3;
        s.transition(Transition::Opened { generation: 1 });
        assert!(s.is_connected());
        assert_eq!(s.pairing_token, None);
        assert_eq!(s.reconnect_attempts, 0);
    }

    #[test]
    fn transient_close_requests_reconnect() {
        let mut s = connected();
        let effect = s.transition(closed(1, DisconnectReason::ConnectionLost));
        assert_eq!(effect, Effect::RequestReconnect);
        assert_eq!(s.state, ConnectionState::Disconnected);
    }

    #[test]
    fn logout_is_terminal_until_reset() {
        let mut s = connected();
        assert_eq!(
            s.transition(closed(1, DisconnectReason::LoggedOut)),
            Effect::LoggedOut
        );
        assert!(s.logged_out);
        assert_eq!(s.transition(Transition::ReconnectRequested), Effect::None);
        assert!(!s.is_reconnecting);

        s.transition(Transition::Reset { generation: 2 });
        assert!(!s.logged_out);
        assert_eq!(s.generation, 2);
    }

    #[test]
    fn reconnect_budget_is_bounded() {
        let mut s = SessionSnapshot::new(5);
        for attempt in 1..=5 {
            assert_eq!(
                s.transition(Transition::ReconnectRequested),
                Effect::ScheduleReconnect { attempt }
            );
            // Attempt fails.
            s.transition(Transition::ConnectFailed);
        }
        assert_eq!(
            s.transition(Transition::ReconnectRequested),
            Effect::ReconnectExhausted
        );
        assert_eq!(s.reconnect_attempts, 5);
        assert!(!s.is_reconnecting);
    }

    #[test]
    fn reconnect_is_not_doubled_while_in_flight() {
        let mut s = SessionSnapshot::new(5);
        s.transition(Transition::ReconnectRequested);
        assert_eq!(s.transition(Transition::ReconnectRequested), Effect::None);
        assert_eq!(s.reconnect_attempts, 1);
    }

    #[test]
    fn never_reconnecting_while_connected() {
        let mut s = SessionSnapshot::new(5);
        s.transition(Transition::ReconnectRequested);
        s.transition(Transition::ConnectStarted { generation: 2 });
        assert!(s.is_reconnecting);
        s.transition(Transition::Opened { generation: 2 });
        assert!(s.is_connected() && !s.is_reconnecting);
    }

    #[test]
    fn duplicate_close_is_ignored() {
        let mut s = connected();
        s.transition(closed(1, DisconnectReason::ConnectionLost));
        assert_eq!(
            s.transition(closed(1, DisconnectReason::ConnectionLost)),
            Effect::None
        );
    }

    #[test]
    fn transport_loss_marks_disconnected() {
        let mut s = connected();
        s.transition(Transition::TransportLost { generation: 1 });
        assert_eq!(s.state, ConnectionState::Disconnected);
        assert!(!s.is_reconnecting);

        // The socket close that follows still schedules a reconnect.
        assert_eq!(
            s.transition(closed(1, DisconnectReason::ConnectionLost)),
            Effect::RequestReconnect
        );
    }

    #[test]
    fn stale_generation_events_are_ignored() {
        let mut s = connected();
        s.transition(Transition::Reset { generation: 2 });
        s.transition(Transition::ConnectStarted { generation: 3 });

        assert_eq!(
            s.transition(closed(1, DisconnectReason::ConnectionLost)),
            Effect::None
        );
        s.transition(Transition::Opened { generation: 1 });
        assert_eq!(s.state, ConnectionState::Connecting);
        assert_eq!(s.generation, 3);
    }

    #[test]
    fn shutdown_freezes_state() {
        let mut s = connected();
        s.transition(Transition::Shutdown);
        assert!(s.shut_down);
        s.transition(Transition::Opened { generation: 1 });
        assert_eq!(s.state, ConnectionState::Disconnected);
    }
}
