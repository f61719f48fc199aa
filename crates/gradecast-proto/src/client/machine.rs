//! Sans-IO client connection state machine.
//!
//! [`ClientMachine`] performs no I/O and owns no timers. The driver feeds it
//! transport signals and decoded frames, and executes the [`ClientAction`]s it
//! returns.

use crate::event::{ClientEvent, ServerEvent};
use crate::identity::{Credentials, Identity};
use std::time::Duration;

/// Default delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Client-side connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// No socket. A reconnect may be scheduled.
    #[default]
    Disconnected,
    /// Connect attempt in flight.
    Connecting,
    /// Socket open, identity not yet sent.
    Connected,
    /// `authenticate` sent, waiting for the acknowledgement.
    Authenticating,
    /// Authenticated and receiving events.
    Synced,
    /// The broker refused the identity. No further attempts are made until
    /// a new identity is supplied.
    Rejected,
    /// Torn down by the owner.
    Shutdown,
}

/// Work the driver must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a new socket, then report `on_open` or `on_disconnect`.
    Connect,
    /// Write this event to the socket.
    Send(ClientEvent),
    /// Hand this event to the application.
    Deliver(ServerEvent),
    /// Arm the reconnect timer, then report `on_reconnect_timer`.
    ScheduleReconnect(Duration),
    /// Close the socket and disarm any timer.
    Close,
}

/// Connection lifecycle for one identity.
#[derive(Debug, Clone)]
pub struct ClientMachine {
    identity: Identity,
    state: ClientState,
    reconnect_delay: Duration,
    reconnect_pending: bool,
}

impl ClientMachine {
    pub fn new(identity: Identity) -> Self {
        Self::with_reconnect_delay(identity, DEFAULT_RECONNECT_DELAY)
    }

    pub fn with_reconnect_delay(identity: Identity, reconnect_delay: Duration) -> Self {
        Self {
            identity,
            state: ClientState::Disconnected,
            reconnect_delay,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Begin the first connection attempt.
    pub fn start(&mut self) -> Vec<ClientAction> {
        if self.state != ClientState::Disconnected || self.reconnect_pending {
            return Vec::new();
        }
        self.state = ClientState::Connecting;
        vec![ClientAction::Connect]
    }

    /// The socket opened; authenticate straight away.
    pub fn on_open(&mut self) -> Vec<ClientAction> {
        if self.state != ClientState::Connecting {
            return Vec::new();
        }
        self.state = ClientState::Connected;
        let hello = ClientEvent::Authenticate(Credentials::from(&self.identity));
        self.state = ClientState::Authenticating;
        vec![ClientAction::Send(hello)]
    }

    /// A frame arrived from the broker.
    pub fn on_event(&mut self, event: ServerEvent) -> Vec<ClientAction> {
        match (&event, self.state) {
            (ServerEvent::Authenticated(outcome), ClientState::Authenticating) => {
                if outcome.success {
                    self.state = ClientState::Synced;
                    let mut actions = vec![ClientAction::Deliver(event)];
                    if self.identity.is_admin() {
                        actions.push(ClientAction::Send(ClientEvent::RequestSnapshot));
                    }
                    actions
                } else {
                    self.state = ClientState::Rejected;
                    vec![ClientAction::Deliver(event), ClientAction::Close]
                }
            }
            (_, ClientState::Authenticating | ClientState::Synced) => {
                vec![ClientAction::Deliver(event)]
            }
            _ => Vec::new(),
        }
    }

    /// Connect failed or the socket closed.
    pub fn on_disconnect(&mut self) -> Vec<ClientAction> {
        match self.state {
            ClientState::Shutdown | ClientState::Rejected => Vec::new(),
            _ => {
                self.state = ClientState::Disconnected;
                if self.reconnect_pending {
                    return Vec::new();
                }
                self.reconnect_pending = true;
                vec![ClientAction::ScheduleReconnect(self.reconnect_delay)]
            }
        }
    }

    /// The reconnect timer fired.
    pub fn on_reconnect_timer(&mut self) -> Vec<ClientAction> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        if self.state != ClientState::Disconnected {
            return Vec::new();
        }
        self.state = ClientState::Connecting;
        vec![ClientAction::Connect]
    }

    /// Replace the identity. Used on the next authentication; a rejected
    /// machine starts over with it.
    pub fn set_identity(&mut self, identity: Identity) -> Vec<ClientAction> {
        self.identity = identity;
        if self.state != ClientState::Rejected {
            return Vec::new();
        }
        self.state = ClientState::Connecting;
        vec![ClientAction::Connect]
    }

    /// Tear down. Terminal.
    pub fn shutdown(&mut self) -> Vec<ClientAction> {
        if self.state == ClientState::Shutdown {
            return Vec::new();
        }
        self.state = ClientState::Shutdown;
        self.reconnect_pending = false;
        vec![ClientAction::Close]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Snapshot;
    use crate::identity::Role;

    fn faculty() -> ClientMachine {
        ClientMachine::new(Identity::new(Role::Faculty, "F1", "Ms. Reyes"))
    }

    fn admin() -> ClientMachine {
        ClientMachine::new(Identity::new(Role::Admin, "A1", "Principal"))
    }

    fn synced(mut m: ClientMachine) -> ClientMachine {
        m.start();
        m.on_open();
        m.on_event(ServerEvent::auth_ok());
        m
    }

    #[test]
    fn open_sends_stored_identity() {
        let mut m = faculty();
        assert_eq!(m.start(), vec![ClientAction::Connect]);
        assert_eq!(m.state(), ClientState::Connecting);

        let actions = m.on_open();
        assert_eq!(m.state(), ClientState::Authenticating);
        let [ClientAction::Send(ClientEvent::Authenticate(creds))] = actions.as_slice() else {
            panic!("expected one authenticate, got {actions:?}");
        };
        assert_eq!(creds.role, "faculty");
        assert_eq!(creds.user_id, "F1");
    }

    #[test]
    fn faculty_ack_does_not_request_snapshot() {
        let mut m = faculty();
        m.start();
        m.on_open();
        let actions = m.on_event(ServerEvent::auth_ok());
        assert_eq!(m.state(), ClientState::Synced);
        assert_eq!(actions, vec![ClientAction::Deliver(ServerEvent::auth_ok())]);
    }

    #[test]
    fn admin_ack_requests_snapshot() {
        let mut m = admin();
        m.start();
        m.on_open();
        let actions = m.on_event(ServerEvent::auth_ok());
        assert_eq!(
            actions,
            vec![
                ClientAction::Deliver(ServerEvent::auth_ok()),
                ClientAction::Send(ClientEvent::RequestSnapshot),
            ]
        );
    }

    #[test]
    fn rejection_is_terminal() {
        let mut m = faculty();
        m.start();
        m.on_open();
        let actions = m.on_event(ServerEvent::auth_failed("invalid role"));
        assert_eq!(m.state(), ClientState::Rejected);
        assert_eq!(actions.last(), Some(&ClientAction::Close));
        assert!(m.on_disconnect().is_empty());
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn new_identity_restarts_after_rejection() {
        let mut m = faculty();
        m.start();
        m.on_open();
        m.on_event(ServerEvent::auth_failed("missing user id"));
        let actions = m.set_identity(Identity::new(Role::Faculty, "F2", ""));
        assert_eq!(actions, vec![ClientAction::Connect]);
        assert_eq!(m.state(), ClientState::Connecting);
        assert_eq!(m.identity().user_id, "F2");
    }

    #[test]
    fn unexpected_close_schedules_one_reconnect() {
        let mut m = synced(faculty());
        assert_eq!(
            m.on_disconnect(),
            vec![ClientAction::ScheduleReconnect(DEFAULT_RECONNECT_DELAY)]
        );
        assert_eq!(m.state(), ClientState::Disconnected);
        // A second signal while the timer is armed adds nothing.
        assert!(m.on_disconnect().is_empty());
        assert!(m.start().is_empty());

        assert_eq!(m.on_reconnect_timer(), vec![ClientAction::Connect]);
        assert!(!m.reconnect_pending());
        assert!(m.on_reconnect_timer().is_empty());
    }

    #[test]
    fn failed_connect_keeps_retrying() {
        let mut m = ClientMachine::with_reconnect_delay(
            Identity::new(Role::Faculty, "F1", ""),
            Duration::from_millis(10),
        );
        m.start();
        for _ in 0..3 {
            assert_eq!(
                m.on_disconnect(),
                vec![ClientAction::ScheduleReconnect(Duration::from_millis(10))]
            );
            assert_eq!(m.on_reconnect_timer(), vec![ClientAction::Connect]);
        }
        assert_eq!(m.state(), ClientState::Connecting);
    }

    #[test]
    fn reconnect_authenticates_again() {
        let mut m = synced(admin());
        m.on_disconnect();
        m.on_reconnect_timer();
        let actions = m.on_open();
        assert!(matches!(
            actions.as_slice(),
            [ClientAction::Send(ClientEvent::Authenticate(_))]
        ));
        let actions = m.on_event(ServerEvent::auth_ok());
        assert!(actions.contains(&ClientAction::Send(ClientEvent::RequestSnapshot)));
    }

    #[test]
    fn events_delivered_only_while_connected() {
        let mut m = synced(admin());
        let snap = ServerEvent::Snapshot(Snapshot::default());
        assert_eq!(m.on_event(snap.clone()), vec![ClientAction::Deliver(snap.clone())]);
        m.on_disconnect();
        assert!(m.on_event(snap).is_empty());
    }

    #[test]
    fn shutdown_disarms_timer() {
        let mut m = synced(faculty());
        m.on_disconnect();
        assert!(m.reconnect_pending());
        assert_eq!(m.shutdown(), vec![ClientAction::Close]);
        assert_eq!(m.state(), ClientState::Shutdown);
        assert!(m.on_reconnect_timer().is_empty());
        assert!(m.on_disconnect().is_empty());
        assert!(m.shutdown().is_empty());
    }
}
