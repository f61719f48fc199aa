//! Identity registry: at most one live connection per user ID.
//!
//! Group membership is derived from the entries: every admin session is in
//! the admins group, and each user is alone in their private group.

use crate::state::ConnId;
use gradecast_proto::{Identity, Role, ServerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Events queued for one connection's writer.
pub type Outgoing = mpsc::UnboundedSender<Arc<ServerEvent>>;

/// Handle to an authenticated connection.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub conn_id: ConnId,
    pub identity: Identity,
    tx: Outgoing,
    orphaned: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn new(conn_id: ConnId, identity: Identity, tx: Outgoing) -> Self {
        Self {
            conn_id,
            identity,
            tx,
            orphaned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Queue an event for this connection. Fails once the connection task
    /// has dropped its receiver.
    pub fn send(&self, event: Arc<ServerEvent>) -> Result<(), Arc<ServerEvent>> {
        self.tx.send(event).map_err(|e| e.0)
    }

    /// Whether a newer authentication for the same user replaced this one.
    pub fn is_orphaned(&self) -> bool {
        self.orphaned.load(Ordering::Acquire)
    }

    fn mark_orphaned(&self) {
        self.orphaned.store(true, Ordering::Release);
    }
}

/// A broadcast audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group<'a> {
    /// Every authenticated admin.
    Admins,
    /// One user's own connection.
    Private(&'a str),
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, SessionHandle>,
}

impl Registry {
    /// Insert `handle`, replacing and orphaning any previous entry for the
    /// same user. Returns the replaced handle.
    pub fn insert(&mut self, handle: SessionHandle) -> Option<SessionHandle> {
        let previous = self.entries.insert(handle.user_id().to_string(), handle);
        if let Some(old) = &previous {
            old.mark_orphaned();
        }
        previous
    }

    pub fn get(&self, user_id: &str) -> Option<&SessionHandle> {
        self.entries.get(user_id)
    }

    /// Remove the entry for `user_id` only if it still belongs to `conn_id`.
    pub fn remove_if_current(&mut self, user_id: &str, conn_id: ConnId) -> Option<SessionHandle> {
        match self.entries.get(user_id) {
            Some(handle) if handle.conn_id == conn_id => self.entries.remove(user_id),
            _ => None,
        }
    }

    /// Current members of `group`.
    pub fn members<'a>(&'a self, group: Group<'a>) -> Box<dyn Iterator<Item = &'a SessionHandle> + 'a> {
        match group {
            Group::Admins => Box::new(
                self.entries
                    .values()
                    .filter(|h| h.identity.role == Role::Admin),
            ),
            Group::Private(user_id) => Box::new(self.entries.get(user_id).into_iter()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
