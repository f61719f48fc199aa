//! The Broker - routing state shared by every connection task.
//!
//! The identity registry and the pending-delivery store live in one
//! [`Directory`] behind one mutex. Registering a session drains its queue
//! while holding that lock, and `notify_user` decides between direct
//! delivery and queueing under the same lock, so an event can never be
//! parked for a user whose drain has already run for the current session.
//!
//! Nothing awaits while the lock is held: per-connection queues are
//! unbounded channels, so a send never blocks.

use crate::error::{BrokerError, Delivery};
use crate::metrics;
use crate::state::ConnIdGenerator;
use crate::state::ledger::RequestLedger;
use crate::state::managers::lifecycle::LifecycleManager;
use crate::state::managers::pending::PendingStore;
use crate::state::managers::registry::{Group, Registry, SessionHandle};
use crate::state::ConnId;
use gradecast_proto::{
    NewValidationRequest, ServerEvent, Snapshot, ValidationDecision, ValidationResponse,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Directory {
    registry: Registry,
    pending: PendingStore,
}

impl Directory {
    /// Hand `handle` everything queued for its user, oldest first. On a
    /// failed send the rest goes back to the queue and the dead entry is
    /// dropped.
    fn drain_into(&mut self, handle: &SessionHandle) -> usize {
        let user_id = handle.user_id();
        let mut queue = self.pending.take(user_id);
        let mut delivered = 0;
        while let Some(item) = queue.pop_front() {
            debug!(
                user_id = %user_id,
                event = item.kind(),
                queued_for = %item.queued_for(),
                "Delivering queued notification"
            );
            if handle.send(Arc::clone(&item.event)).is_err() {
                queue.push_front(item);
                self.pending.restore(user_id, queue);
                self.evict(user_id, handle.conn_id);
                metrics::record_miss("stale");
                break;
            }
            delivered += 1;
        }
        metrics::set_pending(self.pending.total());
        delivered
    }

    fn evict(&mut self, user_id: &str, conn_id: ConnId) -> bool {
        match self.registry.remove_if_current(user_id, conn_id) {
            Some(removed) => {
                metrics::session_closed(removed.identity.role.as_str());
                true
            }
            None => false,
        }
    }
}

/// Result of [`Broker::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Connection that previously held this user ID.
    pub superseded: Option<ConnId>,
    /// Pending notifications handed to the new connection.
    pub drained: usize,
}

/// Shared broker state.
pub struct Broker {
    directory: Mutex<Directory>,
    ledger: Arc<dyn RequestLedger>,
    conn_ids: ConnIdGenerator,
    pub lifecycle: LifecycleManager,
}

impl Broker {
    pub fn new(ledger: Arc<dyn RequestLedger>) -> Self {
        Self {
            directory: Mutex::new(Directory::default()),
            ledger,
            conn_ids: ConnIdGenerator::new(),
            lifecycle: LifecycleManager::new(),
        }
    }

    /// Allocate an ID for a freshly accepted socket.
    pub fn next_conn_id(&self) -> ConnId {
        self.conn_ids.next()
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Make `handle` the live connection for its user and deliver whatever
    /// was queued for them. Last authentication wins; the previous handle
    /// is marked orphaned.
    pub fn register(&self, handle: SessionHandle) -> Registration {
        let mut dir = self.directory.lock();
        let superseded = dir.registry.insert(handle.clone());
        if let Some(old) = &superseded {
            metrics::session_closed(old.identity.role.as_str());
            info!(
                user_id = %handle.user_id(),
                old_conn = %old.conn_id,
                new_conn = %handle.conn_id,
                "Session superseded"
            );
        }
        metrics::session_opened(handle.identity.role.as_str());

        let drained = dir.drain_into(&handle);
        if drained > 0 {
            metrics::record_delivered("drained", drained);
            debug!(user_id = %handle.user_id(), drained, "Pending notifications delivered");
        }

        Registration {
            superseded: superseded.map(|old| old.conn_id),
            drained,
        }
    }

    /// Remove the registry entry for `handle`, unless a newer connection
    /// has taken it over. Returns whether an entry was removed.
    pub fn disconnect(&self, handle: &SessionHandle) -> bool {
        self.directory.lock().evict(handle.user_id(), handle.conn_id)
    }

    pub fn is_registered(&self, user_id: &str) -> bool {
        self.directory.lock().registry.get(user_id).is_some()
    }

    /// Connection currently registered for `user_id`.
    pub fn current_conn(&self, user_id: &str) -> Option<ConnId> {
        self.directory.lock().registry.get(user_id).map(|h| h.conn_id)
    }

    pub fn session_count(&self) -> usize {
        self.directory.lock().registry.len()
    }

    pub fn pending_len(&self, user_id: &str) -> usize {
        self.directory.lock().pending.len_for(user_id)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Push `event` to every connected admin. Offline admins miss it; their
    /// next snapshot covers the gap. Returns how many connections got it.
    pub fn notify_admins(&self, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let mut dir = self.directory.lock();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for handle in dir.registry.members(Group::Admins) {
            if handle.send(Arc::clone(&event)).is_ok() {
                delivered += 1;
            } else {
                dead.push((handle.user_id().to_string(), handle.conn_id));
            }
        }
        for (user_id, conn_id) in dead {
            metrics::record_miss("broadcast");
            dir.evict(&user_id, conn_id);
        }

        metrics::record_delivered("broadcast", delivered);
        debug!(event = event.name(), delivered, "Broadcast to admins");
        delivered
    }

    /// Deliver `event` to `user_id`'s live connection, or queue it until
    /// they next authenticate.
    pub fn notify_user(&self, user_id: &str, event: ServerEvent) -> Delivery {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            warn!(event = event.name(), "Notification without recipient dropped");
            metrics::record_miss("unroutable");
            return Delivery::Missed;
        }

        let event = Arc::new(event);
        let mut dir = self.directory.lock();

        let live = dir.registry.members(Group::Private(user_id)).next().cloned();
        if let Some(handle) = live {
            if handle.send(Arc::clone(&event)).is_ok() {
                metrics::record_delivered("direct", 1);
                return Delivery::Direct;
            }
            // Registered, but the connection task is gone: treat as offline.
            metrics::record_miss("stale");
            dir.evict(user_id, handle.conn_id);
        }

        dir.pending.push(user_id, event);
        metrics::record_queued();
        metrics::set_pending(dir.pending.total());
        debug!(%user_id, queued = dir.pending.len_for(user_id), "Notification queued");
        Delivery::Queued
    }

    /// Outstanding requests, for resynchronising an admin.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            requests: self.ledger.outstanding().await,
        }
    }

    // ========================================================================
    // Collaborator operations
    // ========================================================================

    /// A faculty member's request row was written: record it and tell the
    /// admins. Returns how many admin connections were reached.
    pub async fn submit_validation_request(&self, request: NewValidationRequest) -> usize {
        self.ledger.record_submitted(request.to_request()).await;
        info!(
            request_id = %request.request_id,
            faculty_id = %request.faculty_id,
            "Validation request submitted"
        );
        self.notify_admins(ServerEvent::NewValidationRequest(request))
    }

    /// A decision row was written: record it and tell the faculty member who
    /// owns the request. Admins are not notified of their own decisions.
    pub async fn record_validation_decision(
        &self,
        request_id: &str,
        decision: ValidationDecision,
    ) -> Result<Delivery, BrokerError> {
        if !decision.status.is_decision() {
            return Err(BrokerError::InvalidDecisionStatus(decision.status));
        }

        if self
            .ledger
            .record_decision(request_id, decision.status)
            .await
            .is_none()
        {
            debug!(%request_id, "Decision for a request this broker never saw");
        }

        let response = ValidationResponse::from_decision(request_id, decision);
        let recipient = response.faculty_id.clone();
        let delivery = self.notify_user(&recipient, ServerEvent::ValidationResponseReceived(response));
        info!(%request_id, faculty_id = %recipient, ?delivery, "Validation decision recorded");
        Ok(delivery)
    }
}
