//! Pending-delivery store: per-recipient FIFO of events sent while the
//! recipient had no live connection.

use chrono::{DateTime, Utc};
use gradecast_proto::ServerEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// An event waiting for its recipient to authenticate.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub event: Arc<ServerEvent>,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingNotification {
    /// Wire name of the parked event.
    pub fn kind(&self) -> &'static str {
        self.event.name()
    }

    /// How long the event has been parked.
    pub fn queued_for(&self) -> chrono::Duration {
        Utc::now() - self.enqueued_at
    }
}

#[derive(Debug, Default)]
pub struct PendingStore {
    queues: HashMap<String, VecDeque<PendingNotification>>,
    total: usize,
}

impl PendingStore {
    /// Append to the back of `recipient`'s queue.
    pub fn push(&mut self, recipient: &str, event: Arc<ServerEvent>) {
        self.queues
            .entry(recipient.to_string())
            .or_default()
            .push_back(PendingNotification {
                event,
                enqueued_at: Utc::now(),
            });
        self.total += 1;
    }

    /// Remove and return `recipient`'s whole queue, oldest first.
    pub fn take(&mut self, recipient: &str) -> VecDeque<PendingNotification> {
        let queue = self.queues.remove(recipient).unwrap_or_default();
        self.total -= queue.len();
        queue
    }

    /// Put undelivered entries back at the front, keeping their order ahead
    /// of anything queued since.
    pub fn restore(&mut self, recipient: &str, mut undelivered: VecDeque<PendingNotification>) {
        if undelivered.is_empty() {
            return;
        }
        self.total += undelivered.len();
        let queue = self.queues.entry(recipient.to_string()).or_default();
        undelivered.append(queue);
        *queue = undelivered;
    }

    pub fn len_for(&self, recipient: &str) -> usize {
        self.queues.get(recipient).map_or(0, VecDeque::len)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
