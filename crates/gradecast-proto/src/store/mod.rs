//! Client-side notification store.
//!
//! Keeps the notifications one role has received, newest first, with
//! read/unread state. Updates are merged by correlation key
//! (`{requestId}:{kind}`), so a push frame, a snapshot entry and an HTTP poll
//! describing the same request collapse into a single entry regardless of
//! which arrived first.
//!
//! Entries are persisted through a [`NotificationCache`] namespaced by role,
//! so switching between the admin and faculty views on one device never mixes
//! their histories.

mod cache;
mod notification;

pub use cache::{CacheError, FileCache, MemoryCache, NotificationCache};
pub use notification::{ClientNotification, NotificationEvent, NotificationKind};

use crate::event::ServerEvent;
use crate::identity::Role;
use crate::request::ValidationRequest;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// What [`NotificationStore::ingest`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new entry was added at the head of the list.
    Inserted(Uuid),
    /// An existing entry with the same key was updated.
    Merged(Uuid),
    /// The update repeated what the entry already says.
    Unchanged(Uuid),
    /// A request entry dropped out of the outstanding set and was removed.
    Evicted(Uuid),
}

impl IngestOutcome {
    /// ID of the affected entry.
    pub fn id(&self) -> Uuid {
        match self {
            IngestOutcome::Inserted(id)
            | IngestOutcome::Merged(id)
            | IngestOutcome::Unchanged(id)
            | IngestOutcome::Evicted(id) => *id,
        }
    }
}

/// Notifications for the current role.
#[derive(Debug)]
pub struct NotificationStore<C: NotificationCache> {
    role: Role,
    entries: Vec<ClientNotification>,
    cache: C,
}

impl<C: NotificationCache> NotificationStore<C> {
    /// Open the store for `role`, loading whatever the cache holds for it.
    pub fn open(role: Role, cache: C) -> Result<Self, CacheError> {
        let entries = cache.load(role)?;
        Ok(Self {
            role,
            entries,
            cache,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[ClientNotification] {
        &self.entries
    }

    pub fn get(&self, correlation_key: &str) -> Option<&ClientNotification> {
        self.entries
            .iter()
            .find(|n| n.correlation_key == correlation_key)
    }

    /// Number of unread entries, counted from the entries themselves.
    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    /// Insert or merge one update.
    pub fn ingest(&mut self, event: NotificationEvent) -> IngestOutcome {
        let key = event.correlation_key();
        let outcome = match self.entries.iter_mut().find(|n| n.correlation_key == key) {
            Some(existing) => {
                let id = existing.id;
                if !existing.merge(event) {
                    return IngestOutcome::Unchanged(id);
                }
                IngestOutcome::Merged(id)
            }
            None => {
                let entry = ClientNotification::from_event(event);
                let id = entry.id;
                self.entries.insert(0, entry);
                IngestOutcome::Inserted(id)
            }
        };
        self.persist();
        outcome
    }

    /// Feed a frame received from the broker.
    ///
    /// Only events addressed to this store's role are ingested. A snapshot is
    /// the complete outstanding set: it contributes one `validation_request`
    /// entry per request and evicts request entries it no longer lists.
    pub fn apply(&mut self, event: &ServerEvent) -> Vec<IngestOutcome> {
        let wanted = NotificationKind::for_role(self.role);
        let updates: Vec<NotificationEvent> = match event {
            ServerEvent::NewValidationRequest(ev) => vec![ev.into()],
            ServerEvent::ValidationResponseReceived(ev) => vec![ev.into()],
            ServerEvent::Snapshot(snapshot) => {
                if wanted != NotificationKind::ValidationRequest {
                    return Vec::new();
                }
                return self.resync_outstanding(&snapshot.requests);
            }
            ServerEvent::Authenticated(_) | ServerEvent::Error(_) => Vec::new(),
        };
        updates
            .into_iter()
            .filter(|u| u.kind == wanted)
            .map(|u| self.ingest(u))
            .collect()
    }

    /// Feed requests fetched over HTTP (the polling fallback).
    ///
    /// For an admin the poll returns the pending list, so it resyncs the
    /// same way a snapshot does.
    pub fn ingest_polled(&mut self, requests: &[ValidationRequest]) -> Vec<IngestOutcome> {
        let role = self.role;
        if role == Role::Admin {
            return self.resync_outstanding(requests);
        }
        requests
            .iter()
            .map(|r| self.ingest(NotificationEvent::from_polled(r, role)))
            .collect()
    }

    fn resync_outstanding(&mut self, requests: &[ValidationRequest]) -> Vec<IngestOutcome> {
        let listed: HashSet<&str> = requests.iter().map(|r| r.request_id.as_str()).collect();
        let mut outcomes = Vec::new();
        let before = self.entries.len();
        self.entries.retain(|n| {
            let keep = n.kind != NotificationKind::ValidationRequest
                || listed.contains(n.request_id.as_str());
            if !keep {
                outcomes.push(IngestOutcome::Evicted(n.id));
            }
            keep
        });
        if self.entries.len() != before {
            self.persist();
        }

        outcomes.extend(
            requests
                .iter()
                .map(|r| self.ingest(NotificationEvent::from_polled(r, Role::Admin))),
        );
        outcomes
    }

    /// Returns `false` when no entry has that ID.
    pub fn mark_read(&mut self, id: Uuid) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !entry.read {
            entry.read = true;
            self.persist();
        }
        true
    }

    pub fn mark_all_read(&mut self) {
        if self.entries.iter().all(|n| n.read) {
            return;
        }
        for entry in &mut self.entries {
            entry.read = true;
        }
        self.persist();
    }

    /// Drop every entry and evict the persisted cache for this role.
    pub fn clear_all(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        self.cache.evict(self.role)
    }

    /// Save this role's entries and load `role`'s.
    pub fn switch_role(&mut self, role: Role) -> Result<(), CacheError> {
        if role == self.role {
            return Ok(());
        }
        self.cache.save(self.role, &self.entries)?;
        self.entries = self.cache.load(role)?;
        self.role = role;
        Ok(())
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    fn persist(&mut self) {
        if let Err(e) = self.cache.save(self.role, &self.entries) {
            warn!(role = %self.role, error = %e, "Failed to persist notifications");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Snapshot;
    use crate::request::{ValidationResponse, ValidationStatus};
    use chrono::{Duration, TimeZone, Utc};

    fn response(request_id: &str, status: ValidationStatus, message: &str) -> ServerEvent {
        ServerEvent::ValidationResponseReceived(ValidationResponse {
            request_id: request_id.to_string(),
            faculty_id: "F1".to_string(),
            advisory_id: "9".to_string(),
            status,
            message: message.to_string(),
            grade: "7".to_string(),
            section: "Rizal".to_string(),
            school_year: "2026-2027".to_string(),
            timestamp: Utc::now(),
        })
    }

    fn request(request_id: &str) -> ValidationRequest {
        ValidationRequest {
            request_id: request_id.to_string(),
            faculty_id: "F1".to_string(),
            faculty_name: "Ms. Reyes".to_string(),
            advisory_id: "9".to_string(),
            grade: "7".to_string(),
            section: "Rizal".to_string(),
            school_year: "2026-2027".to_string(),
            status: ValidationStatus::Pending,
            submitted_at: Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
        }
    }

    fn faculty_store() -> NotificationStore<MemoryCache> {
        NotificationStore::open(Role::Faculty, MemoryCache::new()).unwrap()
    }

    #[test]
    fn same_key_merges_into_one_unread_entry() {
        let mut store = faculty_store();
        let first = store.apply(&response("42", ValidationStatus::Rejected, "Fix Q3"));
        let id = first[0].id();
        assert!(store.mark_read(id));
        assert_eq!(store.unread_count(), 0);

        let second = store.apply(&response("42", ValidationStatus::Approved, "Approved"));
        assert_eq!(second, vec![IngestOutcome::Merged(id)]);
        assert_eq!(store.entries().len(), 1);

        let entry = store.get("42:validation_response").unwrap();
        assert_eq!(entry.status, ValidationStatus::Approved);
        assert_eq!(entry.message, "Approved");
        assert!(!entry.read);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn new_keys_go_to_the_head() {
        let mut store = faculty_store();
        store.apply(&response("1", ValidationStatus::Approved, "a"));
        store.apply(&response("2", ValidationStatus::Approved, "b"));
        let keys: Vec<_> = store.entries().iter().map(|n| n.request_id.as_str()).collect();
        assert_eq!(keys, vec!["2", "1"]);
    }

    #[test]
    fn merge_keeps_position() {
        let mut store = faculty_store();
        store.apply(&response("1", ValidationStatus::Rejected, "a"));
        store.apply(&response("2", ValidationStatus::Approved, "b"));
        store.apply(&response("1", ValidationStatus::Approved, "a2"));
        let keys: Vec<_> = store.entries().iter().map(|n| n.request_id.as_str()).collect();
        assert_eq!(keys, vec!["2", "1"]);
    }

    #[test]
    fn push_and_poll_collapse() {
        let mut store = NotificationStore::open(Role::Admin, MemoryCache::new()).unwrap();
        let pushed = ServerEvent::NewValidationRequest(crate::request::NewValidationRequest {
            request_id: "5".to_string(),
            faculty_id: "F1".to_string(),
            faculty_name: "Ms. Reyes".to_string(),
            grade: "7".to_string(),
            section: "Rizal".to_string(),
            school_year: "2026-2027".to_string(),
            advisory_id: "9".to_string(),
            timestamp: Utc::now(),
        });
        store.apply(&pushed);
        store.ingest_polled(&[request("5")]);
        store.apply(&ServerEvent::Snapshot(Snapshot {
            requests: vec![request("5"), request("6")],
        }));
        assert_eq!(store.entries().len(), 2);
        assert!(store.get("5:validation_request").is_some());
        assert!(store.get("6:validation_request").is_some());
    }

    #[test]
    fn role_filter_ignores_foreign_events() {
        let mut store = NotificationStore::open(Role::Admin, MemoryCache::new()).unwrap();
        let outcomes = store.apply(&response("3", ValidationStatus::Approved, "x"));
        assert!(outcomes.is_empty());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn roles_do_not_cross_contaminate() {
        let mut store = faculty_store();
        store.apply(&response("42", ValidationStatus::Approved, "ok"));

        store.switch_role(Role::Admin).unwrap();
        assert!(store.entries().is_empty());
        assert!(store.get("42:validation_response").is_none());
        store.ingest_polled(&[request("8")]);

        store.switch_role(Role::Faculty).unwrap();
        assert_eq!(store.entries().len(), 1);
        assert!(store.get("42:validation_response").is_some());
        assert!(store.get("8:validation_request").is_none());
    }

    #[test]
    fn mark_all_read_and_unknown_id() {
        let mut store = faculty_store();
        store.apply(&response("1", ValidationStatus::Approved, "a"));
        store.apply(&response("2", ValidationStatus::Rejected, "b"));
        assert_eq!(store.unread_count(), 2);
        assert!(!store.mark_read(Uuid::new_v4()));
        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn clear_all_evicts_only_current_role() {
        let mut cache = MemoryCache::new();
        let admin_entry = ClientNotification::from_event(NotificationEvent::from_polled(
            &request("8"),
            Role::Admin,
        ));
        cache.save(Role::Admin, &[admin_entry]).unwrap();

        let mut store = NotificationStore::open(Role::Faculty, cache).unwrap();
        store.apply(&response("1", ValidationStatus::Approved, "a"));
        store.clear_all().unwrap();

        assert!(store.entries().is_empty());
        assert!(store.cache().load(Role::Faculty).unwrap().is_empty());
        assert_eq!(store.cache().load(Role::Admin).unwrap().len(), 1);
    }

    #[test]
    fn reopening_restores_persisted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mut store =
                NotificationStore::open(Role::Faculty, FileCache::open(dir.path()).unwrap()).unwrap();
            store.apply(&response("7", ValidationStatus::Approved, "ok"))[0].id()
        };
        let store =
            NotificationStore::open(Role::Faculty, FileCache::open(dir.path()).unwrap()).unwrap();
        assert_eq!(store.entries()[0].id, id);

        let admin =
            NotificationStore::open(Role::Admin, FileCache::open(dir.path()).unwrap()).unwrap();
        assert!(admin.entries().is_empty());
    }

    #[test]
    fn merge_moves_timestamp_forward() {
        let mut store = faculty_store();
        let base = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap();
        let mut ev = NotificationEvent {
            request_id: "4".to_string(),
            kind: NotificationKind::ValidationResponse,
            message: "first".to_string(),
            status: ValidationStatus::Rejected,
            timestamp: base,
        };
        store.ingest(ev.clone());
        ev.timestamp = base + Duration::minutes(5);
        ev.message = "second".to_string();
        store.ingest(ev);
        assert_eq!(store.entries()[0].timestamp, base + Duration::minutes(5));
        assert_eq!(store.entries()[0].message, "second");
    }

    fn admin_store() -> NotificationStore<MemoryCache> {
        NotificationStore::open(Role::Admin, MemoryCache::new()).unwrap()
    }

    fn snapshot(ids: &[&str]) -> ServerEvent {
        ServerEvent::Snapshot(Snapshot {
            requests: ids.iter().map(|id| request(id)).collect(),
        })
    }

    #[test]
    fn repeated_snapshot_keeps_read_state() {
        let mut store = admin_store();
        store.apply(&snapshot(&["5"]));
        store.mark_all_read();

        let outcomes = store.apply(&snapshot(&["5"]));
        assert!(matches!(outcomes.as_slice(), [IngestOutcome::Unchanged(_)]));
        store.ingest_polled(&[request("5")]);
        assert_eq!(store.unread_count(), 0);
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn identical_response_does_not_reopen_entry() {
        let mut store = faculty_store();
        store.apply(&response("9", ValidationStatus::Approved, "ok"));
        store.mark_all_read();
        store.apply(&response("9", ValidationStatus::Approved, "ok"));
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn snapshot_evicts_requests_no_longer_outstanding() {
        let mut store = admin_store();
        store.apply(&snapshot(&["5", "6"]));
        let gone = store.get("5:validation_request").unwrap().id;

        let outcomes = store.apply(&snapshot(&["6"]));
        assert!(outcomes.contains(&IngestOutcome::Evicted(gone)));
        assert!(store.get("5:validation_request").is_none());
        assert!(store.get("6:validation_request").is_some());

        store.apply(&snapshot(&[]));
        assert!(store.entries().is_empty());
        assert!(store.cache().load(Role::Admin).unwrap().is_empty());
    }

    #[test]
    fn admin_poll_resyncs_like_snapshot() {
        let mut store = admin_store();
        store.ingest_polled(&[request("5"), request("6")]);
        store.ingest_polled(&[request("6")]);
        let keys: Vec<_> = store.entries().iter().map(|n| n.request_id.as_str()).collect();
        assert_eq!(keys, vec!["6"]);
    }

    #[test]
    fn faculty_store_ignores_snapshots() {
        let mut store = faculty_store();
        store.apply(&response("1", ValidationStatus::Approved, "a"));
        assert!(store.apply(&snapshot(&[])).is_empty());
        assert_eq!(store.entries().len(), 1);
    }
}
