//! Outstanding validation requests, for snapshots.
//!
//! The CRUD layer's database is the source of truth; the broker mirrors just
//! enough of it, fed by the two collaborator calls, to answer `snapshot()`.

use async_trait::async_trait;
use dashmap::DashMap;
use gradecast_proto::{ValidationRequest, ValidationStatus};

#[async_trait]
pub trait RequestLedger: Send + Sync {
    /// A request row was written.
    async fn record_submitted(&self, request: ValidationRequest);

    /// A decision row was written. `status` is always a decision; the broker
    /// refuses `pending` before calling. Returns the decided request if it
    /// was known.
    async fn record_decision(
        &self,
        request_id: &str,
        status: ValidationStatus,
    ) -> Option<ValidationRequest>;

    /// Requests still pending, oldest submission first.
    async fn outstanding(&self) -> Vec<ValidationRequest>;
}

/// Process-local ledger. Decided requests are dropped.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    requests: DashMap<String, ValidationRequest>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestLedger for MemoryLedger {
    async fn record_submitted(&self, mut request: ValidationRequest) {
        request.status = ValidationStatus::Pending;
        self.requests.insert(request.request_id.clone(), request);
    }

    async fn record_decision(
        &self,
        request_id: &str,
        status: ValidationStatus,
    ) -> Option<ValidationRequest> {
        self.requests.remove(request_id).map(|(_, mut request)| {
            request.status = status;
            request
        })
    }

    async fn outstanding(&self) -> Vec<ValidationRequest> {
        let mut pending: Vec<ValidationRequest> = self
            .requests
            .iter()
            .filter(|r| r.status == ValidationStatus::Pending)
            .map(|r| r.value().clone())
            .collect();
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn request(id: &str, minutes: i64) -> ValidationRequest {
        ValidationRequest {
            request_id: id.to_string(),
            faculty_id: "F1".to_string(),
            faculty_name: "Ms. Reyes".to_string(),
            advisory_id: "9".to_string(),
            grade: "7".to_string(),
            section: "Rizal".to_string(),
            school_year: "2026-2027".to_string(),
            status: ValidationStatus::Pending,
            submitted_at: Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn outstanding_is_ordered_by_submission() {
        let ledger = MemoryLedger::new();
        ledger.record_submitted(request("b", 5)).await;
        ledger.record_submitted(request("a", 10)).await;
        ledger.record_submitted(request("c", 0)).await;

        let ids: Vec<_> = ledger
            .outstanding()
            .await
            .into_iter()
            .map(|r| r.request_id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn decided_requests_leave_the_snapshot() {
        let ledger = MemoryLedger::new();
        ledger.record_submitted(request("7", 0)).await;

        let decided = ledger.record_decision("7", ValidationStatus::Approved).await;
        assert_eq!(decided.unwrap().status, ValidationStatus::Approved);
        assert!(ledger.outstanding().await.is_empty());
        assert!(ledger.record_decision("7", ValidationStatus::Rejected).await.is_none());
    }

    #[tokio::test]
    async fn resubmission_replaces_entry() {
        let ledger = MemoryLedger::new();
        ledger.record_submitted(request("7", 0)).await;
        ledger.record_submitted(request("7", 30)).await;
        let all = ledger.outstanding().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].submitted_at, request("7", 30).submitted_at);
    }
}
