//! Notification entries and the normalised events that produce them.

use crate::identity::Role;
use crate::request::{NewValidationRequest, ValidationRequest, ValidationResponse, ValidationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a notification is about; the second half of the correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A submission awaiting decision (admin side).
    ValidationRequest,
    /// A decision on one's own submission (faculty side).
    ValidationResponse,
}

impl NotificationKind {
    /// Key suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ValidationRequest => "validation_request",
            NotificationKind::ValidationResponse => "validation_response",
        }
    }

    /// The kind a role's store keeps.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => NotificationKind::ValidationRequest,
            Role::Faculty => NotificationKind::ValidationResponse,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One update about a request, whatever produced it (push frame, snapshot
/// or HTTP poll).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub request_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub status: ValidationStatus,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// `{requestId}:{kind}`.
    pub fn correlation_key(&self) -> String {
        correlation_key(&self.request_id, self.kind)
    }

    /// Normalise a request fetched by polling, as seen by `role`.
    pub fn from_polled(request: &ValidationRequest, role: Role) -> Self {
        match role {
            Role::Admin => Self {
                request_id: request.request_id.clone(),
                kind: NotificationKind::ValidationRequest,
                message: submission_message(
                    &request.faculty_name,
                    &request.grade,
                    &request.section,
                ),
                status: request.status,
                timestamp: request.submitted_at,
            },
            Role::Faculty => Self {
                request_id: request.request_id.clone(),
                kind: NotificationKind::ValidationResponse,
                message: format!(
                    "Your grade validation for Grade {} - {} is {}.",
                    request.grade, request.section, request.status
                ),
                status: request.status,
                timestamp: request.submitted_at,
            },
        }
    }
}

impl From<&NewValidationRequest> for NotificationEvent {
    fn from(ev: &NewValidationRequest) -> Self {
        Self {
            request_id: ev.request_id.clone(),
            kind: NotificationKind::ValidationRequest,
            message: submission_message(&ev.faculty_name, &ev.grade, &ev.section),
            status: ValidationStatus::Pending,
            timestamp: ev.timestamp,
        }
    }
}

impl From<&ValidationResponse> for NotificationEvent {
    fn from(ev: &ValidationResponse) -> Self {
        Self {
            request_id: ev.request_id.clone(),
            kind: NotificationKind::ValidationResponse,
            message: ev.message.clone(),
            status: ev.status,
            timestamp: ev.timestamp,
        }
    }
}

fn submission_message(faculty_name: &str, grade: &str, section: &str) -> String {
    let who = if faculty_name.is_empty() {
        "A faculty member"
    } else {
        faculty_name
    };
    format!("{who} submitted grades for validation: Grade {grade} - {section}")
}

pub(crate) fn correlation_key(request_id: &str, kind: NotificationKind) -> String {
    format!("{request_id}:{kind}")
}

/// A notification as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientNotification {
    pub id: Uuid,
    pub correlation_key: String,
    pub request_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: ValidationStatus,
    pub read: bool,
}

impl ClientNotification {
    pub(crate) fn from_event(event: NotificationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_key: event.correlation_key(),
            request_id: event.request_id,
            kind: event.kind,
            message: event.message,
            timestamp: event.timestamp,
            status: event.status,
            read: false,
        }
    }

    /// Apply a later update for the same key. Returns `false`, leaving the
    /// entry untouched, when status and message are unchanged; otherwise the
    /// entry is overwritten and becomes unread.
    pub(crate) fn merge(&mut self, event: NotificationEvent) -> bool {
        if self.status == event.status && self.message == event.message {
            return false;
        }
        self.message = event.message;
        self.status = event.status;
        self.timestamp = event.timestamp;
        self.read = false;
        true
    }
}
