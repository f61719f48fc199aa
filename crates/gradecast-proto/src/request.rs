//! Grade validation requests and the payloads describing their transitions.
//!
//! The CRUD layer owns these records; the broker only carries events about
//! transitions that were already committed there.

use crate::id::string_or_number;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Awaiting an administrator decision.
    #[default]
    Pending,
    /// Grades accepted.
    Approved,
    /// Grades sent back to the faculty member.
    Rejected,
}

impl ValidationStatus {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Approved => "approved",
            ValidationStatus::Rejected => "rejected",
        }
    }

    /// Whether this status is a final decision.
    pub fn is_decision(&self) -> bool {
        !matches!(self, ValidationStatus::Pending)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validation request as listed in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub request_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub faculty_id: String,
    #[serde(default)]
    pub faculty_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub advisory_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub school_year: String,
    #[serde(default)]
    pub status: ValidationStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Pushed to the admins group when a faculty member submits grades.
///
/// This is also the body the CRUD layer posts once the request row is written;
/// `timestamp` defaults to the time of receipt when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewValidationRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub request_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub faculty_id: String,
    #[serde(default)]
    pub faculty_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub school_year: String,
    #[serde(deserialize_with = "string_or_number")]
    pub advisory_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl NewValidationRequest {
    /// The outstanding request this submission creates.
    pub fn to_request(&self) -> ValidationRequest {
        ValidationRequest {
            request_id: self.request_id.clone(),
            faculty_id: self.faculty_id.clone(),
            faculty_name: self.faculty_name.clone(),
            advisory_id: self.advisory_id.clone(),
            grade: self.grade.clone(),
            section: self.section.clone(),
            school_year: self.school_year.clone(),
            status: ValidationStatus::Pending,
            submitted_at: self.timestamp,
        }
    }
}

/// Decision body the CRUD layer posts once the decision row is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDecision {
    #[serde(deserialize_with = "string_or_number")]
    pub faculty_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub advisory_id: String,
    pub status: ValidationStatus,
    #[serde(default)]
    pub message: String,
    #[serde(deserialize_with = "string_or_number")]
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub school_year: String,
}

/// Sent to the faculty member who owns a request once it is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub request_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub faculty_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub advisory_id: String,
    pub status: ValidationStatus,
    #[serde(default)]
    pub message: String,
    #[serde(deserialize_with = "string_or_number")]
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub school_year: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ValidationResponse {
    /// Build the faculty-facing event for a recorded decision.
    ///
    /// An empty decision message is replaced with a generated sentence.
    pub fn from_decision(request_id: impl Into<String>, decision: ValidationDecision) -> Self {
        let message = if decision.message.trim().is_empty() {
            default_decision_message(&decision)
        } else {
            decision.message
        };
        Self {
            request_id: request_id.into(),
            faculty_id: decision.faculty_id,
            advisory_id: decision.advisory_id,
            status: decision.status,
            message,
            grade: decision.grade,
            section: decision.section,
            school_year: decision.school_year,
            timestamp: Utc::now(),
        }
    }
}

fn default_decision_message(decision: &ValidationDecision) -> String {
    let mut out = format!(
        "Your grade validation for Grade {} - {}",
        decision.grade, decision.section
    );
    if !decision.school_year.is_empty() {
        out.push_str(&format!(" ({})", decision.school_year));
    }
    out.push_str(&format!(" was {}.", decision.status));
    out
}
