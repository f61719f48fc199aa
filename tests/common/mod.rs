//! Integration test common infrastructure.
//!
//! Provides utilities for spawning the broker binary, creating WebSocket
//! test clients, and calling the collaborator API.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;

use serde_json::{Value, json};

/// Body the CRUD layer posts after writing a validation request row.
#[allow(dead_code)]
pub fn submission(request_id: &str, faculty_id: &str) -> Value {
    json!({
        "requestId": request_id,
        "facultyId": faculty_id,
        "facultyName": "Ms. Reyes",
        "grade": "7",
        "section": "Rizal",
        "schoolYear": "2026-2027",
        "advisoryId": "9"
    })
}

/// Body the CRUD layer posts after writing a decision row.
#[allow(dead_code)]
pub fn decision(faculty_id: &str, status: &str) -> Value {
    json!({
        "facultyId": faculty_id,
        "advisoryId": "9",
        "status": status,
        "message": "",
        "grade": "7",
        "section": "Rizal",
        "schoolYear": "2026-2027"
    })
}
