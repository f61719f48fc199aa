//! Connection identities.
//!
//! A client announces [`Credentials`] in its `authenticate` frame. The role
//! travels as a plain string so that an unknown role is an authentication
//! failure rather than an undecodable frame; [`Credentials::validate`] turns
//! it into a checked [`Identity`].

use crate::id::string_or_number;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The two roles the broker routes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Approves or rejects validation requests; member of the admins group.
    Admin,
    /// Submits validation requests and receives decisions.
    Faculty,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("admin") {
            Ok(Role::Admin)
        } else if s.eq_ignore_ascii_case("faculty") {
            Ok(Role::Faculty)
        } else {
            Err(IdentityError::InvalidRole(s.to_string()))
        }
    }
}

/// Reasons an `authenticate` frame is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Role is neither `admin` nor `faculty`.
    #[error("invalid role: {0:?}")]
    InvalidRole(String),
    /// `userId` was empty or blank.
    #[error("missing user id")]
    MissingUserId,
}

/// Unchecked identity as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Requested role (validated server-side).
    #[serde(default)]
    pub role: String,
    /// Token-derived user identifier.
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: String,
    /// Human-readable name, informational only.
    #[serde(default)]
    pub display_name: String,
}

impl Credentials {
    /// Check role and user ID, producing an [`Identity`].
    pub fn validate(self) -> Result<Identity, IdentityError> {
        let role = self.role.parse::<Role>()?;
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(IdentityError::MissingUserId);
        }
        Ok(Identity {
            role,
            user_id: user_id.to_string(),
            display_name: self.display_name,
        })
    }
}

/// A validated identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Checked role.
    pub role: Role,
    /// Non-empty user identifier.
    pub user_id: String,
    /// Human-readable name.
    pub display_name: String,
}

impl Identity {
    /// Build an identity directly (client side, where the values are trusted).
    pub fn new(role: Role, user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            role,
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Whether this identity belongs to the admins group.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&Identity> for Credentials {
    fn from(identity: &Identity) -> Self {
        Self {
            role: identity.role.as_str().to_string(),
            user_id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(role: &str, user_id: &str) -> Credentials {
        Credentials {
            role: role.to_string(),
            user_id: user_id.to_string(),
            display_name: "Test".to_string(),
        }
    }

    #[test]
    fn validate_accepts_both_roles() {
        assert_eq!(creds("admin", "A1").validate().unwrap().role, Role::Admin);
        assert_eq!(creds("Faculty", "F1").validate().unwrap().role, Role::Faculty);
    }

    #[test]
    fn validate_rejects_unknown_role() {
        assert_eq!(
            creds("student", "S1").validate(),
            Err(IdentityError::InvalidRole("student".to_string()))
        );
    }

    #[test]
    fn validate_rejects_blank_user_id() {
        assert_eq!(creds("admin", "   ").validate(), Err(IdentityError::MissingUserId));
    }

    #[test]
    fn validate_trims_user_id() {
        assert_eq!(creds("faculty", " F1 ").validate().unwrap().user_id, "F1");
    }

    #[test]
    fn credentials_accept_numeric_user_id() {
        let c: Credentials =
            serde_json::from_str(r#"{"role":"faculty","userId":12,"displayName":"X"}"#).unwrap();
        assert_eq!(c.user_id, "12");
    }

    #[test]
    fn missing_fields_decode_then_fail_validation() {
        let c: Credentials = serde_json::from_str("{}").unwrap();
        assert!(matches!(c.validate(), Err(IdentityError::InvalidRole(_))));
    }
}
