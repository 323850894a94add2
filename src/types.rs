use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const MAX_EMAIL_LEN: usize = 254;
const MAX_PATH_LEN: usize = 1024;

/// Email address of a principal, the join key between identity and role data.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Creates a validated email address.
    ///
    /// The value is trimmed; case is preserved.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ParseError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ParseError::Email("email must not be empty".to_string()));
        }
        if trimmed.len() > MAX_EMAIL_LEN {
            return Err(ParseError::Email(format!(
                "email length must be <= {MAX_EMAIL_LEN}"
            )));
        }
        if trimmed
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(ParseError::Email(
                "email contains whitespace or control characters".to_string(),
            ));
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(ParseError::Email("email must contain '@'".to_string()));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ParseError::Email(
                "email must have a local part and a domain".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates an email from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Email {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Email {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, ParseError> {
        Self::new(value)
    }
}

impl From<String> for Email {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// Router path used for attempted locations and redirect targets.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutePath(String);

impl RoutePath {
    /// Creates a validated route path.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ParseError> {
        let value = value.as_ref();
        if !value.starts_with('/') {
            return Err(ParseError::RoutePath(
                "route path must start with '/'".to_string(),
            ));
        }
        if value.len() > MAX_PATH_LEN {
            return Err(ParseError::RoutePath(format!(
                "route path length must be <= {MAX_PATH_LEN}"
            )));
        }
        if value
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(ParseError::RoutePath(
                "route path contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// Creates a route path from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoutePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoutePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for RoutePath {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, ParseError> {
        Self::new(value)
    }
}

impl From<String> for RoutePath {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// Server-assigned authorization tag controlling access to privileged views.
///
/// The set is closed; unknown tags fail to parse and the caller decides how
/// to degrade (the role resolver treats them as no role).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// Tutor-level access.
    Tutor,
    /// Default role assigned at registration.
    User,
}

impl Role {
    /// Returns the wire tag for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Tutor => "tutor",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, ParseError> {
        match value {
            "admin" => Ok(Role::Admin),
            "tutor" => Ok(Role::Tutor),
            "user" => Ok(Role::User),
            other => Err(ParseError::Role(other.to_string())),
        }
    }
}

/// Signed-in principal as reported by the identity provider.
///
/// A read-only snapshot: the provider owns the authoritative identity and
/// replaces this value on every change event. The email may be absent
/// (federated providers can withhold it); such identities count as signed in
/// but resolve no role.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    /// Unique email, when the provider reports one.
    pub email: Option<Email>,
    /// Human-readable display name.
    pub display_name: Option<String>,
}

impl Identity {
    /// Creates an identity with an email.
    pub fn new(email: Email, display_name: Option<String>) -> Self {
        Self {
            email: Some(email),
            display_name,
        }
    }
}

/// Partial profile update. Fields left as `None` are unchanged.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProfilePatch {
    /// New display name.
    pub display_name: Option<String>,
}

/// `POST /users` payload registering a user record after account creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Display name at registration time.
    pub name: Option<String>,
    /// Account email.
    pub email: Email,
    /// Role assigned at registration.
    pub role: Role,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last sign-in timestamp.
    pub last_log_in: DateTime<Utc>,
}

/// `PATCH /users/login` payload stamping the last sign-in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginStamp {
    /// Account email.
    pub email: Email,
    /// Sign-in timestamp.
    pub last_log_in: DateTime<Utc>,
}
