//! Role table semantics and the capability gate used before every handler.

use std::fmt;
use std::str::FromStr;

/// Role stored in the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Minimum role a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Anyone, registered or not.
    Anyone,
    /// Any registered user (user or admin).
    Registered,
    /// Admins only.
    Admin,
}

/// Decides whether a sender with `role` (None = not in the directory) passes `requirement`.
pub fn permits(requirement: Requirement, role: Option<Role>) -> bool {
    match requirement {
        Requirement::Anyone => true,
        Requirement::Registered => role.is_some(),
        Requirement::Admin => role == Some(Role::Admin),
    }
}
