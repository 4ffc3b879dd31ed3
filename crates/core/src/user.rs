//! Session identity and role.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Access level of the person driving this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Director,
    Nurse,
    Guest,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Director => "Director",
            Role::Nurse => "Nurse",
            Role::Guest => "Guest",
        }
    }

    /// Directors and nurses may move, add and remove patients.
    pub fn can_rearrange(self) -> bool {
        matches!(self, Role::Director | Role::Nurse)
    }

    /// Condition changes and run-state toggles are director-only.
    pub fn can_direct(self) -> bool {
        self == Role::Director
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "director" => Ok(Role::Director),
            "nurse" => Ok(Role::Nurse),
            "guest" => Ok(Role::Guest),
            other => Err(CoreError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// A user as returned by `GET /api/users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
