//! Triage subjects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::serde_util::null_as_default;
use crate::types::DbId;

/// Triage category printed on the patient's card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Requires life-saving intervention now (red).
    Immediate,
    /// Needs care, but can wait (yellow).
    Delayed,
    /// Walking wounded (green).
    Minor,
    /// Deceased or expectant (black).
    #[serde(alias = "Expectant")]
    Deceased,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::Immediate,
        Condition::Delayed,
        Condition::Minor,
        Condition::Deceased,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Immediate => "Immediate",
            Condition::Delayed => "Delayed",
            Condition::Minor => "Minor",
            Condition::Deceased => "Deceased",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Condition::Immediate),
            "delayed" => Ok(Condition::Delayed),
            "minor" => Ok(Condition::Minor),
            "deceased" | "expectant" => Ok(Condition::Deceased),
            other => Err(CoreError::Validation(format!(
                "unknown condition '{other}'"
            ))),
        }
    }
}

/// A single patient inside one pool's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Assigned by the backend; `None` for a patient created locally that
    /// has not yet come back in a remote snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DbId>,
    pub card_id: i64,
    pub condition: Condition,
    /// Whether the patient finished service at its current (or most
    /// recent) MedService head position.
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed: bool,
    /// Backend fields this client does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Patient {
    /// A fresh, unsaved, un-processed patient.
    pub fn new(card_id: i64, condition: Condition) -> Self {
        Self {
            id: None,
            card_id,
            condition,
            processed: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: DbId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_processed(mut self, processed: bool) -> Self {
        self.processed = processed;
        self
    }

    /// True when this patient carries the given backend id.
    pub fn has_id(&self, id: DbId) -> bool {
        self.id == Some(id)
    }
}
