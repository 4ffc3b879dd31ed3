//! The event aggregate: one timed simulation run and all of its pools.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::patient::Patient;
use crate::pool::PatientPool;
use crate::serde_util::null_as_default;
use crate::types::{DbId, EpochMillis, Millis};

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Created,
    Running,
    Paused,
    Ended,
}

impl Status {
    /// The status a run/pause toggle moves to.
    ///
    /// Running pauses; every other status (re)starts the clock.
    pub fn toggled(self) -> Status {
        match self {
            Status::Running => Status::Paused,
            Status::Paused | Status::Created | Status::Ended => Status::Running,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Created => "Created",
            Status::Running => "Running",
            Status::Paused => "Paused",
            Status::Ended => "Ended",
        })
    }
}

/// Position of a patient inside an [`Event`]: which pool, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatientLocation {
    pub pool_index: usize,
    pub position: usize,
}

/// Full snapshot of one event as exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DbId>,
    pub name: String,
    /// Scheduled total length of the run.
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: Millis,
    pub status: Status,
    #[serde(default)]
    pub start_time: Option<EpochMillis>,
    /// Instant of the most recent status transition.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_of_status_change: EpochMillis,
    /// Time left as of `time_of_status_change`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub remaining_duration: Millis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pools: Vec<PatientPool>,
    /// Fields such as `director` and `nurses` that the backend expects
    /// back untouched on every publish.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    pub fn new(name: impl Into<String>, duration: Millis) -> Self {
        Self {
            id: None,
            name: name.into(),
            duration,
            status: Status::Created,
            start_time: None,
            time_of_status_change: 0,
            remaining_duration: duration,
            pools: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: DbId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_pools(mut self, pools: Vec<PatientPool>) -> Self {
        self.pools = pools;
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn pool_index(&self, pool_id: DbId) -> Option<usize> {
        self.pools.iter().position(|p| p.has_id(pool_id))
    }

    pub fn pool(&self, pool_id: DbId) -> Option<&PatientPool> {
        self.pools.iter().find(|p| p.has_id(pool_id))
    }

    pub fn pool_mut(&mut self, pool_id: DbId) -> Option<&mut PatientPool> {
        self.pools.iter_mut().find(|p| p.has_id(pool_id))
    }

    /// Scan every pool for the patient. Pools are searched in display
    /// order; a patient id appears in at most one pool.
    pub fn locate_patient(&self, patient_id: DbId) -> Option<PatientLocation> {
        self.pools.iter().enumerate().find_map(|(pool_index, pool)| {
            pool.position_of(patient_id).map(|position| PatientLocation {
                pool_index,
                position,
            })
        })
    }

    pub fn patient(&self, patient_id: DbId) -> Option<&Patient> {
        self.locate_patient(patient_id)
            .map(|loc| &self.pools[loc.pool_index].patients[loc.position])
    }

    /// Total patients across all pools.
    pub fn patient_count(&self) -> usize {
        self.pools.iter().map(|p| p.patients.len()).sum()
    }

    /// Time left on the event clock at `now`.
    ///
    /// While running the stored `remaining_duration` is counted down from
    /// `time_of_status_change`; in any other status it is frozen.
    pub fn remaining_at(&self, now: EpochMillis) -> Millis {
        match self.status {
            Status::Running => {
                (self.remaining_duration - (now - self.time_of_status_change)).max(0)
            }
            _ => self.remaining_duration.max(0),
        }
    }
}

/// Pick the running event out of a full event listing.
///
/// More than one running event breaks a backend invariant. It is reported,
/// never repaired.
pub fn running_event(events: &[Event]) -> Result<Option<&Event>, CoreError> {
    let mut running = events.iter().filter(|e| e.is_running());
    let first = running.next();
    let extra = running.count();
    if extra > 0 {
        let count = extra + 1;
        tracing::warn!(count, "Backend reports more than one running event");
        return Err(CoreError::MultipleRunning { count });
    }
    Ok(first)
}
