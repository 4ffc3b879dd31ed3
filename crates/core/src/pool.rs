//! Capacity-bounded patient containers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::patient::Patient;
use crate::serde_util::null_as_default;
use crate::types::{DbId, EpochMillis, Millis};

/// The three kinds of pool an event is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    /// Intake and holding area. Patients are registered into bays.
    Bay,
    /// A service that holds its head-of-line patient for `processTime`.
    MedService,
    /// Terminal placement. Patients never leave a floor.
    Floor,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolType::Bay => "Bay",
            PoolType::MedService => "MedService",
            PoolType::Floor => "Floor",
        })
    }
}

/// A named pool owned by exactly one event.
///
/// `patients` is ordered. For a [`PoolType::MedService`] pool index 0 is
/// the patient currently in service; everyone behind it is waiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DbId>,
    pub name: String,
    pub pool_type: PoolType,
    /// Maximum number of patients the pool may hold.
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue_size: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub patients: Vec<Patient>,
    /// How long a MedService holds its head patient.
    #[serde(default, deserialize_with = "null_as_default")]
    pub process_time: Millis,
    /// Set whenever a new patient becomes head-of-line.
    #[serde(default)]
    pub started_processing_at: Option<EpochMillis>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_discharge: bool,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PatientPool {
    pub fn new(id: DbId, name: impl Into<String>, pool_type: PoolType, queue_size: usize) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            pool_type,
            queue_size,
            patients: Vec::new(),
            process_time: 0,
            started_processing_at: None,
            auto_discharge: false,
            icon: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_patients(mut self, patients: Vec<Patient>) -> Self {
        self.patients = patients;
        self
    }

    pub fn with_process_time(mut self, process_time: Millis) -> Self {
        self.process_time = process_time;
        self
    }

    pub fn has_id(&self, id: DbId) -> bool {
        self.id == Some(id)
    }

    /// Index of the patient with `patient_id` in this pool's queue.
    pub fn position_of(&self, patient_id: DbId) -> Option<usize> {
        self.patients.iter().position(|p| p.has_id(patient_id))
    }

    pub fn head(&self) -> Option<&Patient> {
        self.patients.first()
    }

    pub fn is_full(&self) -> bool {
        self.patients.len() >= self.queue_size
    }

    pub fn remaining_capacity(&self) -> usize {
        self.queue_size.saturating_sub(self.patients.len())
    }

    /// A MedService head that has not finished processing may not leave.
    pub fn is_locked_at(&self, index: usize) -> bool {
        self.pool_type == PoolType::MedService
            && index == 0
            && self.patients.first().is_some_and(|p| !p.processed)
    }

    /// Milliseconds of service left for the head patient, if one is in
    /// service right now.
    pub fn processing_remaining_at(&self, now: EpochMillis) -> Option<Millis> {
        if !self.is_locked_at(0) {
            return None;
        }
        let started = self.started_processing_at?;
        Some((self.process_time - (now - started)).max(0))
    }
}
