//! The live event and every mutation applied to it.
//!
//! [`EventStore`] owns the one authoritative [`Event`] snapshot of a client
//! session. Local intents validate, mutate in place and then publish the
//! whole snapshot; remote updates replace it wholesale. Methods take
//! `&mut self` and run to completion, so intents and remote updates are
//! applied strictly in the order the driver hands them over.
//!
//! Publishing happens after the local mutation. When it fails the mutation
//! stays applied and the caller gets [`SyncError::Transport`]; the next
//! remote snapshot settles the state either way.

use retriage_client::RemoteUpdate;
use retriage_core::{
    Clock, Condition, DbId, Event, Patient, PoolType, Role, SystemClock,
};

use crate::error::SyncError;
use crate::publisher::SnapshotPublisher;

/// How a patient leaves the event. Both modes splice the patient out of
/// its pool; the distinction is only recorded in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    Delete,
    Discharge,
}

/// What [`EventStore::apply_remote`] did with an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The local snapshot was replaced.
    Replaced { event_id: Option<DbId> },
    /// No event is active any more.
    Cleared,
    /// The backend reported an error; the snapshot is unchanged.
    Rejected(String),
}

/// Single owner of the active event.
pub struct EventStore<P, C = SystemClock> {
    role: Role,
    publisher: P,
    clock: C,
    current: Option<Event>,
}

impl<P: SnapshotPublisher> EventStore<P, SystemClock> {
    /// A store stamping times from the system clock.
    pub fn new(role: Role, publisher: P) -> Self {
        Self::with_clock(role, publisher, SystemClock)
    }
}

impl<P: SnapshotPublisher, C: Clock> EventStore<P, C> {
    /// A store stamping times from `clock`; tests pass a manual clock.
    pub fn with_clock(role: Role, publisher: P, clock: C) -> Self {
        Self {
            role,
            publisher,
            clock,
            current: None,
        }
    }

    /// Role every mutation is authorized against.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Where snapshots go after each accepted mutation.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Source of "now" for timers and derived clocks.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ---- reading ----

    /// The active event.
    ///
    /// Returns [`SyncError::NoActiveEvent`] when nothing is loaded; use
    /// [`active`](Self::active) to test for presence first.
    pub fn snapshot(&self) -> Result<&Event, SyncError> {
        self.current.as_ref().ok_or(SyncError::NoActiveEvent)
    }

    pub fn active(&self) -> Option<&Event> {
        self.current.as_ref()
    }

    // ---- remote state ----

    /// Set the baseline from a point-in-time fetch. `None` means nothing is
    /// running, which is a normal state.
    pub fn load_initial(&mut self, event: Option<Event>) {
        match &event {
            Some(e) => tracing::info!(
                event_id = ?e.id,
                status = %e.status,
                pools = e.pools.len(),
                "Loaded active event",
            ),
            None => tracing::info!("No active event at startup"),
        }
        self.current = event;
    }

    /// Apply one update from the backend.
    ///
    /// Snapshots replace the local event wholesale with no field-level
    /// merge, so a remote snapshot that predates a local publish rolls that
    /// change back until the next broadcast.
    pub fn apply_remote(&mut self, update: RemoteUpdate) -> RemoteOutcome {
        match update {
            RemoteUpdate::Snapshot(event) => {
                let event_id = event.id;
                tracing::debug!(
                    event_id = ?event_id,
                    status = %event.status,
                    patients = event.patient_count(),
                    "Remote snapshot applied",
                );
                self.current = Some(*event);
                RemoteOutcome::Replaced { event_id }
            }
            RemoteUpdate::NoActiveEvent => {
                if self.current.take().is_some() {
                    tracing::info!("Active event ended remotely");
                }
                RemoteOutcome::Cleared
            }
            RemoteUpdate::Error(message) => {
                tracing::warn!(message = %message, "Backend rejected an update");
                RemoteOutcome::Rejected(message)
            }
        }
    }

    // ---- local intents ----

    /// Move a patient between pools.
    ///
    /// Checks, in order: the origin holds the patient, the origin is not a
    /// Floor, the patient is not a MedService head still in service, and
    /// the destination exists with room to spare. Moving within the same
    /// pool is accepted and changes nothing.
    pub fn move_patient(
        &mut self,
        patient_id: DbId,
        origin_pool_id: DbId,
        destination_pool_id: DbId,
    ) -> Result<(), SyncError> {
        self.authorize(self.role.can_rearrange(), "move patients")?;
        let now = self.clock.now_millis();
        let event = self.current.as_mut().ok_or(SyncError::NoActiveEvent)?;

        let (origin_index, position) = locate(event, patient_id, origin_pool_id)?;
        let origin = &event.pools[origin_index];
        if origin.pool_type == PoolType::Floor {
            return Err(SyncError::InvalidTransition(format!(
                "patients on {} cannot be moved",
                origin.name
            )));
        }
        if origin.is_locked_at(position) {
            return Err(SyncError::PatientLocked { patient_id });
        }
        if origin_pool_id == destination_pool_id {
            tracing::debug!(patient_id, pool_id = origin_pool_id, "Move within the same pool ignored");
            return Ok(());
        }

        let destination_index = event
            .pool_index(destination_pool_id)
            .ok_or(SyncError::PoolNotFound {
                pool_id: destination_pool_id,
            })?;
        let destination = &event.pools[destination_index];
        if destination.is_full() {
            return Err(SyncError::CapacityExceeded {
                pool_id: destination_pool_id,
                queue_size: destination.queue_size,
            });
        }

        // Remove and append under one borrow; no one observes the patient
        // in neither or both pools.
        let origin = &mut event.pools[origin_index];
        let mut patient = origin.patients.remove(position);
        patient.processed = false;
        if origin.pool_type == PoolType::MedService && position == 0 {
            origin.started_processing_at = Some(now);
        }

        let destination = &mut event.pools[destination_index];
        destination.patients.push(patient);
        if destination.pool_type == PoolType::MedService && destination.patients.len() == 1 {
            destination.started_processing_at = Some(now);
        }

        tracing::info!(
            patient_id,
            from = origin_pool_id,
            to = destination_pool_id,
            "Patient moved",
        );
        self.publish()
    }

    /// Create a patient and, when a Bay is given, place it there.
    ///
    /// New patients only enter through a Bay. The destination's capacity is
    /// checked the same way a move checks it.
    pub fn add_patient(
        &mut self,
        card_id: i64,
        condition: Condition,
        destination_pool_id: Option<DbId>,
    ) -> Result<Patient, SyncError> {
        self.authorize(self.role.can_rearrange(), "add patients")?;
        let event = self.current.as_mut().ok_or(SyncError::NoActiveEvent)?;
        let patient = Patient::new(card_id, condition);

        if let Some(pool_id) = destination_pool_id {
            let pool = event
                .pool_mut(pool_id)
                .ok_or(SyncError::PoolNotFound { pool_id })?;
            if pool.pool_type != PoolType::Bay {
                return Err(SyncError::InvalidTransition(format!(
                    "new patients must enter through a Bay, not {}",
                    pool.name
                )));
            }
            if pool.is_full() {
                return Err(SyncError::CapacityExceeded {
                    pool_id,
                    queue_size: pool.queue_size,
                });
            }
            pool.patients.push(patient.clone());
        }

        tracing::info!(
            card_id,
            condition = %condition,
            pool_id = ?destination_pool_id,
            "Patient added",
        );
        self.publish()?;
        Ok(patient)
    }

    /// Take a patient out of a pool. Removing a MedService head starts the
    /// next patient's service.
    pub fn remove_patient(
        &mut self,
        patient_id: DbId,
        pool_id: DbId,
        mode: RemovalMode,
    ) -> Result<(), SyncError> {
        self.authorize(self.role.can_rearrange(), "remove patients")?;
        let now = self.clock.now_millis();
        let event = self.current.as_mut().ok_or(SyncError::NoActiveEvent)?;

        let (pool_index, position) = locate(event, patient_id, pool_id)?;
        let pool = &mut event.pools[pool_index];
        pool.patients.remove(position);
        if pool.pool_type == PoolType::MedService && position == 0 {
            pool.started_processing_at = Some(now);
        }

        tracing::info!(patient_id, pool_id, mode = ?mode, "Patient removed");
        self.publish()
    }

    pub fn update_condition(
        &mut self,
        patient_id: DbId,
        pool_id: DbId,
        condition: Condition,
    ) -> Result<(), SyncError> {
        self.authorize(self.role.can_direct(), "change a patient's condition")?;
        let event = self.current.as_mut().ok_or(SyncError::NoActiveEvent)?;

        let (pool_index, position) = locate(event, patient_id, pool_id)?;
        let patient = &mut event.pools[pool_index].patients[position];
        let previous = patient.condition;
        patient.condition = condition;

        tracing::info!(patient_id, from = %previous, to = %condition, "Condition updated");
        self.publish()
    }

    /// Start, pause or resume the event clock.
    ///
    /// Running pauses; every other status (re)starts. Only the status and
    /// `timeOfStatusChange` change here; time left is derived from them.
    pub fn toggle_run_state(&mut self) -> Result<Event, SyncError> {
        self.authorize(self.role.can_direct(), "start or pause the event")?;
        let now = self.clock.now_millis();
        let event = self.current.as_mut().ok_or(SyncError::NoActiveEvent)?;

        let previous = event.status;
        event.status = previous.toggled();
        event.time_of_status_change = now;
        let toggled = event.clone();

        tracing::info!(
            event_id = ?toggled.id,
            from = %previous,
            to = %toggled.status,
            "Event run state toggled",
        );
        self.publish()?;
        Ok(toggled)
    }

    // ---- private helpers ----

    fn authorize(&self, allowed: bool, action: &'static str) -> Result<(), SyncError> {
        if allowed {
            return Ok(());
        }
        tracing::debug!(role = %self.role, action, "Intent refused for role");
        Err(SyncError::Unauthorized {
            role: self.role,
            action,
        })
    }

    fn publish(&self) -> Result<(), SyncError> {
        let event = self.snapshot()?;
        self.publisher.publish(event).map_err(|e| {
            tracing::warn!(event_id = ?event.id, error = %e, "Snapshot not published");
            SyncError::Transport(e)
        })
    }
}

/// Pool index and queue position of `patient_id` inside `pool_id`.
fn locate(event: &Event, patient_id: DbId, pool_id: DbId) -> Result<(usize, usize), SyncError> {
    event
        .pool_index(pool_id)
        .and_then(|pool_index| {
            event.pools[pool_index]
                .position_of(patient_id)
                .map(|position| (pool_index, position))
        })
        .ok_or(SyncError::PatientNotFound {
            patient_id,
            pool_id,
        })
}
