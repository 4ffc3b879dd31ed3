//! Drag-and-drop placement.
//!
//! A drag gesture arrives as three phases: start (a patient was picked
//! up), over (the pointer is above a pool) and end (dropped, possibly onto
//! nothing). Only the patient is known at the start; the first pool
//! hovered is latched as the origin, since a drag always begins inside the
//! patient's own pool. A completed gesture becomes at most one
//! [`EventStore::move_patient`] call.

use retriage_core::{Clock, DbId, Event, Patient};

use crate::error::ErrorKind;
use crate::notice::ErrorNotice;
use crate::publisher::SnapshotPublisher;
use crate::store::EventStore;

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        patient_id: DbId,
        /// Copy of the patient for the drag overlay.
        patient: Box<Patient>,
        /// Latched on the first hover.
        origin: Option<DbId>,
    },
}

/// Result of finishing a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Nothing to do: no drag, no origin, no target, or same pool.
    Ignored,
    Moved {
        patient_id: DbId,
        from: DbId,
        to: DbId,
    },
    /// The store refused the move; the error went to the notice.
    Rejected(ErrorKind),
}

#[derive(Debug)]
pub struct DragController {
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The patient being dragged, for rendering the overlay.
    pub fn active_patient(&self) -> Option<&Patient> {
        match &self.state {
            DragState::Dragging { patient, .. } => Some(patient.as_ref()),
            DragState::Idle => None,
        }
    }

    /// Pick up a patient. Looks the patient up across every pool; an
    /// unknown id leaves the controller idle.
    pub fn drag_start(&mut self, patient_id: DbId, event: &Event) -> bool {
        match event.patient(patient_id) {
            Some(patient) => {
                tracing::debug!(patient_id, "Drag started");
                self.state = DragState::Dragging {
                    patient_id,
                    patient: Box::new(patient.clone()),
                    origin: None,
                };
                true
            }
            None => {
                tracing::debug!(patient_id, "Drag started on unknown patient, ignored");
                self.state = DragState::Idle;
                false
            }
        }
    }

    /// Pointer is over `target`. The first hover of a drag fixes the
    /// origin; later hovers change nothing.
    pub fn drag_over(&mut self, target: DbId) {
        if let DragState::Dragging { origin, .. } = &mut self.state {
            if origin.is_none() {
                tracing::trace!(pool_id = target, "Drag origin latched");
                *origin = Some(target);
            }
        }
    }

    /// Drop onto `drop_target` (or onto nothing). Always returns to idle.
    pub fn drag_end<P, C>(
        &mut self,
        drop_target: Option<DbId>,
        store: &mut EventStore<P, C>,
        notice: &mut ErrorNotice,
    ) -> DropOutcome
    where
        P: SnapshotPublisher,
        C: Clock,
    {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let DragState::Dragging {
            patient_id,
            origin: Some(from),
            ..
        } = state
        else {
            return DropOutcome::Ignored;
        };
        let Some(to) = drop_target else {
            return DropOutcome::Ignored;
        };
        if from == to {
            return DropOutcome::Ignored;
        }

        match store.move_patient(patient_id, from, to) {
            Ok(()) => DropOutcome::Moved {
                patient_id,
                from,
                to,
            },
            Err(e) => {
                tracing::info!(patient_id, from, to, error = %e, "Drop rejected");
                let kind = e.kind();
                notice.report(&e);
                DropOutcome::Rejected(kind)
            }
        }
    }

    /// Abandon the gesture with no side effects.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use retriage_core::{Condition, PatientPool, PoolType, Role};

    use super::*;
    use crate::publisher::RecordingPublisher;

    fn loaded_store() -> EventStore<RecordingPublisher> {
        let event = Event::new("Drill", 60_000).with_id(1).with_pools(vec![
            PatientPool::new(10, "Bay", PoolType::Bay, 4)
                .with_patients(vec![Patient::new(501, Condition::Minor).with_id(5)]),
            PatientPool::new(20, "Ward", PoolType::Floor, 4),
        ]);
        let mut store = EventStore::new(Role::Nurse, RecordingPublisher::new());
        store.load_initial(Some(event));
        store
    }

    #[test]
    fn full_gesture_moves_patient() {
        let mut store = loaded_store();
        let mut notice = ErrorNotice::new();
        let mut drag = DragController::new();

        assert!(drag.drag_start(5, store.snapshot().unwrap()));
        assert_eq!(drag.active_patient().unwrap().card_id, 501);
        drag.drag_over(10);
        drag.drag_over(20);

        let outcome = drag.drag_end(Some(20), &mut store, &mut notice);

        assert_eq!(
            outcome,
            DropOutcome::Moved {
                patient_id: 5,
                from: 10,
                to: 20
            }
        );
        assert_eq!(drag.state(), &DragState::Idle);
        assert!(!notice.is_visible());
    }

    #[test]
    fn unknown_patient_stays_idle() {
        let store = loaded_store();
        let mut drag = DragController::new();

        assert!(!drag.drag_start(99, store.snapshot().unwrap()));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drop_without_origin_or_target_is_ignored() {
        let mut store = loaded_store();
        let mut notice = ErrorNotice::new();
        let mut drag = DragController::new();

        drag.drag_start(5, store.snapshot().unwrap());
        assert_eq!(drag.drag_end(Some(20), &mut store, &mut notice), DropOutcome::Ignored);

        drag.drag_start(5, store.snapshot().unwrap());
        drag.drag_over(10);
        assert_eq!(drag.drag_end(None, &mut store, &mut notice), DropOutcome::Ignored);

        assert_eq!(store.publisher().count(), 0);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn cancel_discards_gesture() {
        let mut store = loaded_store();
        let mut notice = ErrorNotice::new();
        let mut drag = DragController::new();

        drag.drag_start(5, store.snapshot().unwrap());
        drag.drag_over(10);
        drag.cancel();

        assert!(drag.active_patient().is_none());
        assert_eq!(drag.drag_end(Some(20), &mut store, &mut notice), DropOutcome::Ignored);
    }
}
