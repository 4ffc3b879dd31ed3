//! One operator session: the event store, the drag gesture in progress and
//! the error slot, driven by parsed console intents and remote updates.

use std::fmt::Write as _;

use retriage_client::RemoteUpdate;
use retriage_core::{Clock, EpochMillis, Event, Millis, PoolType, SystemClock};
use retriage_sync::{
    DragController, DropOutcome, ErrorNotice, EventStore, RemoteOutcome, SnapshotPublisher,
    SyncError,
};

use crate::commands::Intent;

pub struct Session<P, C = SystemClock> {
    store: EventStore<P, C>,
    drag: DragController,
    notice: ErrorNotice,
}

impl<P: SnapshotPublisher, C: Clock> Session<P, C> {
    pub fn new(store: EventStore<P, C>) -> Self {
        Self {
            store,
            drag: DragController::new(),
            notice: ErrorNotice::new(),
        }
    }

    pub fn store(&self) -> &EventStore<P, C> {
        &self.store
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn notice(&self) -> &ErrorNotice {
        &self.notice
    }

    pub fn notice_mut(&mut self) -> &mut ErrorNotice {
        &mut self.notice
    }

    pub fn load_initial(&mut self, event: Option<Event>) {
        self.drag.cancel();
        self.store.load_initial(event);
    }

    /// Apply a remote update. Backend errors go to the notice; an ended
    /// event abandons any drag in progress.
    pub fn on_remote(&mut self, update: RemoteUpdate) -> RemoteOutcome {
        let outcome = self.store.apply_remote(update);
        match &outcome {
            RemoteOutcome::Rejected(message) => self.notice.report_server(message.clone()),
            RemoteOutcome::Cleared => self.drag.cancel(),
            RemoteOutcome::Replaced { .. } => {}
        }
        outcome
    }

    /// Apply one intent and describe the result in a line of text.
    /// Failures are also left in the notice.
    pub fn apply(&mut self, intent: Intent) -> String {
        match self.try_apply(intent) {
            Ok(reply) => reply,
            Err(e) => {
                self.notice.report(&e);
                format!("error: {e}")
            }
        }
    }

    fn try_apply(&mut self, intent: Intent) -> Result<String, SyncError> {
        let reply = match intent {
            Intent::Move {
                patient_id,
                from,
                to,
            } => {
                self.store.move_patient(patient_id, from, to)?;
                format!("moved patient {patient_id} from pool {from} to pool {to}")
            }
            Intent::Add {
                card_id,
                condition,
                pool_id,
            } => {
                let patient = self.store.add_patient(card_id, condition, pool_id)?;
                match pool_id {
                    Some(pool_id) => {
                        format!("added card {} ({}) to pool {pool_id}", patient.card_id, patient.condition)
                    }
                    None => format!("added card {} ({})", patient.card_id, patient.condition),
                }
            }
            Intent::Remove {
                patient_id,
                pool_id,
                mode,
            } => {
                self.store.remove_patient(patient_id, pool_id, mode)?;
                format!("{mode:?} patient {patient_id} from pool {pool_id}").to_lowercase()
            }
            Intent::UpdateCondition {
                patient_id,
                pool_id,
                condition,
            } => {
                self.store.update_condition(patient_id, pool_id, condition)?;
                format!("patient {patient_id} is now {condition}")
            }
            Intent::Toggle => {
                let event = self.store.toggle_run_state()?;
                format!("event is now {}", event.status)
            }
            Intent::DragStart(patient_id) => {
                let event = self.store.snapshot()?;
                if self.drag.drag_start(patient_id, event) {
                    format!("dragging patient {patient_id}")
                } else {
                    format!("no patient {patient_id} to drag")
                }
            }
            Intent::DragOver(pool_id) => {
                self.drag.drag_over(pool_id);
                format!("over pool {pool_id}")
            }
            Intent::Drop(target) => {
                match self.drag.drag_end(target, &mut self.store, &mut self.notice) {
                    DropOutcome::Moved {
                        patient_id,
                        from,
                        to,
                    } => format!("moved patient {patient_id} from pool {from} to pool {to}"),
                    DropOutcome::Ignored => "drop ignored".to_string(),
                    DropOutcome::Rejected(_) => match self.notice.current() {
                        Some(notice) => format!("error: {}", notice.message),
                        None => "drop rejected".to_string(),
                    },
                }
            }
            Intent::Cancel => {
                self.drag.cancel();
                "drag cancelled".to_string()
            }
        };
        Ok(reply)
    }

    /// Text view of the active event, the drag overlay and any error.
    pub fn render(&self) -> String {
        let now = self.store.clock().now_millis();
        let mut out = match self.store.active() {
            Some(event) => render_event(event, now),
            None => "no active event\n".to_string(),
        };
        if let Some(patient) = self.drag.active_patient() {
            let _ = writeln!(out, "  dragging: card {} ({})", patient.card_id, patient.condition);
        }
        if let Some(notice) = self.notice.current() {
            let _ = writeln!(out, "  ! {}", notice.message);
        }
        out
    }
}

/// Render an event as of `now`, with the derived clock and per-pool
/// processing timers.
pub fn render_event(event: &Event, now: EpochMillis) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} [{}] {} left",
        event.name,
        event.status,
        clock_text(event.remaining_at(now))
    );
    for pool in &event.pools {
        let id = pool.id.map_or_else(|| "?".to_string(), |id| id.to_string());
        let _ = write!(
            out,
            "  #{id} {} <{}> {}/{}",
            pool.name,
            pool.pool_type,
            pool.patients.len(),
            pool.queue_size
        );
        if pool.pool_type == PoolType::MedService {
            if let Some(left) = pool.processing_remaining_at(now) {
                let _ = write!(out, " (head done in {})", clock_text(left));
            }
        }
        let _ = writeln!(out);
        for (index, patient) in pool.patients.iter().enumerate() {
            let id = patient
                .id
                .map_or_else(|| "new".to_string(), |id| id.to_string());
            let lock = if pool.is_locked_at(index) { " *" } else { "" };
            let _ = writeln!(
                out,
                "      {id}: card {} {}{lock}",
                patient.card_id, patient.condition
            );
        }
    }
    out
}

/// `mm:ss` for a duration in milliseconds.
fn clock_text(ms: Millis) -> String {
    let secs = ms.max(0) / 1_000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
