//! Placement rules and timer side effects of the event store, end to end
//! through the public API.

use std::sync::Arc;

use assert_matches::assert_matches;
use retriage_client::{parse_update, RemoteUpdate};
use retriage_core::{
    Condition, Event, ManualClock, Patient, PatientPool, PoolType, Role, Status,
};
use retriage_sync::{
    DragController, DropOutcome, ErrorKind, ErrorNotice, EventStore, RecordingPublisher,
    RemoteOutcome, SyncError,
};

const T0: i64 = 1_700_000_000_000;

type TestStore = EventStore<RecordingPublisher, Arc<ManualClock>>;

fn bay(id: i64, queue_size: usize, patients: Vec<Patient>) -> PatientPool {
    PatientPool::new(id, format!("Bay {id}"), PoolType::Bay, queue_size).with_patients(patients)
}

fn med(id: i64, queue_size: usize, patients: Vec<Patient>) -> PatientPool {
    PatientPool::new(id, format!("CT {id}"), PoolType::MedService, queue_size)
        .with_process_time(20_000)
        .with_patients(patients)
}

fn floor(id: i64, patients: Vec<Patient>) -> PatientPool {
    PatientPool::new(id, format!("Floor {id}"), PoolType::Floor, 10).with_patients(patients)
}

fn patient(id: i64) -> Patient {
    Patient::new(1000 + id, Condition::Delayed).with_id(id)
}

fn setup(role: Role, pools: Vec<PatientPool>) -> (TestStore, RecordingPublisher, Arc<ManualClock>) {
    let publisher = RecordingPublisher::new();
    let clock = Arc::new(ManualClock::new(T0));
    let mut store = EventStore::with_clock(role, publisher.clone(), clock.clone());
    store.load_initial(Some(
        Event::new("Drill", 3_600_000)
            .with_id(1)
            .with_status(Status::Running)
            .with_pools(pools),
    ));
    (store, publisher, clock)
}

// ---------------------------------------------------------------------------
// Test: successful moves conserve the patient count
// ---------------------------------------------------------------------------

#[test]
fn moves_conserve_patient_count() {
    let (mut store, _, _) = setup(
        Role::Nurse,
        vec![
            bay(1, 5, vec![patient(1), patient(2).with_processed(true)]),
            med(2, 3, vec![]),
            floor(3, vec![]),
        ],
    );
    let total = store.snapshot().unwrap().patient_count();

    store.move_patient(1, 1, 2).unwrap();
    store.move_patient(2, 1, 2).unwrap();
    store.move_patient(2, 2, 3).unwrap();

    assert_eq!(store.snapshot().unwrap().patient_count(), total);
}

// ---------------------------------------------------------------------------
// Test: a full destination refuses and nothing changes
// ---------------------------------------------------------------------------

#[test]
fn full_destination_rejects_move() {
    let (mut store, publisher, _) = setup(
        Role::Nurse,
        vec![bay(1, 5, vec![patient(1)]), bay(2, 1, vec![patient(2)])],
    );
    let before = store.snapshot().unwrap().clone();

    assert_matches!(
        store.move_patient(1, 1, 2),
        Err(SyncError::CapacityExceeded { pool_id: 2, queue_size: 1 })
    );
    assert_eq!(store.snapshot().unwrap(), &before);
    assert_eq!(publisher.count(), 0);
}

// ---------------------------------------------------------------------------
// Test: Floor placements are final
// ---------------------------------------------------------------------------

#[test]
fn floor_is_terminal() {
    let (mut store, _, _) = setup(
        Role::Director,
        vec![
            floor(1, vec![patient(1), patient(2).with_processed(true)]),
            bay(2, 5, vec![]),
            med(3, 5, vec![]),
        ],
    );

    for (patient_id, destination) in [(1, 2), (1, 3), (2, 2), (2, 3), (1, 1)] {
        assert_matches!(
            store.move_patient(patient_id, 1, destination),
            Err(SyncError::InvalidTransition(_))
        );
    }
}

// ---------------------------------------------------------------------------
// Test: MedService head is locked until processed
// ---------------------------------------------------------------------------

#[test]
fn med_service_head_locked_until_processed() {
    let (mut store, _, _) = setup(
        Role::Nurse,
        vec![
            med(1, 3, vec![patient(1), patient(2)]),
            med(2, 3, vec![patient(3).with_processed(true)]),
            bay(3, 5, vec![]),
        ],
    );

    let err = store.move_patient(1, 1, 3).unwrap_err();
    assert_matches!(err, SyncError::PatientLocked { patient_id: 1 });
    assert_eq!(err.kind(), ErrorKind::PatientLocked);

    // Only the head is locked.
    store.move_patient(2, 1, 3).unwrap();
    store.move_patient(3, 2, 3).unwrap();
}

// ---------------------------------------------------------------------------
// Test: moved patients are un-processed; timers restart
// ---------------------------------------------------------------------------

#[test]
fn move_resets_processing_and_stamps_timers() {
    let (mut store, _, clock) = setup(
        Role::Nurse,
        vec![
            med(1, 3, vec![patient(1).with_processed(true), patient(2)]),
            med(2, 3, vec![]),
        ],
    );
    clock.advance(12_345);

    store.move_patient(1, 1, 2).unwrap();

    let event = store.snapshot().unwrap();
    let origin = event.pool(1).unwrap();
    let destination = event.pool(2).unwrap();
    assert_eq!(origin.head().unwrap().id, Some(2));
    assert_eq!(origin.started_processing_at, Some(T0 + 12_345));
    assert!(!destination.patients[0].processed);
    assert_eq!(destination.started_processing_at, Some(T0 + 12_345));
}

#[test]
fn joining_a_busy_med_service_does_not_restart_its_timer() {
    let mut busy = med(2, 3, vec![patient(9)]);
    busy.started_processing_at = Some(T0 - 5_000);
    let (mut store, _, _) = setup(Role::Nurse, vec![bay(1, 5, vec![patient(1)]), busy]);

    store.move_patient(1, 1, 2).unwrap();

    let pool = store.snapshot().unwrap().pool(2).unwrap();
    assert_eq!(pool.patients.len(), 2);
    assert_eq!(pool.started_processing_at, Some(T0 - 5_000));
}

// ---------------------------------------------------------------------------
// Test: remote "no active event" clears the snapshot
// ---------------------------------------------------------------------------

#[test]
fn remote_clear_empties_the_store() {
    let (mut store, _, _) = setup(Role::Nurse, vec![bay(1, 5, vec![patient(1)])]);

    let update = parse_update(r#"{"httpStatus":404,"error":"none","data":null}"#).unwrap();
    assert_eq!(store.apply_remote(update), RemoteOutcome::Cleared);

    assert_matches!(store.snapshot(), Err(SyncError::NoActiveEvent));
    assert_matches!(store.move_patient(1, 1, 1), Err(SyncError::NoActiveEvent));
}

#[test]
fn remote_snapshot_round_trips_through_the_wire() {
    let (mut store, publisher, _) = setup(
        Role::Nurse,
        vec![bay(1, 5, vec![patient(1)]), bay(2, 5, vec![])],
    );
    store.move_patient(1, 1, 2).unwrap();

    let published = publisher.last().unwrap();
    let body = format!(
        r#"{{"httpStatus":200,"data":{}}}"#,
        serde_json::to_string(&published).unwrap()
    );
    store.apply_remote(parse_update(&body).unwrap());

    assert_eq!(store.snapshot().unwrap(), &published);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn processed_bay_patient_enters_empty_med_service() {
    let (mut store, publisher, _) = setup(
        Role::Nurse,
        vec![
            bay(1, 5, vec![patient(1).with_processed(true)]),
            med(2, 1, vec![]),
        ],
    );

    store.move_patient(1, 1, 2).unwrap();

    let event = store.snapshot().unwrap();
    assert!(event.pool(1).unwrap().patients.is_empty());
    let med = event.pool(2).unwrap();
    assert_eq!(med.patients.len(), 1);
    assert!(!med.patients[0].processed);
    assert_eq!(med.started_processing_at, Some(T0));
    assert_eq!(publisher.count(), 1);
}

#[test]
fn unprocessed_med_service_head_cannot_return_to_bay() {
    let (mut store, publisher, _) = setup(
        Role::Nurse,
        vec![med(1, 1, vec![patient(1)]), bay(2, 5, vec![])],
    );
    let before = store.snapshot().unwrap().clone();

    assert_matches!(
        store.move_patient(1, 1, 2),
        Err(SyncError::PatientLocked { patient_id: 1 })
    );
    assert_eq!(store.snapshot().unwrap(), &before);
    assert_eq!(publisher.count(), 0);
}

#[test]
fn toggle_pauses_and_resumes() {
    let (mut store, publisher, clock) = setup(Role::Director, vec![]);
    store.load_initial(Some(
        Event::new("Drill", 600_000)
            .with_id(1)
            .with_status(Status::Paused),
    ));

    clock.set(T0 + 1_000);
    let running = store.toggle_run_state().unwrap();
    assert_eq!(running.status, Status::Running);
    assert_eq!(running.time_of_status_change, T0 + 1_000);
    assert_eq!(running.remaining_duration, 600_000);

    clock.set(T0 + 61_000);
    let paused = store.toggle_run_state().unwrap();
    assert_eq!(paused.status, Status::Paused);
    assert_eq!(paused.time_of_status_change, T0 + 61_000);

    assert_eq!(publisher.count(), 2);
    assert_eq!(publisher.published()[0].status, Status::Running);
}

#[test]
fn created_and_ended_events_start_running() {
    for status in [Status::Created, Status::Ended] {
        let (mut store, _, _) = setup(Role::Director, vec![]);
        store.apply_remote(RemoteUpdate::Snapshot(Box::new(
            Event::new("Drill", 1_000).with_id(2).with_status(status),
        )));
        assert_eq!(store.toggle_run_state().unwrap().status, Status::Running);
    }
}

// ---------------------------------------------------------------------------
// Drag gestures drive the store
// ---------------------------------------------------------------------------

#[test]
fn rejected_drop_surfaces_notice_and_clears_overlay() {
    let (mut store, _, _) = setup(
        Role::Nurse,
        vec![med(1, 2, vec![patient(1)]), bay(2, 5, vec![])],
    );
    let mut notice = ErrorNotice::new();
    let mut drag = DragController::new();

    drag.drag_start(1, store.snapshot().unwrap());
    drag.drag_over(1);
    let outcome = drag.drag_end(Some(2), &mut store, &mut notice);

    assert_eq!(outcome, DropOutcome::Rejected(ErrorKind::PatientLocked));
    assert!(drag.active_patient().is_none());
    assert_eq!(notice.current().unwrap().kind, ErrorKind::PatientLocked);

    notice.dismiss();
    drag.drag_start(1, store.snapshot().unwrap());
    drag.drag_over(1);
    drag.drag_end(Some(2), &mut store, &mut notice);
    assert!(notice.is_visible());
}

#[test]
fn same_pool_drop_issues_nothing() {
    let (mut store, publisher, _) = setup(Role::Nurse, vec![bay(1, 5, vec![patient(1)])]);
    let mut notice = ErrorNotice::new();
    let mut drag = DragController::new();

    drag.drag_start(1, store.snapshot().unwrap());
    drag.drag_over(1);

    assert_eq!(drag.drag_end(Some(1), &mut store, &mut notice), DropOutcome::Ignored);
    assert_eq!(publisher.count(), 0);
}
