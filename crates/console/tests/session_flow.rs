//! Scripted operator sessions: parsed lines go through the session exactly
//! as the binary feeds them, against an in-memory publisher.

use std::sync::Arc;

use retriage_client::{parse_update, RemoteUpdate};
use retriage_console::commands::{parse, Command};
use retriage_console::session::Session;
use retriage_core::{Condition, Event, ManualClock, Patient, PatientPool, PoolType, Role, Status};
use retriage_sync::{ErrorKind, EventStore, RecordingPublisher};

fn drill() -> Event {
    Event::new("Drill", 600_000)
        .with_id(1)
        .with_status(Status::Running)
        .with_pools(vec![
            PatientPool::new(10, "Triage Bay", PoolType::Bay, 4).with_patients(vec![
                Patient::new(301, Condition::Minor).with_id(1),
                Patient::new(302, Condition::Immediate).with_id(2),
            ]),
            PatientPool::new(20, "CT", PoolType::MedService, 1).with_process_time(60_000),
            PatientPool::new(30, "Ward", PoolType::Floor, 10),
        ])
}

fn session(role: Role) -> (Session<RecordingPublisher, Arc<ManualClock>>, RecordingPublisher) {
    let publisher = RecordingPublisher::new();
    let clock = Arc::new(ManualClock::new(0));
    let mut session = Session::new(EventStore::with_clock(role, publisher.clone(), clock));
    session.load_initial(Some(drill()));
    (session, publisher)
}

fn run(session: &mut Session<RecordingPublisher, Arc<ManualClock>>, line: &str) -> String {
    match parse(line).unwrap() {
        Some(Command::Intent(intent)) => session.apply(intent),
        other => panic!("'{line}' is not an intent: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: a drag gesture typed step by step moves the patient
// ---------------------------------------------------------------------------

#[test]
fn typed_drag_gesture_moves_patient() {
    let (mut session, publisher) = session(Role::Nurse);

    assert_eq!(run(&mut session, "drag 2"), "dragging patient 2");
    assert!(session.render().contains("dragging: card 302 (Immediate)"));
    run(&mut session, "over 10");
    run(&mut session, "over 30");
    let reply = run(&mut session, "drop 20");

    assert_eq!(reply, "moved patient 2 from pool 10 to pool 20");
    let event = publisher.last().unwrap();
    assert_eq!(event.pool(20).unwrap().patients[0].card_id, 302);
    assert!(session.drag().active_patient().is_none());
}

// ---------------------------------------------------------------------------
// Test: refused intents end up in the notice
// ---------------------------------------------------------------------------

#[test]
fn refusals_are_reported_and_dismissable() {
    let (mut session, publisher) = session(Role::Nurse);
    run(&mut session, "move 1 10 20");

    let reply = run(&mut session, "move 2 10 20");
    assert!(reply.starts_with("error: Pool 20 is full"));
    assert_eq!(
        session.notice().current().unwrap().kind,
        ErrorKind::CapacityExceeded
    );

    let reply = run(&mut session, "condition 2 10 deceased");
    assert!(reply.starts_with("error: A Nurse may not"));
    assert_eq!(publisher.count(), 1);

    session.notice_mut().dismiss();
    assert!(!session.render().contains("!"));
}

// ---------------------------------------------------------------------------
// Test: remote updates flow through the session
// ---------------------------------------------------------------------------

#[test]
fn remote_error_and_clear() {
    let (mut session, _) = session(Role::Director);
    run(&mut session, "drag 1");

    session.on_remote(
        parse_update(r#"{"httpStatus":400,"error":"Nurse not found or is a Guest."}"#).unwrap(),
    );
    assert!(session
        .render()
        .contains("! Nurse not found or is a Guest."));
    assert!(session.store().active().is_some());

    session.on_remote(RemoteUpdate::NoActiveEvent);
    assert!(session.render().starts_with("no active event"));
    assert!(session.drag().active_patient().is_none());
}

#[test]
fn director_admits_and_toggles() {
    let (mut session, publisher) = session(Role::Director);

    assert_eq!(
        run(&mut session, "add 900 delayed 10"),
        "added card 900 (Delayed) to pool 10"
    );
    assert_eq!(run(&mut session, "toggle"), "event is now Paused");
    assert_eq!(run(&mut session, "discharge 1 10"), "discharge patient 1 from pool 10");

    let last = publisher.last().unwrap();
    assert_eq!(last.status, Status::Paused);
    assert_eq!(last.pool(10).unwrap().patients.len(), 2);
}
