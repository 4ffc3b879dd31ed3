//! Client-side synchronization of the active Retriage event.
//!
//! - [`store`] -- the [`EventStore`] owning the live snapshot, local
//!   mutation intents and remote replacement.
//! - [`drag`] -- the drag-and-drop gesture state machine that turns a
//!   completed drag into one move intent.
//! - [`notice`] -- the dismissable error slot failures are surfaced in.
//! - [`publisher`] -- the outbound seam the store publishes through.

pub mod drag;
pub mod error;
pub mod notice;
pub mod publisher;
pub mod store;

pub use drag::{DragController, DragState, DropOutcome};
pub use error::{ErrorKind, SyncError};
pub use notice::{ErrorNotice, Notice};
pub use publisher::{RecordingPublisher, SnapshotPublisher};
pub use store::{EventStore, RemoteOutcome, RemovalMode};
