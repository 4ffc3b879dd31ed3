//! Domain model for the Retriage mass-casualty training client.
//!
//! Plain data shapes for events, pools, patients and users, their JSON
//! wire format, and the derived values (remaining time, processing
//! locks) every other crate relies on. No I/O lives here.

pub mod clock;
pub mod error;
pub mod event;
pub mod patient;
pub mod pool;
mod serde_util;
pub mod template;
pub mod types;
pub mod user;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use event::{running_event, Event, PatientLocation, Status};
pub use patient::{Condition, Patient};
pub use pool::{PatientPool, PoolType};
pub use template::{EventTemplate, PoolTemplate};
pub use types::{DbId, EpochMillis, Millis};
pub use user::{Role, User};
