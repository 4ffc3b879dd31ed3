//! Why a mutation was refused, and how each failure is classified for
//! display.

use retriage_client::ChannelError;
use retriage_core::{DbId, Role};

/// Everything a mutation on the live event can be refused for.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No event is loaded, or the backend says none is running.
    #[error("There is no active event")]
    NoActiveEvent,

    #[error("Patient {patient_id} is not in pool {pool_id}")]
    PatientNotFound { patient_id: DbId, pool_id: DbId },

    #[error("Pool {pool_id} does not exist in the active event")]
    PoolNotFound { pool_id: DbId },

    /// The origin pool forbids the move (Floor placements are final, new
    /// patients may only enter a Bay).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Head-of-line MedService patient still being processed.
    #[error("Patient {patient_id} is still being processed")]
    PatientLocked { patient_id: DbId },

    #[error("Pool {pool_id} is full ({queue_size} patients)")]
    CapacityExceeded { pool_id: DbId, queue_size: usize },

    #[error("A {role} may not {action}")]
    Unauthorized { role: Role, action: &'static str },

    /// The mutation was applied locally but could not be handed to the
    /// update channel.
    #[error("Could not publish the update: {0}")]
    Transport(#[from] ChannelError),
}

/// Coarse classification used when surfacing errors to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    PatientLocked,
    CapacityExceeded,
    Unauthorized,
    TransientNetwork,
    /// Reported by the backend on the update topic.
    ServerReported,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NoActiveEvent
            | SyncError::PatientNotFound { .. }
            | SyncError::PoolNotFound { .. } => ErrorKind::NotFound,
            SyncError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            SyncError::PatientLocked { .. } => ErrorKind::PatientLocked,
            SyncError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            SyncError::Unauthorized { .. } => ErrorKind::Unauthorized,
            SyncError::Transport(_) => ErrorKind::TransientNetwork,
        }
    }

    /// True when retrying the same intent later could succeed without any
    /// change in state.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientNetwork
    }
}
