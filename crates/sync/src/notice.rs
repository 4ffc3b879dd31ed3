//! The single user-visible error slot.

use crate::error::{ErrorKind, SyncError};

/// One user-visible error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: ErrorKind,
    pub message: String,
}

/// The dismissable error slot shown to the user.
///
/// Holds at most one message. Reporting replaces whatever is there, so a
/// new error shows again even after the previous one was dismissed.
#[derive(Debug, Default)]
pub struct ErrorNotice {
    current: Option<Notice>,
}

impl ErrorNotice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: &SyncError) {
        self.show(error.kind(), error.to_string());
    }

    /// An error the backend sent on the update topic.
    pub fn report_server(&mut self, message: impl Into<String>) {
        self.show(ErrorKind::ServerReported, message.into());
    }

    /// A transport failure outside the store (REST call, dropped channel).
    pub fn report_network(&mut self, message: impl Into<String>) {
        self.show(ErrorKind::TransientNetwork, message.into());
    }

    pub fn dismiss(&mut self) -> Option<Notice> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    fn show(&mut self, kind: ErrorKind, message: String) {
        tracing::debug!(?kind, message = %message, "Showing error notice");
        self.current = Some(Notice { kind, message });
    }
}
