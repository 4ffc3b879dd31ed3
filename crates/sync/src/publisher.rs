//! Outbound seam of the store.
//!
//! The store hands every mutated snapshot to a [`SnapshotPublisher`]. In
//! the running client that is the channel's [`ChannelHandle`]; tests and
//! offline sessions use [`RecordingPublisher`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use retriage_client::{ChannelError, ChannelHandle};
use retriage_core::Event;

/// Fire-and-forget sink for full event snapshots.
pub trait SnapshotPublisher {
    fn publish(&self, event: &Event) -> Result<(), ChannelError>;
}

impl SnapshotPublisher for ChannelHandle {
    fn publish(&self, event: &Event) -> Result<(), ChannelError> {
        ChannelHandle::publish(self, event)
    }
}

impl<P: SnapshotPublisher + ?Sized> SnapshotPublisher for Box<P> {
    fn publish(&self, event: &Event) -> Result<(), ChannelError> {
        (**self).publish(event)
    }
}

// ---------------------------------------------------------------------------
// RecordingPublisher
// ---------------------------------------------------------------------------

/// Keeps every published snapshot in memory.
///
/// Clones share the same log, so a test can keep one clone and give the
/// other to the store.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<Event>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail with [`ChannelError::Closed`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Event> {
        self.log().clone()
    }

    pub fn count(&self) -> usize {
        self.log().len()
    }

    pub fn last(&self) -> Option<Event> {
        self.log().last().cloned()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        // A poisoned log still holds valid snapshots.
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotPublisher for RecordingPublisher {
    fn publish(&self, event: &Event) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.log().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let publisher = RecordingPublisher::new();
        let boxed: Box<dyn SnapshotPublisher> = Box::new(publisher.clone());

        boxed.publish(&Event::new("Drill", 1_000)).unwrap();
        assert_eq!(publisher.count(), 1);
        assert_eq!(publisher.last().unwrap().name, "Drill");
    }

    #[test]
    fn failing_publisher_records_nothing() {
        let publisher = RecordingPublisher::new();
        publisher.set_failing(true);

        assert!(matches!(
            publisher.publish(&Event::new("Drill", 1_000)),
            Err(ChannelError::Closed)
        ));
        assert!(publisher.published().is_empty());
    }
}
