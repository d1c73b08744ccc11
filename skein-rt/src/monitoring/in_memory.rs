//! An event recorder for tests and diagnostics.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::events::{Monitor, RuntimeEvent};

/// Records every event in memory.
///
/// Cloning shares the underlying buffer, so a test can keep one clone and
/// hand the other to the system.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMonitor {
    events: Arc<Mutex<Vec<RuntimeEvent>>>,
}

impl InMemoryMonitor {
    /// A fresh, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn snapshot(&self) -> Vec<RuntimeEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Count events matching a predicate.
    pub fn count_matching(&self, pred: impl Fn(&RuntimeEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl Monitor for InMemoryMonitor {
    fn record(&self, event: &RuntimeEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let monitor = InMemoryMonitor::new();
        assert!(monitor.is_empty());
        monitor.record(&RuntimeEvent::SystemStarted { workers: 2 });
        monitor.record(&RuntimeEvent::SystemShutdown);

        let events = monitor.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RuntimeEvent::SystemStarted { workers: 2 });
        assert_eq!(events[1], RuntimeEvent::SystemShutdown);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let monitor = InMemoryMonitor::new();
        let clone = monitor.clone();
        monitor.record(&RuntimeEvent::SystemShutdown);
        assert_eq!(clone.len(), 1);
    }

    #[test]
    fn test_count_matching() {
        let monitor = InMemoryMonitor::new();
        monitor.record(&RuntimeEvent::SystemStarted { workers: 1 });
        monitor.record(&RuntimeEvent::SystemShutdown);
        let shutdowns =
            monitor.count_matching(|e| matches!(e, RuntimeEvent::SystemShutdown));
        assert_eq!(shutdowns, 1);
    }
}
