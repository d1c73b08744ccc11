//! The do-nothing monitor.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::events::{Monitor, RuntimeEvent};

/// Discards every event; the default when no monitor is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn record(&self, _event: &RuntimeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_accepts_events() {
        let monitor = NoopMonitor;
        monitor.record(&RuntimeEvent::SystemShutdown);
        monitor.record(&RuntimeEvent::SystemStarted { workers: 4 });
    }
}
