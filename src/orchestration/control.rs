use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request observed at chunk-cycle boundaries.
///
/// A child signal reports a stop when it or any ancestor was asked to stop,
/// which lets a fail-fast partition group stop its siblings without touching
/// the owning job.
#[derive(Debug, Clone)]
pub struct StopSignal {
    flags: Vec<Arc<AtomicBool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// Derive a signal that also observes every stop request on `self`
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self { flags }
    }

    /// Ask this signal and all of its children to stop
    pub fn request_stop(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_observes_parent() {
        let job = StopSignal::new();
        let partitions = job.child();
        let partition = partitions.clone();

        assert!(!partition.is_stop_requested());
        job.request_stop();
        assert!(partition.is_stop_requested());
    }

    #[test]
    fn test_child_stop_does_not_reach_parent() {
        let job = StopSignal::new();
        let group = job.child();

        group.request_stop();
        assert!(group.is_stop_requested());
        assert!(!job.is_stop_requested());
    }

    #[test]
    fn test_default_signal() {
        let signal = StopSignal::default();
        assert!(!signal.is_stop_requested());
        signal.request_stop();
        assert!(signal.is_stop_requested());
    }
}
