//! Task lifecycle orchestration.
//!
//! This module owns the submit → create → poll → settle lifecycle and the
//! resumption of an in-flight task after a restart. UI/CLI layers call into
//! the `Orchestrator` and read task state back from the durable store.

mod assist;
mod completion;
mod controller;

pub(crate) use controller::Orchestrator;

use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot guard for startup resumption. Owned by the application root and
/// handed to `Orchestrator::resume` by reference.
#[derive(Debug, Default)]
pub(crate) struct ResumeLatch {
    fired: AtomicBool,
}

impl ResumeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once.
    pub fn try_claim(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::ResumeLatch;

    #[test]
    fn latch_fires_once() {
        let latch = ResumeLatch::new();
        assert!(latch.try_claim());
        assert!(!latch.try_claim());
        assert!(!latch.try_claim());
    }
}
