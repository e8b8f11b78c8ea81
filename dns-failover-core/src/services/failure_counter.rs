//! 接口失败计数器

use std::sync::atomic::{AtomicU32, Ordering};

/// Consecutive probe-infrastructure failures.
///
/// Owned by whoever runs cycles and shared with the reporter. Any successful
/// probe resets it; infra failures are only notified once it reaches the
/// threshold.
#[derive(Debug)]
pub struct InfraFailureCounter {
    count: AtomicU32,
    threshold: u32,
}

impl InfraFailureCounter {
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    /// Record one failure and return the new count.
    pub fn increment(&self) -> u32 {
        let count = self.count.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        log::info!("Probe backend failures: {count}/{}", self.threshold);
        count
    }

    pub fn reset(&self) {
        let previous = self.count.swap(0, Ordering::SeqCst);
        if previous > 0 {
            log::info!("Probe backend recovered, resetting failure count (was {previous})");
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn is_over_threshold(&self) -> bool {
        self.count() >= self.threshold
    }
}
