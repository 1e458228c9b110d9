//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the cache stores.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries at configured intervals

mod sweep;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use sweep::spawn_sweep_task;

// == Stop Flag ==
/// Cooperative cancellation flag checked by background loops.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared_between_clones() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_stopped());

        flag.stop();
        assert!(clone.is_stopped());
    }
}
