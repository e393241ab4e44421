//! External stop signals, consulted between loop state transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::Result;

/// Trait for signal checking during loop execution.
#[async_trait]
pub trait SignalChecker: Send + Sync {
    /// Check if the loop should be stopped.
    async fn should_stop(&self) -> Result<bool>;
}

/// Never signals a stop.
pub struct NoOpSignalChecker;

#[async_trait]
impl SignalChecker for NoOpSignalChecker {
    async fn should_stop(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Shared flag flipped by a signal handler or another task.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalChecker for CancelFlag {
    async fn should_stop(&self) -> Result<bool> {
        Ok(self.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_never_stops() {
        assert!(!NoOpSignalChecker.should_stop().await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.should_stop().await.unwrap());

        handle.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.should_stop().await.unwrap());
    }
}
