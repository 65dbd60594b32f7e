//! Cooperative cancellation.
//!
//! One token is threaded through the scanner, capture writer, injector, and
//! verifier. Long sleeps are sliced so cancellation is observed promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{CoreError, Result};

/// Shared cancellation token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the cancellation flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out if cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep in slices, returning early with [`CoreError::Cancelled`] when
    /// the flag is raised.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return self.check();
        }

        let start = Instant::now();
        let tick = Duration::from_millis(100);
        while start.elapsed() < duration {
            self.check()?;
            let remaining = duration.saturating_sub(start.elapsed());
            std::thread::sleep(tick.min(remaining));
        }
        self.check()
    }

    /// The raw flag, for APIs that take an `Arc<AtomicBool>`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reflects_flag() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(CoreError::Cancelled)));
    }

    #[test]
    fn sleep_returns_early_on_cancel() {
        let token = CancelToken::new();
        let other = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            other.cancel();
        });

        let start = Instant::now();
        let result = token.sleep(Duration::from_secs(10));
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
