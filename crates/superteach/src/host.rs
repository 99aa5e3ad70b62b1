//! host-provided services: toasts, navigation, timers
//!
//! the browser implements these over `window`; tests use the recorders in
//! [`crate::testing`].

use async_trait::async_trait;
use std::time::Duration;

/// transient user notifications
pub trait Notifier {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// page-level navigation
pub trait Navigator {
    /// open `url` in a new browsing context once `delay` has passed.
    /// must return immediately; the host owns the timer.
    fn open_after(&self, url: &str, delay: Duration);

    /// reload the page, dropping all derived state
    fn reload(&self);
}

/// async sleep for polling loops
#[async_trait(?Send)]
pub trait Clock {
    async fn sleep(&self, duration: Duration);
}

/// tokio timer clock
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[cfg(not(target_arch = "wasm32"))]
#[async_trait(?Send)]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps() {
        let start = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_millis(500)).await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
