use std::time::Duration;
use tokio::time::Instant;

/// Single-shot trailing debounce driven by the event loop tick.
///
/// Every [`trigger`](Debounce::trigger) pushes the deadline out; [`poll`](Debounce::poll)
/// reports `true` exactly once after input has been quiet for `delay`.
/// Uses tokio's clock so tests can drive it with `time::pause`/`advance`.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    last_trigger: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_trigger: None,
        }
    }

    pub fn trigger(&mut self) {
        self.last_trigger = Some(Instant::now());
    }

    pub fn cancel(&mut self) {
        self.last_trigger = None;
    }

    pub fn is_pending(&self) -> bool {
        self.last_trigger.is_some()
    }

    /// Returns `true` once the quiet period has elapsed, then disarms.
    pub fn poll(&mut self) -> bool {
        match self.last_trigger {
            Some(at) if at.elapsed() >= self.delay => {
                self.last_trigger = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_quiet_period() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        assert!(!debounce.poll());

        debounce.trigger();
        tokio::time::advance(Duration::from_millis(299)).await;
        assert!(!debounce.poll());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(debounce.poll());
        assert!(!debounce.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_pushes_deadline() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        debounce.trigger();
        tokio::time::advance(Duration::from_millis(200)).await;
        debounce.trigger();
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(!debounce.poll());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(debounce.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        debounce.trigger();
        debounce.cancel();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!debounce.poll());
        assert!(!debounce.is_pending());
    }
}
