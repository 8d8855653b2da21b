use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Periodic timer that runs a reload on a fixed cadence.
///
/// At most one timer is armed: starting again replaces the previous timer.
/// Stopping aborts the task, including a tick that is mid-flight.
#[derive(Default)]
pub struct AutoRefreshScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoRefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. The first tick fires one full `every` after the call.
    /// A zero interval is rejected and leaves any current timer untouched.
    pub fn start<F, Fut>(&self, every: Duration, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if every.is_zero() {
            warn!("Ignoring auto-refresh with zero interval");
            return false;
        }

        let first = Instant::now() + every;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!(every_ms = every.as_millis() as u64, "Auto-refresh tick");
                tick().await;
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            debug!("Replacing existing auto-refresh timer");
            previous.abort();
        }
        true
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            debug!("Stopping auto-refresh");
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }
}

impl Drop for AutoRefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_tick(count: &Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<()> + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_cadence() {
        let scheduler = AutoRefreshScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        assert!(scheduler.start(Duration::from_secs(10), counting_tick(&count)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_replaces_timer() {
        let scheduler = AutoRefreshScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start(Duration::from_secs(10), counting_tick(&count));
        scheduler.start(Duration::from_secs(10), counting_tick(&count));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let scheduler = AutoRefreshScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start(Duration::from_secs(10), counting_tick(&count));

        tokio::time::sleep(Duration::from_secs(15)).await;
        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let scheduler = AutoRefreshScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        assert!(!scheduler.start(Duration::ZERO, counting_tick(&count)));
        assert!(!scheduler.is_running());
    }
}
