use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default quiescence window for search-as-you-type.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(300);

#[derive(Default)]
struct Pending {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Collapses bursts of calls into the last one after a quiet period.
pub struct Debouncer {
    window: Duration,
    pending: Arc<Mutex<Pending>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cancel whatever is pending and arm `f` to run once the window passes
    /// without another `schedule`. Must be called inside a Tokio runtime.
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        let generation = pending.generation;
        if let Some(task) = pending.task.take() {
            trace!(generation, "Debounce re-armed, dropping pending call");
            task.abort();
        }

        let slot = Arc::clone(&self.pending);
        let window = self.window;
        // The lock is still held, so the task cannot clear its slot before
        // the handle is stored.
        pending.task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut pending = slot.lock();
                if pending.generation != generation {
                    return;
                }
                pending.task = None;
            }
            // Lock released: `f` may call `schedule` again.
            f();
        }));
    }

    /// Discard the pending call, if any, without running it.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().task.is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIESCENCE)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
