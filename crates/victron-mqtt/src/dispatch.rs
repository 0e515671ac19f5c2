//! Callback hand-off from the delivery thread to the consumer's context.
//!
//! Messages arrive on the transport's own thread or runtime. Update callbacks
//! must not run there; they are handed over to the consumer through a
//! [`CallbackContext`] and executed by the matching [`CallbackRunner`], which
//! the consumer drives on its own single-threaded context:
//!
//! ```rust,no_run
//! use victron_mqtt::dispatch::callback_context;
//!
//! # async fn example() {
//! let (context, runner) = callback_context();
//! let local = tokio::task::LocalSet::new();
//! local.spawn_local(runner.run());
//! // hand `context` to the MetricHub, then drive `local`
//! # }
//! ```
//!
//! Submission is enqueue-or-drop: once the runner is gone or closed the
//! context is inactive and callbacks are skipped, never queued for later.
//! A panicking callback is caught and logged by the runner.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc;
use tracing::{error, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Create a connected context/runner pair.
pub fn callback_context() -> (CallbackContext, CallbackRunner) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CallbackContext { tx }, CallbackRunner { rx })
}

/// Thread-safe handle used to schedule callbacks onto the consumer's context.
#[derive(Clone)]
pub struct CallbackContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl CallbackContext {
    /// A context with no runner. Nothing submitted to it ever runs.
    pub fn detached() -> Self {
        let (context, _runner) = callback_context();
        context
    }

    /// Whether a runner is still accepting work.
    pub fn is_active(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Schedule `job` on the consumer's context.
    ///
    /// Returns `false` when the context is inactive and the job was dropped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_active() {
            trace!("Callback context inactive, dropping callback");
            return false;
        }
        self.tx.send(Box::new(job)).is_ok()
    }
}

impl std::fmt::Debug for CallbackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackContext")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Executes scheduled callbacks on the context that owns it.
pub struct CallbackRunner {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl CallbackRunner {
    /// Run callbacks until every [`CallbackContext`] is dropped or the runner is closed.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            run_job(job);
        }
    }

    /// Run every callback that is already scheduled, without waiting.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            run_job(job);
            count += 1;
        }
        count
    }

    /// Stop accepting callbacks. Contexts report inactive from now on;
    /// callbacks already scheduled can still be drained with [`Self::run_pending`].
    pub fn close(&mut self) {
        self.rx.close();
    }
}

fn run_job(job: Job) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!("Error calling callback: {}", panic_message(panic.as_ref()));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_submit_and_run_pending() {
        let (context, mut runner) = callback_context();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            assert!(context.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(runner.run_pending(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_inactive_context_drops() {
        let (context, runner) = callback_context();
        drop(runner);
        assert!(!context.is_active());
        assert!(!context.submit(|| panic!("must not run")));

        let detached = CallbackContext::detached();
        assert!(!detached.is_active());
    }

    #[test]
    fn test_closed_runner() {
        let (context, mut runner) = callback_context();
        runner.close();
        assert!(!context.is_active());
        assert!(!context.submit(|| {}));
        assert_eq!(runner.run_pending(), 0);
    }

    #[test]
    fn test_panic_is_contained() {
        let (context, mut runner) = callback_context();
        let counter = Arc::new(AtomicUsize::new(0));

        context.submit(|| panic!("callback failure"));
        let c = counter.clone();
        context.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runner.run_pending(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_until_contexts_dropped() {
        let (context, runner) = callback_context();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        context.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(context);

        runner.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
