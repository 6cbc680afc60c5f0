use crate::prelude::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use event_listener::Event;

/// Cooperative liveness signal of a supervised task.
///
/// One clone travels inside the task's `TaskContext`, another stays in the
/// warden's registry. Cancelling only makes the request observable; the
/// routine itself decides when to notice it and wind down. A routine that
/// never looks at its signal legitimately outlives every sweep.
#[derive(Debug, Clone, Default)]
pub struct TaskSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    cancelled: AtomicBool,
    /// The event view of inner task.
    event: Event,
}

impl TaskSignal {
    /// New a signal in the live state.
    pub fn new() -> TaskSignal {
        TaskSignal::default()
    }

    /// Request cancellation, waking every waiter.
    ///
    /// One-way and idempotent; later calls are no-ops.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.event.notify(usize::MAX);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let listener = self.inner.event.listen();
            if self.is_cancelled() {
                return;
            }
            listener.await;
        }
    }

    /// Block the current thread until cancellation is requested.
    pub fn cancelled_with_wait(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let listener = self.inner.event.listen();
            if self.is_cancelled() {
                return;
            }
            listener.wait();
        }
    }

    /// Block the current thread until cancellation is requested, for at most
    /// `timeout`.
    ///
    /// Returns `true` when the signal was observed, `false` on timeout. A
    /// `timeout` too large to land on the monotonic clock degrades to
    /// [`TaskSignal::cancelled_with_wait`].
    pub fn cancelled_with_wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.is_cancelled() {
                return true;
            }
            let listener = self.inner.event.listen();
            if self.is_cancelled() {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    let remaining = match deadline.checked_duration_since(Instant::now()) {
                        Some(remaining) => remaining,
                        None => return self.is_cancelled(),
                    };
                    if !listener.wait_timeout(remaining) {
                        return self.is_cancelled();
                    }
                }
                None => listener.wait(),
            }
        }
    }
}
