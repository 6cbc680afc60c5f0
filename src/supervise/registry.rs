use crate::prelude::*;

use std::collections::HashMap;
use std::sync::Arc;

use event_listener::Event;

/// Registry of live tasks plus the stopped flag, all behind one mutex.
///
/// `register` and the shutdown sweep serialize on the same lock, so a launch
/// that observed not-stopped is guaranteed to be visible to any later sweep,
/// and a launch that observed stopped never makes it into the map at all.
#[derive(Debug, Default)]
pub(crate) struct TaskTrace {
    inner: Mutex<TraceInner>,
    /// Notified after every deregistration; drain waiters re-check the count.
    drained: Event,
}

#[derive(Debug, Default)]
struct TraceInner {
    stopped: bool,
    outstanding: usize,
    running: HashMap<u64, TaskSignal>,
}

impl TaskTrace {
    /// Check the stopped flag and register in one critical section.
    ///
    /// Insert and counter increment both happen here, before any spawn takes
    /// place; the lock is never held across the routine itself.
    pub(crate) fn register(&self, task_id: u64, signal: TaskSignal) -> Result<(), WardenError> {
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return Err(WardenError::Stopped);
            }
            inner.running.insert(task_id, signal);
            inner.outstanding += 1;
        }

        debug!("task registered; task-id: {}", task_id);
        Ok(())
    }

    /// Drop the task's registry entry and wake the drain waiters.
    ///
    /// The counter only moves when an entry was actually removed, so it
    /// stays in step with the map whatever id a caller hands in.
    pub(crate) fn deregister(&self, task_id: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.running.remove(&task_id).is_some() {
                inner.outstanding -= 1;
            }
        }

        self.drained.notify(usize::MAX);
        debug!("task deregistered; task-id: {}", task_id);
    }

    /// Flip the stopped flag. One-way; later calls keep it set.
    pub(crate) fn flip_stopped(&self) {
        self.inner.lock().stopped = true;
    }

    /// Number of registered tasks that have not deregistered yet.
    pub(crate) fn outstanding(&self) -> usize {
        self.inner.lock().outstanding
    }

    /// Cancel every still-registered task, under the lock.
    ///
    /// Entries stay in place; each task removes its own when the routine
    /// actually winds down.
    pub(crate) fn sweep(&self) {
        let inner = self.inner.lock();
        for (task_id, signal) in inner.running.iter() {
            signal.cancel();
            debug!("task cancelled by sweep; task-id: {}", task_id);
        }
    }

    /// Block until the outstanding count reaches zero or `deadline` passes.
    ///
    /// A `None` deadline waits without bound; callers use it for timeouts
    /// too large to land on the monotonic clock.
    pub(crate) fn wait_drained(&self, deadline: Option<Instant>) {
        loop {
            let listener = self.drained.listen();
            if self.outstanding() == 0 {
                return;
            }
            match deadline {
                Some(deadline) => {
                    let remaining = match deadline.checked_duration_since(Instant::now()) {
                        Some(remaining) => remaining,
                        None => return,
                    };
                    if !listener.wait_timeout(remaining) {
                        return;
                    }
                }
                None => listener.wait(),
            }
        }
    }

    /// Async variant of [`TaskTrace::wait_drained`], usable on either runtime.
    pub(crate) async fn wait_drained_async(&self, deadline: Option<Instant>) {
        loop {
            let listener = self.drained.listen();
            if self.outstanding() == 0 {
                return;
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return;
                    }
                    let woken = async {
                        listener.await;
                        true
                    };
                    let timed_out = async {
                        AsyncTimer::at(deadline).await;
                        false
                    };
                    if !future_lite::or(woken, timed_out).await {
                        return;
                    }
                }
                None => listener.await,
            }
        }
    }
}

/// Deregisters its task when dropped, so the normal path and the panic path
/// release the registry entry exactly once.
pub(crate) struct TraceGuard {
    trace: Arc<TaskTrace>,
    task_id: u64,
}

impl TraceGuard {
    pub(crate) fn new(trace: Arc<TaskTrace>, task_id: u64) -> TraceGuard {
        TraceGuard { trace, task_id }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        self.trace.deregister(self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_after_stop_rejected() {
        let trace = TaskTrace::default();
        assert!(trace.register(1, TaskSignal::new()).is_ok());

        trace.flip_stopped();
        assert_eq!(
            trace.register(2, TaskSignal::new()),
            Err(WardenError::Stopped)
        );
        assert_eq!(trace.outstanding(), 1);
    }

    #[test]
    fn test_guard_deregisters_exactly_once() {
        let trace = Arc::new(TaskTrace::default());
        trace.register(7, TaskSignal::new()).unwrap();
        assert_eq!(trace.outstanding(), 1);

        let guard = TraceGuard::new(trace.clone(), 7);
        drop(guard);
        assert_eq!(trace.outstanding(), 0);

        // A second deregistration of the same id is harmless.
        trace.deregister(7);
        assert_eq!(trace.outstanding(), 0);
    }

    #[test]
    fn test_deregister_unknown_id_keeps_counter() {
        let trace = TaskTrace::default();
        trace.register(1, TaskSignal::new()).unwrap();
        trace.register(2, TaskSignal::new()).unwrap();

        // An id that never registered must not skew the live count.
        trace.deregister(404);
        assert_eq!(trace.outstanding(), 2);

        trace.deregister(1);
        trace.deregister(2);
        assert_eq!(trace.outstanding(), 0);
    }

    #[test]
    fn test_sweep_cancels_but_keeps_entries() {
        let trace = TaskTrace::default();
        let signal = TaskSignal::new();
        trace.register(3, signal.clone()).unwrap();

        trace.flip_stopped();
        trace.sweep();

        // The signal fired, but the entry stays until the task itself
        // deregisters.
        assert!(signal.is_cancelled());
        assert_eq!(trace.outstanding(), 1);
    }

    #[test]
    fn test_wait_drained_deadline() {
        let trace = TaskTrace::default();
        trace.register(9, TaskSignal::new()).unwrap();

        let beginning_wait = Instant::now();
        trace.wait_drained(Some(Instant::now() + Duration::from_millis(30)));
        assert!(beginning_wait.elapsed() >= Duration::from_millis(25));

        trace.deregister(9);
        let beginning_wait = Instant::now();
        trace.wait_drained(Some(Instant::now() + Duration::from_millis(500)));
        assert!(beginning_wait.elapsed() < Duration::from_millis(100));

        // With nothing outstanding even an unbounded wait returns at once.
        trace.wait_drained(None);
    }
}
