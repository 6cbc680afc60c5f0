use crate::prelude::*;

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

/// What a supervised routine left behind when it panicked.
///
/// Built at the recovery boundary on the task's own execution unit; the
/// backtrace snapshot is taken at that moment, not at the panic site.
pub struct TaskPanic {
    payload: Box<dyn Any + Send>,
    backtrace: Backtrace,
}

/// A single link of the panic-recovery chain.
///
/// Hooks run in order on the panicked task's own execution unit and receive
/// the task's context alongside the failure. A hook that itself panics is not
/// further protected; the task still deregisters on the way out.
pub type PanicHook = Arc<dyn Fn(&TaskContext, &TaskPanic) + Send + Sync>;

impl TaskPanic {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> TaskPanic {
        TaskPanic {
            payload,
            backtrace: Backtrace::force_capture(),
        }
    }

    /// The panic message, when the payload carries one.
    ///
    /// Panics raised via `panic!` with a format string yield `&str` or
    /// `String` payloads; anything else reports as opaque.
    pub fn message(&self) -> &str {
        if let Some(message) = self.payload.downcast_ref::<&'static str>() {
            message
        } else if let Some(message) = self.payload.downcast_ref::<String>() {
            message.as_str()
        } else {
            "opaque panic payload"
        }
    }

    /// The raw panic payload.
    pub fn payload(&self) -> &(dyn Any + Send) {
        self.payload.as_ref()
    }

    /// Stack snapshot taken when the panic was recovered.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for TaskPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPanic")
            .field("message", &self.message())
            .finish()
    }
}

/// Default recovery chain member: one structured error event carrying the
/// panic message, the task's ambient values and the backtrace snapshot.
pub fn default_panic_hook(context: &TaskContext, task_panic: &TaskPanic) {
    tracing::error!(
        panic = %task_panic.message(),
        ambient = %context.values(),
        backtrace = %task_panic.backtrace(),
        "supervised task panicked"
    );
}
