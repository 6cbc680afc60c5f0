use crate::prelude::*;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Ambient execution context handed to every supervised routine.
///
/// Carries request-scoped values (correlation ids and the like) and at most
/// one cooperative liveness signal. Deriving the task-side context severs the
/// caller's cancellation: the spawned routine answers only to the warden that
/// launched it, even when the originating request has already been aborted.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    values: ValueBag,
    signal: Option<TaskSignal>,
}

/// Immutable bag of ambient values, shared by cheap `Arc` clone.
///
/// Every entry keeps a `Debug` rendition taken at insert time, so panic
/// reports can be tagged without touching the typed value again.
#[derive(Clone, Default)]
pub struct ValueBag {
    entries: Arc<BTreeMap<&'static str, BagEntry>>,
}

#[derive(Clone)]
struct BagEntry {
    value: Arc<dyn Any + Send + Sync>,
    repr: String,
}

impl TaskContext {
    /// New a context carrying no values and no signal.
    pub fn root() -> TaskContext {
        TaskContext::default()
    }

    /// Attach an ambient value under `key`, replacing any previous entry.
    pub fn with_value<T>(mut self, key: &'static str, value: T) -> TaskContext
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        let mut entries = (*self.values.entries).clone();
        let repr = format!("{:?}", value);
        entries.insert(
            key,
            BagEntry {
                value: Arc::new(value),
                repr,
            },
        );

        self.values = ValueBag {
            entries: Arc::new(entries),
        };
        self
    }

    /// Typed access to an ambient value.
    pub fn value<T>(&self, key: &'static str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.values
            .entries
            .get(key)
            .and_then(|entry| entry.value.clone().downcast::<T>().ok())
    }

    /// Attach a cancellation signal, e.g. one scoped to an inbound request.
    pub fn with_signal(mut self, signal: TaskSignal) -> TaskContext {
        self.signal = Some(signal);
        self
    }

    /// The ambient value bag.
    pub fn values(&self) -> &ValueBag {
        &self.values
    }

    /// Whether this context's signal has requested cancellation.
    ///
    /// A context without a signal is never cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal
            .as_ref()
            .map(TaskSignal::is_cancelled)
            .unwrap_or(false)
    }

    /// Wait until this context's signal requests cancellation.
    ///
    /// A context without a signal waits forever.
    pub async fn cancelled(&self) {
        match self.signal.as_ref() {
            Some(signal) => signal.cancelled().await,
            None => future_lite::pending::<()>().await,
        }
    }

    /// Copy the value bag forward and attach a fresh warden-owned signal.
    ///
    /// The caller's own signal does not come along. Aborting an inbound
    /// request must not tear down the background work it spun off.
    pub(crate) fn derive_detached(&self, signal: TaskSignal) -> TaskContext {
        TaskContext {
            values: self.values.clone(),
            signal: Some(signal),
        }
    }
}

impl ValueBag {
    /// Number of entries in the bag.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, debug rendition)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.entries
            .iter()
            .map(|(key, entry)| (*key, entry.repr.as_str()))
    }
}

impl fmt::Debug for ValueBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for ValueBag {
    // Rendered as `key=value` pairs separated by single spaces, in key order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, repr) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, repr)?;
            first = false;
        }
        Ok(())
    }
}
