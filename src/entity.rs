//! Warden is a process-wide supervisor for fire-and-forget tasks,
//! based on a locked registry of running work and cooperative liveness
//! signals, and supported by the runtime provided by tokio or smol,
//! which makes it easy to launch detached asynchronous/synchronous work
//! and still shut the process down in bounded time.
//!
//! # Warden
//!
//! User applications can be served through the lib used by Warden:
//!
//! 1. Detached-task deployment.
//! 2. Orderly drain or force-cancel of everything still running at shutdown.

use crate::prelude::*;
use crate::supervise::panic_hook::default_panic_hook;
use crate::supervise::registry::TraceGuard;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::{Builder as TokioBuilder, Handle, Runtime};

// Registry shared between the facade and every launched task.
pub(crate) type SharedTaskTrace = Arc<TaskTrace>;
// Sequence for registry keys.
pub(crate) type SharedIdGenerator = Arc<AtomicU64>;
// Warden-wide default recovery chain.
pub(crate) type SharedPanicHooks = Arc<Vec<PanicHook>>;

/// Builds Warden with custom configuration values.
///
/// Methods can be chained in order to set the configuration values. The
/// Warden is constructed by calling `build`.
///
/// # Examples
///
/// ```
/// use task_warden::entity::WardenBuilder;
///
/// let warden = WardenBuilder::default().build();
/// warden.stop(false, std::time::Duration::from_secs(0));
/// ```
#[derive(Clone, Default)]
pub struct WardenBuilder {
    /// RuntimeInstance (Tokio | Smol)
    pub(crate) runtime_instance: RuntimeInstance,
    panic_hooks: Vec<PanicHook>,
}

impl fmt::Debug for WardenBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WardenBuilder")
            .field("runtime_instance", &self.runtime_instance)
            .field("panic_hooks", &self.panic_hooks.len())
            .finish()
    }
}

/// Warden is an abstraction layer that launches detached tasks on behalf of
/// its users and guarantees an orderly, bounded-time shutdown of all of them.
#[derive(Clone, Debug)]
pub struct Warden {
    shared_header: SharedHeader,
}

/// SharedHeader Store the core context of the warden.
#[derive(Clone)]
pub(crate) struct SharedHeader {
    // Registry of running tasks, stopped flag and drain counter.
    pub(crate) task_trace: SharedTaskTrace,
    // Keys for registry entries.
    pub(crate) id_generator: SharedIdGenerator,
    // RuntimeInstance
    pub(crate) runtime_instance: RuntimeInstance,
    // Recovery chain for tasks launched without their own.
    pub(crate) panic_hooks: SharedPanicHooks,
}

impl fmt::Debug for SharedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("")
            .field(&self.task_trace)
            .field(&self.id_generator)
            .field(&self.runtime_instance)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RuntimeInstance {
    // smol have no instance.
    pub(crate) inner: Option<Arc<Runtime>>,
    // Handle of an already-running tokio runtime to attach to.
    pub(crate) handle: Option<Handle>,
    pub(crate) kind: RuntimeKind,
}

/// Async-Runtime Kind
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Async-Runtime `smol` compatible with the async-std
    Smol,

    /// Async-Runtime `tokio`
    Tokio,
}

impl Default for RuntimeKind {
    fn default() -> Self {
        RuntimeKind::Tokio
    }
}

impl Default for RuntimeInstance {
    fn default() -> Self {
        let kind = RuntimeKind::Tokio;
        let inner = None;
        let handle = None;
        Self { kind, inner, handle }
    }
}

impl RuntimeInstance {
    fn init_smol_runtime() -> RuntimeInstance {
        RuntimeInstance {
            inner: None,
            handle: None,
            kind: RuntimeKind::Smol,
        }
    }

    fn init_tokio_runtime() -> RuntimeInstance {
        // Attach to the runtime already hosting the caller when there is one.
        if let Ok(handle) = Handle::try_current() {
            return RuntimeInstance {
                inner: None,
                handle: Some(handle),
                kind: RuntimeKind::Tokio,
            };
        }

        let inner = Some(Arc::new(
            Self::tokio_support().expect("init tokioRuntime is fail."),
        ));
        RuntimeInstance {
            inner,
            handle: None,
            kind: RuntimeKind::Tokio,
        }
    }

    pub(crate) fn tokio_support() -> Option<Runtime> {
        TokioBuilder::new_multi_thread()
            .enable_all()
            .thread_name_fn(|| {
                static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
                let id = ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
                format!("warden-{}", id)
            })
            .on_thread_start(|| {
                info!("tokio-thread started");
            })
            .build()
            .ok()
    }

    // Spawn onto whichever runtime this instance wraps. For `Tokio`, build
    // guarantees exactly one of `handle`/`inner` is populated.
    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.kind {
            RuntimeKind::Smol => {
                async_spawn_by_smol(future).detach();
            }
            RuntimeKind::Tokio => {
                if let Some(handle) = self.handle.as_ref() {
                    handle.spawn(future);
                } else if let Some(runtime) = self.inner.as_ref() {
                    runtime.spawn(future);
                }
            }
        }
    }

    pub(crate) fn spawn_blocking<F>(&self, routine: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.kind {
            RuntimeKind::Smol => {
                unblock_spawn_by_smol(routine).detach();
            }
            RuntimeKind::Tokio => {
                if let Some(handle) = self.handle.as_ref() {
                    handle.spawn_blocking(routine);
                } else if let Some(runtime) = self.inner.as_ref() {
                    runtime.spawn_blocking(routine);
                }
            }
        }
    }
}

impl Default for Warden {
    fn default() -> Self {
        WardenBuilder::default().build()
    }
}

impl WardenBuilder {
    /// Build Warden.
    pub fn build(mut self) -> Warden {
        self.init_warden()
    }

    fn init_warden(&mut self) -> Warden {
        if self.runtime_instance.kind == RuntimeKind::Tokio
            && self.runtime_instance.inner.is_none()
            && self.runtime_instance.handle.is_none()
        {
            self.runtime_instance = RuntimeInstance::init_tokio_runtime();
        }

        let panic_hooks: SharedPanicHooks = if self.panic_hooks.is_empty() {
            let default_hook: PanicHook = Arc::new(default_panic_hook);
            Arc::new(vec![default_hook])
        } else {
            Arc::new(self.panic_hooks.clone())
        };

        let shared_header = SharedHeader {
            task_trace: Arc::new(TaskTrace::default()),
            id_generator: Arc::new(AtomicU64::new(0)),
            runtime_instance: self.runtime_instance.clone(),
            panic_hooks,
        };

        Warden { shared_header }
    }

    /// With this API, `Warden` use default `Smol-Runtime` is generated internally.
    pub fn smol_runtime_by_default(mut self) -> Self {
        self.runtime_instance = RuntimeInstance::init_smol_runtime();

        self
    }

    /// With this API, `Warden` use default `TokioRuntime` is generated internally,
    /// attaching to the caller's runtime when one is already running.
    ///
    /// By default the internal runtime is `Tokio`, this API does not require a user-initiated call.
    pub fn tokio_runtime_by_default(mut self) -> Self {
        self.runtime_instance = RuntimeInstance::default();
        self
    }

    /// With this API, `Warden` internally use the user customized and independent `TokioRuntime`.
    pub fn tokio_runtime_by_custom(mut self, rt: Runtime) -> Self {
        self.runtime_instance.kind = RuntimeKind::Tokio;
        self.runtime_instance.inner = Some(Arc::new(rt));
        self.runtime_instance.handle = None;

        self
    }

    /// With this api, `Warden` internal will share a `TokioRuntime` with the user .
    pub fn tokio_runtime_shared_by_custom(mut self, rt: Arc<Runtime>) -> Self {
        self.runtime_instance.kind = RuntimeKind::Tokio;
        self.runtime_instance.inner = Some(rt);
        self.runtime_instance.handle = None;

        self
    }

    /// With this api, `Warden` spawns onto the runtime behind `handle` and
    /// never owns one itself.
    pub fn tokio_runtime_attached(mut self, handle: Handle) -> Self {
        self.runtime_instance.kind = RuntimeKind::Tokio;
        self.runtime_instance.inner = None;
        self.runtime_instance.handle = Some(handle);

        self
    }

    /// Append a hook to the warden-wide default recovery chain.
    ///
    /// Tasks launched with their own hook list ignore this chain.
    pub fn panic_hook(mut self, hook: PanicHook) -> Self {
        self.panic_hooks.push(hook);
        self
    }
}

impl Warden {
    /// New a Warden.
    pub fn new() -> Warden {
        WardenBuilder::default().build()
    }

    /// Launch `routine` as a supervised, fire-and-forget task.
    ///
    /// The routine receives a context that carries the caller's ambient
    /// values but answers only to this warden's cancellation, then runs on
    /// its own execution unit behind a panic-recovery boundary. Launch never
    /// blocks and returns nothing; there is no result channel, retry or
    /// queue behind it.
    ///
    /// # Panics
    ///
    /// Panics with [`WardenError::Stopped`] once the warden has been stopped;
    /// this holds for every subsequent call, not just the first.
    pub fn launch<F, Fut>(&self, context: &TaskContext, routine: F)
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.launch_with_panic_hooks(context, routine, Vec::new())
    }

    /// Launch with a task-private recovery chain replacing the default one.
    ///
    /// An empty `hooks` list falls back to the warden-wide chain.
    ///
    /// # Panics
    ///
    /// Panics with [`WardenError::Stopped`] once the warden has been stopped.
    pub fn launch_with_panic_hooks<F, Fut>(
        &self,
        context: &TaskContext,
        routine: F,
        hooks: Vec<PanicHook>,
    ) where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (task_id, task_context, hooks, guard) = self.checked_register(context, hooks);

        let hook_context = task_context.clone();
        let body = AssertUnwindSafe(async move { routine(task_context).await });
        let supervised = async move {
            let _guard = guard;
            if let Err(payload) = body.catch_unwind().await {
                let task_panic = TaskPanic::new(payload);
                for hook in hooks.iter() {
                    hook(&hook_context, &task_panic);
                }
            }
        };

        let span = info_span!("supervised_task", task_id = task_id);
        self.shared_header
            .runtime_instance
            .spawn(supervised.instrument(span));
    }

    /// Launch a synchronous routine on the runtime's blocking pool.
    ///
    /// Same supervision contract as [`Warden::launch`]: ambient values come
    /// along, cancellation stays cooperative via polling
    /// [`TaskContext::is_cancelled`] or parking on
    /// [`TaskSignal::cancelled_with_wait_timeout`].
    ///
    /// # Panics
    ///
    /// Panics with [`WardenError::Stopped`] once the warden has been stopped.
    pub fn launch_blocking<F>(&self, context: &TaskContext, routine: F)
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        self.launch_blocking_with_panic_hooks(context, routine, Vec::new())
    }

    /// Blocking-pool variant of [`Warden::launch_with_panic_hooks`].
    ///
    /// # Panics
    ///
    /// Panics with [`WardenError::Stopped`] once the warden has been stopped.
    pub fn launch_blocking_with_panic_hooks<F>(
        &self,
        context: &TaskContext,
        routine: F,
        hooks: Vec<PanicHook>,
    ) where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        let (task_id, task_context, hooks, guard) = self.checked_register(context, hooks);

        let hook_context = task_context.clone();
        let supervised = move || {
            let _guard = guard;
            let _entered = info_span!("supervised_task", task_id = task_id).entered();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| routine(task_context))) {
                let task_panic = TaskPanic::new(payload);
                for hook in hooks.iter() {
                    hook(&hook_context, &task_panic);
                }
            }
        };

        self.shared_header.runtime_instance.spawn_blocking(supervised);
    }

    // Same-lock check-and-register; panics when the warden is stopped.
    fn checked_register(
        &self,
        context: &TaskContext,
        hooks: Vec<PanicHook>,
    ) -> (u64, TaskContext, SharedPanicHooks, TraceGuard) {
        let task_id = self
            .shared_header
            .id_generator
            .fetch_add(1, Ordering::SeqCst);
        let signal = TaskSignal::new();

        if let Err(e) = self
            .shared_header
            .task_trace
            .register(task_id, signal.clone())
        {
            panic!("{}", e);
        }

        let task_context = context.derive_detached(signal);
        let hooks = if hooks.is_empty() {
            self.shared_header.panic_hooks.clone()
        } else {
            Arc::new(hooks)
        };
        let guard = TraceGuard::new(self.shared_header.task_trace.clone(), task_id);

        (task_id, task_context, hooks, guard)
    }

    /// Stop the warden: refuse further launches, then drain or cancel.
    ///
    /// The stopped flag flips first in every mode. With `wait` false the
    /// still-running tasks are cancelled immediately, `timeout` is ignored
    /// and the call returns without blocking. With `wait` true the call
    /// blocks until every outstanding task has deregistered or `timeout`
    /// elapses, then cancels whatever is still registered. A `timeout` too
    /// large to land on the monotonic clock is treated as an unbounded
    /// drain. Tasks that ignore their signal keep running; stop returns
    /// regardless.
    ///
    /// Safe to call repeatedly. Must not be invoked from inside one of this
    /// warden's own tasks, the blocking wait would park a runtime worker;
    /// use [`Warden::stop_with_async_wait`] there.
    pub fn stop(&self, wait: bool, timeout: Duration) {
        info!("warden stopping; wait: {}, timeout: {:?}", wait, timeout);
        let task_trace = &self.shared_header.task_trace;
        task_trace.flip_stopped();

        if !wait {
            task_trace.sweep();
            return;
        }

        task_trace.wait_drained(Instant::now().checked_add(timeout));
        task_trace.sweep();
    }

    /// Async variant of [`Warden::stop`], usable from either runtime.
    pub async fn stop_with_async_wait(&self, wait: bool, timeout: Duration) {
        info!("warden stopping; wait: {}, timeout: {:?}", wait, timeout);
        let task_trace = &self.shared_header.task_trace;
        task_trace.flip_stopped();

        if !wait {
            task_trace.sweep();
            return;
        }

        task_trace
            .wait_drained_async(Instant::now().checked_add(timeout))
            .await;
        task_trace.sweep();
    }

    /// Number of tasks currently registered and not yet wound down.
    pub fn outstanding_tasks(&self) -> usize {
        self.shared_header.task_trace.outstanding()
    }

    pub(crate) fn same_instance(left: &Warden, right: &Warden) -> bool {
        Arc::ptr_eq(&left.shared_header.task_trace, &right.shared_header.task_trace)
    }
}
