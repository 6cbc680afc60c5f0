//! Default-warden singleton. One process-wide `Warden` stands behind `init`,
//! the usual deployment where request handlers launch background work and
//! `main` tears everything down once on exit.

use crate::prelude::*;

use once_cell::sync::Lazy;

/// Drain timeout applied by [`WardenTeardown::teardown`].
pub(crate) const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

static DEFAULT_WARDEN: Lazy<Mutex<Option<Warden>>> = Lazy::new(|| Mutex::new(None));

/// Handle that shuts the default warden down at process exit.
///
/// Returned by [`init`]; hold it in `main` and call
/// [`WardenTeardown::teardown`] once shutdown begins.
#[must_use = "hold the teardown handle and invoke it during process shutdown"]
#[derive(Debug)]
pub struct WardenTeardown {
    warden: Warden,
}

/// Install the default warden and hand back its teardown handle.
///
/// # Panics
///
/// Panics with [`WardenError::RepeatedInit`] when the default warden is
/// already installed and has not been torn down yet.
pub fn init() -> WardenTeardown {
    let mut slot = DEFAULT_WARDEN.lock();
    if slot.is_some() {
        panic!("{}", WardenError::RepeatedInit);
    }

    let warden = Warden::new();
    *slot = Some(warden.clone());
    info!("default warden initialized");

    WardenTeardown { warden }
}

impl WardenTeardown {
    /// Stop the default warden, draining for up to thirty seconds, then
    /// release the slot so a later [`init`] is legal again.
    ///
    /// Launches that race with the drain observe the stopped warden and
    /// panic with [`WardenError::Stopped`]; once the slot is released they
    /// panic with [`WardenError::NotInitialized`] instead.
    pub fn teardown(self) {
        self.warden.stop(true, DEFAULT_STOP_TIMEOUT);

        let mut slot = DEFAULT_WARDEN.lock();
        if let Some(current) = slot.as_ref() {
            if Warden::same_instance(current, &self.warden) {
                *slot = None;
                info!("default warden torn down");
            }
        }
    }
}

/// Launch on the default warden. See [`Warden::launch`].
///
/// # Panics
///
/// Panics with [`WardenError::NotInitialized`] before [`init`] has run, and
/// with [`WardenError::Stopped`] once teardown has begun.
pub fn launch<F, Fut>(context: &TaskContext, routine: F)
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    default_warden().launch(context, routine)
}

/// Launch on the default warden with a task-private recovery chain. See
/// [`Warden::launch_with_panic_hooks`].
///
/// # Panics
///
/// Panics with [`WardenError::NotInitialized`] before [`init`] has run, and
/// with [`WardenError::Stopped`] once teardown has begun.
pub fn launch_with_panic_hooks<F, Fut>(context: &TaskContext, routine: F, hooks: Vec<PanicHook>)
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    default_warden().launch_with_panic_hooks(context, routine, hooks)
}

/// Launch a synchronous routine on the default warden. See
/// [`Warden::launch_blocking`].
///
/// # Panics
///
/// Panics with [`WardenError::NotInitialized`] before [`init`] has run, and
/// with [`WardenError::Stopped`] once teardown has begun.
pub fn launch_blocking<F>(context: &TaskContext, routine: F)
where
    F: FnOnce(TaskContext) + Send + 'static,
{
    default_warden().launch_blocking(context, routine)
}

fn default_warden() -> Warden {
    let slot = DEFAULT_WARDEN.lock();
    match slot.as_ref() {
        Some(warden) => warden.clone(),
        None => panic!("{}", WardenError::NotInitialized),
    }
}
