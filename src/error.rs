//! Public error of task-warden..

use crate::prelude::*;

/// Error enumeration for `Warden`-related usage errors.
///
/// These are abort-class violations of the lifecycle contract. The crate
/// raises them by panicking with the variant's display text instead of
/// returning them, so the offending call site fails loudly.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
pub enum WardenError {
    /// Launch was attempted after the warden had been stopped.
    #[error("Warden has been stopped, tasks can no longer be launched.")]
    Stopped,
    /// The default warden was initialized twice without an intervening teardown.
    #[error("The default warden is already initialized.")]
    RepeatedInit,
    /// A default-warden operation ran before `init`.
    #[error("The default warden is not initialized.")]
    NotInitialized,
}
