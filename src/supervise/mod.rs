//! supervise is the core module of the library, it provides the pieces of the
//! task lifecycle: ambient contexts, liveness signals, the registry of
//! running tasks, and the panic-recovery chain.

pub mod context;
pub mod panic_hook;
pub mod signal;

pub(crate) mod registry;
