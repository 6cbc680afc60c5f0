//! A "prelude" for users of the `task-warden` crate.
//!
//! This prelude is similar to the standard library's prelude in that you'll
//! almost always want to import its entire contents, but unlike the standard
//! library's prelude you'll have to do so manually:
//!
//! ```
//! use task_warden::prelude::*;
//! ```
//!
//! The prelude may grow over time as additional items see ubiquitous use.

pub use crate::entity::{Warden, WardenBuilder};
pub use crate::error::*;
pub use crate::global::{init, launch, launch_blocking, launch_with_panic_hooks, WardenTeardown};
pub use crate::supervise::context::{TaskContext, ValueBag};
pub use crate::supervise::panic_hook::{default_panic_hook, PanicHook, TaskPanic};
pub use crate::supervise::signal::TaskSignal;

pub use anyhow::{anyhow, Result as AnyResult};
pub use smol::channel;
pub use smol::future as future_lite;
pub use smol::spawn as async_spawn_by_smol;
pub use smol::unblock as unblock_spawn_by_smol;
pub use smol::Task as SmolJoinHandler;
pub use thiserror::Error;

pub(crate) use crate::supervise::registry::TaskTrace;
pub(crate) use log::{debug, info};
pub(crate) use parking_lot::Mutex;
pub(crate) use smol::Timer as AsyncTimer;
pub(crate) use std::future::Future;
pub(crate) use std::time::{Duration, Instant};
pub(crate) use tracing::{info_span, Instrument};

pub use tokio::task::{
    spawn as async_spawn_by_tokio, spawn_blocking as unblock_spawn_by_tokio,
    JoinHandle as TokioJoinHandle,
};
pub use tokio::time::sleep as sleep_by_tokio;
