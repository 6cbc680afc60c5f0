//! task_warden is a process-wide supervisor for fire-and-forget tasks.
//!
//! Launch detached asynchronous or blocking work with an ambient context
//! while a locked registry keeps every running task accounted for. Stopping
//! is bounded: what finishes within the timeout is drained, the rest is
//! cancelled cooperatively. Task bodies are isolated behind a panic-recovery
//! boundary, so a crashing routine reports through its hook chain instead of
//! taking the process down.
//!
//! Cancellation is strictly cooperative. The warden makes the request
//! observable through [`supervise::context::TaskContext`]; routines that
//! never check their signal keep running, and `stop` still returns once its
//! timeout elapses.
//!
//! # Examples
//!
//! ```
//! use task_warden::prelude::*;
//! use std::time::Duration;
//!
//! let warden = Warden::new();
//! let context = TaskContext::root().with_value("request_id", 42u64);
//!
//! warden.launch(&context, |ctx| async move {
//!     let _request_id = ctx.value::<u64>("request_id");
//!     // do a bounded slice of work, then check ctx.is_cancelled() again
//! });
//!
//! warden.stop(true, Duration::from_millis(200));
//! ```

pub mod entity;
pub mod error;
pub mod global;
pub mod prelude;
pub mod supervise;
