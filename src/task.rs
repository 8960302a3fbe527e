//! The worker runtime behind every promise.
//!
//! Each promise body runs as one task on a shared, elastic pool of OS
//! threads. Workers are started on demand: whenever a task is handed to the
//! last free thread, a replacement is started first, so a worker that blocks
//! indefinitely (awaiting an upstream promise, or running user code that
//! sleeps) can never starve the pool. Idle workers retire after a timeout,
//! keeping a small resident reserve.

mod config;
mod pool;

pub use config::{configure, AlreadyConfigured, Config};
pub use pool::spawn;
