//! Eager promises and the combinators that compose them.
//!
//! A [`Promise`] starts computing the moment it is constructed; chaining
//! with [`then`](Promise::then) and joining with [`all`], [`any`] or
//! [`race`] only ever adds more eagerly-running work. The blocking
//! [`wait`](Promise::wait) is the one synchronous way out; composition is
//! validated when a combinator is called, so a promise that started running
//! is always well typed.

mod cell;
mod combinator;
mod error;
mod signature;
mod value;
mod wait;

pub use cell::{Completed, Kind, Promise};
pub use combinator::{all, any, race};
pub use error::Error;
pub use signature::{marker, ArgDesc, ArgList, IntoResults, PromiseFn, Signature, Variadic};
pub use value::{TypeDesc, Value, ValueType};
pub use wait::WaitOutputs;
