//! JavaScript-style promises for Rust, backed by real parallelism.
//!
//! Every [`Promise`] runs its body eagerly on a shared pool of worker
//! threads. Ordinary closures compose into concurrent workflows through
//! [`then`](Promise::then), [`all`], [`any`] and [`race`] without touching
//! a thread, a channel or a lock; composition is type-checked when it is
//! built, and panics inside a body come back as ordinary errors from
//! [`wait`](Promise::wait).
//!
//! # Examples
//!
//! A single promise:
//!
//! ```
//! use vow::Promise;
//!
//! let p = Promise::new(|x: i32| x * 2, (21,));
//! let mut doubled = 0;
//! p.wait((&mut doubled,)).unwrap();
//! assert_eq!(42, doubled);
//! ```
//!
//! Fanning out and joining back in:
//!
//! ```
//! use vow::{all, Promise};
//!
//! let squares: Vec<_> = (0u64..5)
//!     .map(|n| Promise::new(|n: u64| n * n, (n,)))
//!     .collect();
//!
//! let mut collected: Vec<u64> = Vec::new();
//! all(&squares).wait_collect(&mut collected).unwrap();
//! assert_eq!(vec![0, 1, 4, 9, 16], collected);
//! ```
//!
//! Errors are swallowed by the chain and surface at the wait:
//!
//! ```
//! use vow::Promise;
//!
//! let p = Promise::new(|| -> u8 { panic!("flat tire") }, ());
//! let err = p.wait((&mut 0u8,)).unwrap_err();
//! assert!(err.to_string().contains("flat tire"));
//! ```

#![cfg_attr(not(test), deny(unsafe_code))]

pub mod promise;
pub mod task;

pub use promise::{all, any, race, Error, Promise, TypeDesc, Value, ValueType, Variadic};
