use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::cell::{Inner, Kind, Promise};
use super::error::Error;
use super::signature::{specialize, ArgList, PromiseFn};
use super::value::{TypeDesc, Value};
use crate::task;

/// Runs one promise body behind the panic boundary. A body returning `None`
/// leaves settlement to another worker of the same promise.
fn run<B>(cell: &Arc<Inner>, body: B)
where
    B: FnOnce() -> Option<Result<Vec<Value>, Error>>,
{
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(None) => {}
        Ok(Some(outcome)) => cell.complete(outcome),
        Err(payload) => {
            let error = Error::from_panic(payload);
            debug!(%error, "promise body panicked");
            cell.complete(Err(error));
        }
    }
}

impl Promise {
    /// Starts `f(args)` on the worker pool and hands back the promise of
    /// its results.
    ///
    /// Execution is eager: the body is already running when this returns.
    /// A panic inside `f` is caught and surfaced as an error from
    /// [`wait`](Promise::wait); a `Result` return makes the `Err` arm an
    /// error channel instead.
    ///
    /// # Panics
    ///
    /// If `args` does not match `f`'s parameters in arity or in type.
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::Promise;
    ///
    /// let p = Promise::new(|x: i32| x * 2 + 3, (7,));
    /// let mut r = 0;
    /// p.wait((&mut r,)).unwrap();
    /// assert_eq!(17, r);
    /// ```
    ///
    /// Only a function can back a promise:
    ///
    /// ```compile_fail
    /// let p = vow::Promise::new(4, ());
    /// ```
    pub fn new<F, A, M>(f: F, args: impl ArgList) -> Promise
    where
        F: PromiseFn<A, M>,
    {
        let sig = F::signature();
        let args = args.into_values();
        let positions = match specialize(&sig.inputs, args.len()) {
            Ok(positions) => positions,
            Err(expected) => panic!("expected {} args, got {} args", expected, args.len()),
        };
        for (i, (want, value)) in positions.iter().zip(&args).enumerate() {
            if *want != value.desc() {
                panic!(
                    "for argument {}: expected type {}, got type {}",
                    i,
                    want,
                    value.desc()
                );
            }
        }
        let inner = Inner::new(Kind::Simple, sig.results, sig.returns_error, 0);
        let cell = inner.clone();
        task::spawn(move || run(&cell, move || Some(f.invoke(args))));
        Promise::from_inner(inner)
    }

    /// Chains `f` onto this promise: it starts once this promise settles,
    /// taking the results as its arguments.
    ///
    /// A failed predecessor is not invoked into `f`; the failure propagates
    /// wrapped as "error in previous promise". The predecessor is only
    /// borrowed, so several chains may fan out from one promise.
    ///
    /// # Panics
    ///
    /// If `f`'s parameters do not match this promise's result types, after
    /// expanding a trailing [`Variadic`](super::Variadic) parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::Promise;
    ///
    /// let base = Promise::new(|| 7u32, ());
    /// let doubled = base.then(|x: u32| x * 2);
    /// let quadrupled = base.then(|x: u32| x * 4);
    ///
    /// let (mut two, mut four) = (0u32, 0u32);
    /// doubled.wait((&mut two,)).unwrap();
    /// quadrupled.wait((&mut four,)).unwrap();
    /// assert_eq!((14, 28), (two, four));
    /// ```
    pub fn then<F, A, M>(&self, f: F) -> Promise
    where
        F: PromiseFn<A, M>,
    {
        let sig = F::signature();
        let have = self.inner.profile();
        let positions = match specialize(&sig.inputs, have.len()) {
            Ok(positions) => positions,
            Err(accepts) => panic!(
                "promise returns {} values, but provided function accepts {} args",
                have.len(),
                accepts
            ),
        };
        for (i, (want, got)) in have.iter().zip(&positions).enumerate() {
            if want != got {
                panic!(
                    "for argument {}: expected type {}, got type {}",
                    i, want, got
                );
            }
        }
        let inner = Inner::new(Kind::Then, sig.results, sig.returns_error, 0);
        let cell = inner.clone();
        let prior = self.inner.clone();
        task::spawn(move || {
            run(&cell, move || {
                prior.block_until_complete();
                if let Some(cause) = prior.error() {
                    return Some(Err(Error::wrap("error in previous promise", cause)));
                }
                let (results, _) = prior.snapshot();
                Some(f.invoke(results))
            })
        });
        Promise::from_inner(inner)
    }
}

/// Joins promises into one that settles when every input has succeeded, or
/// as soon as any input has failed.
///
/// The joined results are the inputs' results concatenated in argument
/// order, regardless of which input settled first. A failure settles the
/// join immediately; still-running inputs keep running, their outcomes
/// ignored. Joining nothing yields a promise that is already complete with
/// no results.
///
/// # Examples
///
/// ```
/// use vow::{all, Promise};
///
/// let count = Promise::new(|| 3usize, ());
/// let label = Promise::new(|| String::from("apples"), ());
///
/// let (mut n, mut what) = (0usize, String::new());
/// all([&count, &label]).wait((&mut n, &mut what)).unwrap();
/// assert_eq!((3, String::from("apples")), (n, what));
/// ```
pub fn all<'a, I>(promises: I) -> Promise
where
    I: IntoIterator<Item = &'a Promise>,
{
    let priors: Vec<Arc<Inner>> = promises.into_iter().map(|p| p.inner.clone()).collect();
    if priors.is_empty() {
        return Promise::from_inner(Inner::settled(Kind::Simple, Vec::new(), Vec::new()));
    }
    let profile: Vec<TypeDesc> = priors
        .iter()
        .flat_map(|p| p.profile().iter().copied())
        .collect();
    let inner = Inner::new(Kind::All, profile, false, priors.len() as i64);
    let priors = Arc::new(priors);
    for index in 0..priors.len() {
        let cell = inner.clone();
        let priors = priors.clone();
        task::spawn(move || {
            let parent = cell.clone();
            run(&cell, move || {
                let prior = &priors[index];
                prior.block_until_complete();
                if let Some(cause) = prior.error() {
                    return Some(Err(Error::wrap("error encountered in promise", cause)));
                }
                if parent.count_down() > 0 {
                    return None;
                }
                // last one out assembles, in input order
                let mut results = Vec::with_capacity(parent.profile().len());
                for settled in priors.iter() {
                    let (values, _) = settled.snapshot();
                    results.extend(values);
                }
                Some(Ok(results))
            })
        });
    }
    Promise::from_inner(inner)
}

struct Failures {
    seen: AtomicUsize,
    first: Mutex<Option<Error>>,
}

/// Joins promises into one that settles with the first input to succeed,
/// or fails once every input has failed.
///
/// All inputs must share one result profile. Failures are tolerated while
/// any input is still running; the error reported after a total wipeout is
/// the earliest one recorded. Passing a single promise hands it back
/// unchanged.
///
/// # Panics
///
/// If the inputs' result profiles differ.
///
/// # Examples
///
/// ```
/// use std::io;
/// use vow::{any, Promise};
///
/// let failing = Promise::new(
///     || -> Result<String, io::Error> { Err(io::Error::new(io::ErrorKind::Other, "nope")) },
///     (),
/// );
/// let steady = Promise::new(|| String::from("steady"), ());
///
/// let mut s = String::new();
/// any([&failing, &steady]).wait((&mut s,)).unwrap();
/// assert_eq!("steady", s);
/// ```
pub fn any<'a, I>(promises: I) -> Promise
where
    I: IntoIterator<Item = &'a Promise>,
{
    let mut priors: Vec<Arc<Inner>> = promises.into_iter().map(|p| p.inner.clone()).collect();
    if priors.is_empty() {
        return Promise::from_inner(Inner::settled(Kind::Simple, Vec::new(), Vec::new()));
    }
    if priors.len() == 1 {
        return Promise::from_inner(priors.remove(0));
    }
    let profile = shared_profile(&priors, "any");
    let inner = Inner::new(Kind::Any, profile, false, 1);
    let failures = Arc::new(Failures {
        seen: AtomicUsize::new(0),
        first: Mutex::new(None),
    });
    let total = priors.len();
    let priors = Arc::new(priors);
    for index in 0..total {
        let cell = inner.clone();
        let priors = priors.clone();
        let failures = failures.clone();
        task::spawn(move || {
            let parent = cell.clone();
            run(&cell, move || {
                let prior = &priors[index];
                prior.block_until_complete();
                match prior.error() {
                    Some(cause) => {
                        let wrapped = Error::wrap("error encountered in promise", cause);
                        let report = failures
                            .first
                            .lock()
                            .expect("failure slot lock poisoned")
                            .get_or_insert(wrapped)
                            .clone();
                        if failures.seen.fetch_add(1, Ordering::AcqRel) + 1 == total {
                            Some(Err(report))
                        } else {
                            None
                        }
                    }
                    None => {
                        if parent.count_down() == 0 {
                            let (values, _) = prior.snapshot();
                            Some(Ok(values))
                        } else {
                            None
                        }
                    }
                }
            })
        });
    }
    Promise::from_inner(inner)
}

/// Joins promises into one that settles with the first input to settle,
/// success or failure. Later outcomes are ignored; nothing is cancelled.
///
/// All inputs must share one result profile. Passing a single promise hands
/// it back unchanged.
///
/// # Panics
///
/// If the inputs' result profiles differ.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use std::time::Duration;
/// use vow::{race, Promise};
///
/// let slow = Promise::new(
///     || {
///         thread::sleep(Duration::from_millis(100));
///         String::from("slow")
///     },
///     (),
/// );
/// let quick = Promise::new(|| String::from("quick"), ());
///
/// let mut winner = String::new();
/// race([&slow, &quick]).wait((&mut winner,)).unwrap();
/// assert_eq!("quick", winner);
/// ```
pub fn race<'a, I>(promises: I) -> Promise
where
    I: IntoIterator<Item = &'a Promise>,
{
    let mut priors: Vec<Arc<Inner>> = promises.into_iter().map(|p| p.inner.clone()).collect();
    if priors.is_empty() {
        return Promise::from_inner(Inner::settled(Kind::Simple, Vec::new(), Vec::new()));
    }
    if priors.len() == 1 {
        return Promise::from_inner(priors.remove(0));
    }
    let profile = shared_profile(&priors, "race");
    let inner = Inner::new(Kind::Race, profile, false, 0);
    let priors = Arc::new(priors);
    for index in 0..priors.len() {
        let cell = inner.clone();
        let priors = priors.clone();
        task::spawn(move || {
            run(&cell, move || {
                let prior = &priors[index];
                prior.block_until_complete();
                Some(match prior.error() {
                    Some(cause) => Err(Error::wrap("error encountered in promise", cause)),
                    None => Ok(prior.snapshot().0),
                })
            })
        });
    }
    Promise::from_inner(inner)
}

fn shared_profile(priors: &[Arc<Inner>], combinator: &str) -> Vec<TypeDesc> {
    let first = priors[0].profile();
    for (index, prior) in priors.iter().enumerate().skip(1) {
        if prior.profile() != first {
            panic!(
                "promise {} has an unexpected result type, expected all promises passed to {} to return the same type",
                index, combinator
            );
        }
    }
    first.to_vec()
}
