use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};
use tracing::trace;

use super::error::Error;
use super::value::{TypeDesc, Value};

/// How a promise was constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Built by [`Promise::new`], or a trivially-complete join of nothing.
    Simple,
    /// Built by [`Promise::then`].
    Then,
    /// Built by [`all`](super::all).
    All,
    /// Built by [`any`](super::any).
    Any,
    /// Built by [`race`](super::race).
    Race,
}

struct State {
    complete: bool,
    results: Vec<Value>,
    error: Option<Error>,
    wakers: Vec<Waker>,
}

/// The shared cell behind a [`Promise`]: result profile, settlement state,
/// and the completion latch.
pub(crate) struct Inner {
    kind: Kind,
    profile: Vec<TypeDesc>,
    returns_error: bool,
    state: Mutex<State>,
    cond: Condvar,
    pending: AtomicI64,
}

impl Inner {
    pub fn new(kind: Kind, profile: Vec<TypeDesc>, returns_error: bool, pending: i64) -> Arc<Self> {
        Arc::new(Self {
            kind,
            profile,
            returns_error,
            state: Mutex::new(State {
                complete: false,
                results: Vec::new(),
                error: None,
                wakers: Vec::new(),
            }),
            cond: Condvar::new(),
            pending: AtomicI64::new(pending),
        })
    }

    /// A cell that is already settled with the given results.
    pub fn settled(kind: Kind, profile: Vec<TypeDesc>, results: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            profile,
            returns_error: false,
            state: Mutex::new(State {
                complete: true,
                results,
                error: None,
                wakers: Vec::new(),
            }),
            cond: Condvar::new(),
            pending: AtomicI64::new(0),
        })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn profile(&self) -> &[TypeDesc] {
        &self.profile
    }

    pub fn returns_error(&self) -> bool {
        self.returns_error
    }

    /// Settles the cell. The first call wins: it stores the payload, flips
    /// the completion flag and wakes every waiter; later calls are no-ops.
    pub fn complete(&self, outcome: Result<Vec<Value>, Error>) {
        let mut state = self.state.lock().expect("promise state lock poisoned");
        if state.complete {
            return;
        }
        match outcome {
            Ok(results) => state.results = results,
            Err(error) => state.error = Some(error),
        }
        state.complete = true;
        trace!(kind = ?self.kind, failed = state.error.is_some(), "promise settled");
        let wakers = std::mem::take(&mut state.wakers);
        self.cond.notify_all();
        drop(state);
        for waker in wakers {
            waker.wake();
        }
    }

    /// Blocks the calling thread until the cell settles. Returns at once if
    /// it already has.
    pub fn block_until_complete(&self) {
        let mut state = self.state.lock().expect("promise state lock poisoned");
        while !state.complete {
            state = self
                .cond
                .wait(state)
                .expect("promise state lock poisoned");
        }
    }

    /// The settled payload. Must not be called before completion.
    pub fn snapshot(&self) -> (Vec<Value>, Option<Error>) {
        let state = self.state.lock().expect("promise state lock poisoned");
        debug_assert!(state.complete);
        (state.results.clone(), state.error.clone())
    }

    /// The settled error, if any. Must not be called before completion.
    pub fn error(&self) -> Option<Error> {
        let state = self.state.lock().expect("promise state lock poisoned");
        debug_assert!(state.complete);
        state.error.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.state
            .lock()
            .expect("promise state lock poisoned")
            .complete
    }

    /// Counts one predecessor down, returning how many remain.
    pub fn count_down(&self) -> i64 {
        self.pending.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

/// A handle to an asynchronously computed, typed result.
///
/// The handle is move-only: its identity is its completion latch, and two
/// independent latches over one result would let observers disagree about
/// settlement. Share a promise by reference instead: combinators borrow
/// their predecessors, so any number of [`then`](Promise::then) chains and
/// [`wait`](Promise::wait) calls may hang off one promise.
pub struct Promise {
    pub(crate) inner: Arc<Inner>,
}

impl Promise {
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// How this promise was constructed.
    pub fn kind(&self) -> Kind {
        self.inner.kind()
    }

    /// The types a successful settlement carries, in order.
    pub fn result_types(&self) -> &[TypeDesc] {
        self.inner.profile()
    }

    /// Whether the body declared an error channel.
    pub fn returns_error(&self) -> bool {
        self.inner.returns_error()
    }

    /// Whether the promise has settled, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    /// A future that resolves once this promise settles.
    ///
    /// The blocking [`wait`](Promise::wait) is the primary egress; this is
    /// the same latch exposed to async callers that only need the
    /// settlement signal.
    ///
    /// ```
    /// use vow::Promise;
    ///
    /// let p = Promise::new(|| 9i64, ());
    /// futures::executor::block_on(p.completed());
    /// assert!(p.is_complete());
    /// ```
    pub fn completed(&self) -> Completed<'_> {
        Completed { inner: &self.inner }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("kind", &self.kind())
            .field("result_types", &self.result_types())
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Future returned by [`Promise::completed`].
pub struct Completed<'a> {
    inner: &'a Inner,
}

impl Future for Completed<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self
            .inner
            .state
            .lock()
            .expect("promise state lock poisoned");
        if state.complete {
            return Poll::Ready(());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::{Inner, Kind};
    use crate::promise::error::Error;
    use crate::promise::value::{TypeDesc, Value};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn first_settlement_wins() {
        let cell = Inner::new(Kind::Simple, vec![TypeDesc::of::<i32>()], false, 0);
        cell.complete(Ok(vec![Value::new(1i32)]));
        cell.complete(Err(Error::panicked("too late")));
        let (results, error) = cell.snapshot();
        assert!(error.is_none());
        assert_eq!(Some(&1), results[0].downcast_ref::<i32>());
    }

    #[test]
    fn late_waiter_returns_immediately() {
        let cell = Inner::new(Kind::Simple, Vec::new(), false, 0);
        cell.complete(Ok(Vec::new()));
        cell.block_until_complete();
        assert!(cell.is_complete());
    }

    #[test]
    fn latch_admits_many_waiters() {
        let cell = Inner::new(Kind::Simple, Vec::new(), false, 0);
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let cell = cell.clone();
            waiters.push(thread::spawn(move || cell.block_until_complete()));
        }
        thread::sleep(Duration::from_millis(20));
        cell.complete(Ok(Vec::new()));
        for waiter in waiters {
            waiter.join().expect("waiter panicked");
        }
    }

    #[test]
    fn count_down_elects_one_zero_observer() {
        let cell = Inner::new(Kind::All, Vec::new(), false, 3);
        assert_eq!(2, cell.count_down());
        assert_eq!(1, cell.count_down());
        assert_eq!(0, cell.count_down());
    }
}
