use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::trace;

use super::config::config;

type Task = Box<dyn FnOnce() + Send>;

static FREE_THREADS: AtomicUsize = AtomicUsize::new(0);

static POOL: Lazy<Sender<Task>> = Lazy::new(|| {
    let (sender, recv) = unbounded();
    start_thread(recv);
    sender
});

fn start_thread(recv: Receiver<Task>) {
    thread::Builder::new()
        .name(config().thread_name.clone())
        .spawn(move || {
            FREE_THREADS.fetch_add(1, Ordering::SeqCst);
            loop {
                let result = recv.recv_timeout(config().idle_timeout);
                let mut task = match result {
                    Ok(task) => task,
                    Err(_) => {
                        let reserve = config().reserve_threads.max(1);
                        if FREE_THREADS.fetch_sub(1, Ordering::SeqCst) <= reserve {
                            FREE_THREADS.fetch_add(1, Ordering::SeqCst);
                            continue;
                        }
                        // retire this thread
                        break;
                    }
                };

                if FREE_THREADS.fetch_sub(1, Ordering::SeqCst) == 1 {
                    trace!("all workers busy, starting another");
                    start_thread(recv.clone())
                }

                loop {
                    task();
                    task = match recv.try_recv() {
                        Ok(t) => t,
                        Err(_) => break,
                    }
                }

                FREE_THREADS.fetch_add(1, Ordering::SeqCst);
            }
        })
        .expect("cannot start a promise worker thread");
}

/// Submits a task to the worker pool.
///
/// The task starts as soon as a worker is free; the pool grows whenever the
/// last free worker is taken, so submission never deadlocks behind tasks
/// that block.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc::channel;
///
/// let (tx, rx) = channel();
/// vow::task::spawn(move || tx.send(7).unwrap());
/// assert_eq!(7, rx.recv().unwrap());
/// ```
pub fn spawn<F>(f: F)
where
    F: 'static + Send + FnOnce(),
{
    POOL.send(Box::new(f)).expect("no worker thread started")
}

#[cfg(test)]
mod tests {
    use super::spawn;
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Barrier};

    #[test]
    fn basic() {
        let (tx, rx) = channel();
        spawn(move || tx.send(1).unwrap());
        assert_eq!(1, rx.recv().unwrap());
    }

    #[test]
    fn grows_past_blocked_workers() {
        // rendezvous only succeeds if eight tasks run at the same time
        let barrier = Arc::new(Barrier::new(9));
        for _ in 0..8 {
            let barrier = barrier.clone();
            spawn(move || {
                barrier.wait();
            });
        }
        barrier.wait();
    }
}
