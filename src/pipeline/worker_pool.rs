//! The pipeline compiler's background worker pool (§4.6 "Worker pool").
//!
//! A bounded FIFO task queue guarded by a mutex + condition variable, plus
//! a pending-task counter so `wait_idle()` can block until drained. Built
//! on `std::thread` rather than a crate like `rayon`/`crossbeam` — neither
//! appears in the teacher's declared dependencies, and the spec describes
//! exactly this primitive shape.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    queue_cv: Condvar,
    pending: Mutex<usize>,
    pending_cv: Condvar,
    shutdown: Mutex<bool>,
}

/// A fixed-size pool of background threads draining a shared task queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `thread_count` workers (minimum 1).
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            queue_cv: Condvar::new(),
            pending: Mutex::new(0),
            pending_cv: Condvar::new(),
            shutdown: Mutex::new(false),
        });

        let threads = (0..thread_count)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();

        Self { shared, threads }
    }

    /// The default worker count per §4.6: `max(1, hardware_threads / 2)`
    /// in GPL mode, `1` in monolithic mode, unless overridden.
    pub fn default_thread_count(gpl_mode: bool, override_count: Option<usize>) -> usize {
        if let Some(n) = override_count {
            return n.max(1);
        }
        if gpl_mode {
            std::thread::available_parallelism().map(|n| n.get() / 2).unwrap_or(1).max(1)
        } else {
            1
        }
    }

    /// Enqueue a task to run on a worker thread.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, task: F) {
        *self.shared.pending.lock().unwrap() += 1;
        self.shared.queue.lock().unwrap().push_back(Box::new(task));
        self.shared.queue_cv.notify_one();
    }

    /// Block until the pending-task counter reaches zero.
    pub fn wait_idle(&self) {
        let guard = self.shared.pending.lock().unwrap();
        let _unused = self.shared.pending_cv.wait_while(guard, |pending| *pending != 0).unwrap();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if *shared.shutdown.lock().unwrap() {
                    return;
                }
                queue = shared.queue_cv.wait(queue).unwrap();
            }
        };

        if let Some(task) = task {
            task();
            let mut pending = shared.pending.lock().unwrap();
            *pending -= 1;
            if *pending == 0 {
                shared.pending_cv.notify_all();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        *self.shared.shutdown.lock().unwrap() = true;
        self.shared.queue_cv.notify_all();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn wait_idle_blocks_until_all_tasks_complete() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn default_thread_count_is_one_in_monolithic_mode() {
        assert_eq!(WorkerPool::default_thread_count(false, None), 1);
    }

    #[test]
    fn override_wins_regardless_of_mode() {
        assert_eq!(WorkerPool::default_thread_count(true, Some(7)), 7);
    }
}
