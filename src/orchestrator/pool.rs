use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of OS threads, not a cooperative task scheduler: each
/// worker blocks on a channel receive and runs submitted closures to
/// completion. A closure that panics is caught at the worker boundary so one
/// bad item never takes down the thread (or the batch).
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize, name_prefix: &str) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(std::sync::Mutex::new(receiver));

        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{name_prefix}-{index}"))
                .spawn(move || worker_loop(&receiver))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        Self { sender, handles }
    }

    /// Enqueues a unit of work. Never blocks the caller beyond channel send.
    pub fn submit(&self, job: Job) {
        // The channel only errs once every worker has exited, which only
        // happens after `shutdown`; a submit past that point is a caller bug
        // we simply drop rather than panic on.
        let _ = self.sender.send(job);
    }

    /// Drops the sending half so workers observe channel closure, then
    /// joins every worker thread. Blocks until all in-flight jobs finish.
    pub fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    /// Drops the sending half, then joins every worker. A watcher thread
    /// fires `on_deadline` once if the joins haven't all finished by
    /// `deadline`, to force-kill whatever subprocess is holding a straggler
    /// worker; cancellation tokens should already have asked these workers
    /// to stop on their own, so this is a backstop, not the primary
    /// mechanism.
    pub fn shutdown_with_deadline(self, deadline: std::time::Duration, on_deadline: impl FnOnce() + Send + 'static) {
        drop(self.sender);

        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let watcher_done = done.clone();
        let watcher = thread::spawn(move || {
            thread::sleep(deadline);
            if !watcher_done.load(std::sync::atomic::Ordering::SeqCst) {
                on_deadline();
            }
        });

        for handle in self.handles {
            let _ = handle.join();
        }

        done.store(true, std::sync::atomic::Ordering::SeqCst);
        let _ = watcher.join();
    }
}

fn worker_loop(receiver: &Arc<std::sync::Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
            guard.recv()
        };
        match job {
            Ok(job) => {
                let _ = catch_unwind(AssertUnwindSafe(job));
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_all_submitted_jobs() {
        let pool = WorkerPool::new(4, "test-pool");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn shutdown_with_deadline_invokes_callback_for_a_straggler_worker() {
        let pool = WorkerPool::new(1, "test-pool-deadline");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        pool.submit(Box::new(|| thread::sleep(std::time::Duration::from_millis(200))));
        pool.shutdown_with_deadline(std::time::Duration::from_millis(20), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_with_deadline_skips_callback_when_work_finishes_in_time() {
        let pool = WorkerPool::new(1, "test-pool-no-deadline");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        pool.submit(Box::new(|| {}));
        pool.shutdown_with_deadline(std::time::Duration::from_secs(5), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_panicking_job_does_not_stop_the_pool() {
        let pool = WorkerPool::new(2, "test-pool-panic");
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(Box::new(|| panic!("boom")));
        for _ in 0..5 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
