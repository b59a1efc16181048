//! Serializing task queue
//!
//! One dedicated thread runs submitted tasks strictly in submission order,
//! one at a time. A failing task is logged and the queue keeps going.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::observers::panic_message;

type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

struct QueueState {
    tasks: VecDeque<Task>,
    running: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Signalled when a task is pushed or shutdown starts
    work: Condvar,
    /// Signalled when the queue drains
    idle: Condvar,
}

pub struct SerialQueue {
    name: String,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SerialQueue {
    /// Start the worker thread
    pub fn new(name: &str) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                running: false,
                shutdown: false,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let thread_name = name.to_string();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(&thread_name, &worker_shared))?;

        Ok(Self {
            name: name.to_string(),
            shared,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a task. Never blocks on running tasks.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.tasks.push_back(Box::new(task));
        self.shared.work.notify_one();
    }

    /// Queued tasks plus the one currently running
    pub fn pending_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.tasks.len() + usize::from(state.running)
    }

    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// Block until every submitted task has finished or `timeout` elapses.
    /// Returns true when the queue is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.tasks.is_empty() || state.running {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return state.tasks.is_empty() && !state.running;
            }
        }
        true
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(queue = %self.name, "Queue worker thread panicked");
            }
        }
    }
}

fn run_worker(name: &str, shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(task) = state.tasks.pop_front() {
                    state.running = true;
                    break task;
                }
                if state.shutdown {
                    return;
                }
                shared.work.wait(&mut state);
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(queue = %name, "Queued task failed: {:#}", e),
            Err(panic) => {
                tracing::error!(queue = %name, "Queued task panicked: {}", panic_message(&panic))
            }
        }

        let mut state = shared.state.lock();
        state.running = false;
        if state.tasks.is_empty() {
            shared.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn runs_in_submission_order() {
        let queue = SerialQueue::new("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let seen = Arc::clone(&seen);
            queue.submit(move || {
                seen.lock().push(i);
                Ok(())
            });
        }
        assert!(queue.wait_idle(Duration::from_secs(5)));
        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn failures_do_not_stop_later_tasks() {
        let queue = SerialQueue::new("test-failures").unwrap();
        let ran = Arc::new(Mutex::new(0));
        queue.submit(|| anyhow::bail!("boom"));
        queue.submit(|| panic!("task panic"));
        let r = Arc::clone(&ran);
        queue.submit(move || {
            *r.lock() += 1;
            Ok(())
        });
        assert!(queue.wait_idle(Duration::from_secs(5)));
        assert_eq!(*ran.lock(), 1);
    }

    #[test]
    fn failed_tasks_keep_the_order_of_the_rest() {
        let queue = SerialQueue::new("test-failure-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        queue.submit(move || {
            s.lock().push(1);
            Ok(())
        });
        queue.submit(|| anyhow::bail!("second fails"));
        queue.submit(|| panic!("third panics"));
        let s = Arc::clone(&seen);
        queue.submit(move || {
            s.lock().push(4);
            Ok(())
        });
        assert!(queue.wait_idle(Duration::from_secs(5)));
        assert_eq!(*seen.lock(), vec![1, 4]);
    }

    #[test]
    fn pending_count_includes_running_task() {
        let queue = SerialQueue::new("test-pending").unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        queue.submit(move || {
            started_tx.send(())?;
            release_rx.recv()?;
            Ok(())
        });
        queue.submit(|| Ok(()));

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(queue.pending_count(), 2);
        assert!(!queue.is_idle());
        assert!(!queue.wait_idle(Duration::from_millis(20)));

        release_tx.send(()).unwrap();
        assert!(queue.wait_idle(Duration::from_secs(5)));
        assert!(queue.is_idle());
    }

    #[test]
    fn drop_drains_remaining_tasks() {
        let ran = Arc::new(Mutex::new(0));
        {
            let queue = SerialQueue::new("test-drop").unwrap();
            for _ in 0..10 {
                let r = Arc::clone(&ran);
                queue.submit(move || {
                    *r.lock() += 1;
                    Ok(())
                });
            }
        }
        assert_eq!(*ran.lock(), 10);
    }
}
