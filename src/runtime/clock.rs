//! Periodic clock
//!
//! Broadcasts one [`ClockEvent`] per period to every listener in
//! registration order. The wait between ticks starts after delivery
//! finishes, so slow listeners stretch the period (no drift correction).

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::observers::{ObserverList, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockEvent {
    /// 1-based tick number
    pub tick: u64,
    /// Time since `start`
    pub elapsed: Duration,
}

#[derive(Default)]
pub struct PeriodicClock {
    listeners: Arc<ObserverList<ClockEvent>>,
}

impl PeriodicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&ClockEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listeners.subscribe_fn(f)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Spawn the ticking thread. Listeners added after `start` still
    /// receive later ticks.
    pub fn start(&self, period: Duration) -> std::io::Result<ClockHandle> {
        let listeners = Arc::clone(&self.listeners);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("periodic-clock".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut tick = 0u64;
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    tick += 1;
                    listeners.broadcast(&ClockEvent {
                        tick,
                        elapsed: started.elapsed(),
                    });
                }
                tracing::debug!(ticks = tick, "Periodic clock stopped");
            })?;

        Ok(ClockHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Running clock. Dropping the handle stops the clock.
pub struct ClockHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ClockHandle {
    /// Stop ticking and wait for the current delivery to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Periodic clock thread panicked");
            }
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn ticks_reach_listeners_in_order() {
        let clock = PeriodicClock::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        let s = Arc::clone(&seen);
        clock.subscribe(move |e: &ClockEvent| {
            s.lock().push(("first", e.tick));
            Ok(())
        });
        clock.subscribe(|_: &ClockEvent| anyhow::bail!("listener failure"));
        let s = Arc::clone(&seen);
        clock.subscribe(move |e: &ClockEvent| {
            s.lock().push(("last", e.tick));
            tx.send(e.tick)?;
            Ok(())
        });

        let handle = clock.start(Duration::from_millis(5)).unwrap();
        let mut ticks = Vec::new();
        while ticks.len() < 3 {
            ticks.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        handle.stop();

        assert_eq!(ticks, vec![1, 2, 3]);
        let seen = seen.lock();
        assert_eq!(&seen[..4], &[("first", 1), ("last", 1), ("first", 2), ("last", 2)]);
    }

    #[test]
    fn stop_ends_ticking() {
        let clock = PeriodicClock::new();
        let count = Arc::new(Mutex::new(0u64));
        let c = Arc::clone(&count);
        clock.subscribe(move |_: &ClockEvent| {
            *c.lock() += 1;
            Ok(())
        });
        let handle = clock.start(Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(20));
        handle.stop();
        let after_stop = *count.lock();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*count.lock(), after_stop);
    }
}
