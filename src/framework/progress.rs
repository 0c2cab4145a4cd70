use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

/// Snapshot of the pool progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Tasks that finished, whatever their outcome.
    pub done: usize,
    /// Tasks submitted so far.
    pub total: usize,
}

impl Progress {
    /// Completed fraction in `[0, 1]`; `1` when nothing was submitted.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

/// Monotonic task counters, safe to update from worker threads.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressCounter {
    /// Counter with nothing submitted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `count` newly submitted tasks.
    pub fn add_tasks(&self, count: usize) {
        self.total.fetch_add(count, Ordering::AcqRel);
    }

    /// Record one finished task.
    pub fn notify_done(&self) {
        let done = self.done.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(done, "task finished");
    }

    /// Guard calling [`ProgressCounter::notify_done`] when dropped, so every
    /// exit path of a task reports exactly once.
    pub fn task_guard(&self) -> TaskGuard<'_> {
        TaskGuard { counter: self }
    }

    /// Current counters.
    pub fn snapshot(&self) -> Progress {
        Progress {
            done: self.done.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }
}

/// Reports one finished task on drop.
#[derive(Debug)]
pub struct TaskGuard<'a> {
    counter: &'a ProgressCounter,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.counter.notify_done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_reports_on_early_return() {
        fn task(counter: &ProgressCounter, bail: bool) -> Option<u32> {
            let _guard = counter.task_guard();
            if bail {
                return None;
            }
            Some(1)
        }

        let counter = ProgressCounter::new();
        counter.add_tasks(2);
        task(&counter, true);
        task(&counter, false);
        assert_eq!(counter.snapshot(), Progress { done: 2, total: 2 });
        assert_eq!(counter.snapshot().fraction(), 1.0);
    }
}
