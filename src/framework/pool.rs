use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info};

use super::{OperationError, Progress, ProgressCounter, StopToken};
use crate::genome::ChromosomeShardedList;

/// Bounded worker pool running one task per chromosome.
///
/// The pool is built explicitly and shared (`Arc<OperationPool>`) by every
/// operation of an application context. Operations may run nested
/// operations from inside a task: a worker blocked in a nested
/// [`OperationPool::start_pool`] keeps executing queued tasks through work
/// stealing, so a saturated pool does not deadlock on nested submissions.
#[derive(Debug)]
pub struct OperationPool {
    pool: rayon::ThreadPool,
    threads: usize,
    progress: ProgressCounter,
}

impl OperationPool {
    /// Create a pool with `threads` workers (defaults to the CPU count).
    pub fn new(threads: Option<usize>) -> Result<Self, OperationError> {
        let threads = threads.unwrap_or_else(num_cpus::get).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("operation-pool-{idx}"))
            .build()
            .map_err(|err| OperationError::Pool(err.to_string()))?;
        info!(threads, "operation pool started");
        Ok(Self {
            pool,
            threads,
            progress: ProgressCounter::new(),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Progress over every task submitted since the pool was created.
    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    /// Record one finished task.
    pub fn notify_done(&self) {
        self.progress.notify_done();
    }

    /// Run `tasks` on the pool and block until they are all finished.
    ///
    /// Returns the results in submission order. When a task fails, tasks that
    /// have not started yet skip their work and the first failure observed is
    /// returned. When `stop` fires, partial results are discarded and
    /// `Ok(None)` is returned.
    pub fn start_pool<R, F>(
        &self,
        tasks: Vec<F>,
        stop: &StopToken,
    ) -> Result<Option<Vec<R>>, OperationError>
    where
        R: Send,
        F: FnOnce() -> Result<R, OperationError> + Send,
    {
        let task_count = tasks.len();
        self.progress.add_tasks(task_count);
        debug!(task_count, "submitting tasks");

        let failed = AtomicBool::new(false);
        let failure: Mutex<Option<OperationError>> = Mutex::new(None);

        let results: Vec<Option<R>> = self.pool.install(|| {
            tasks
                .into_par_iter()
                .map(|task| {
                    let _guard = self.progress.task_guard();
                    if failed.load(Ordering::Acquire) || stop.is_stopped() {
                        return None;
                    }
                    match task() {
                        Ok(value) => Some(value),
                        Err(err) => {
                            failed.store(true, Ordering::Release);
                            let mut slot = failure.lock();
                            if slot.is_none() {
                                *slot = Some(err);
                            }
                            None
                        }
                    }
                })
                .collect()
        });

        if stop.is_stopped() {
            debug!(task_count, "stop requested, discarding partial results");
            return Ok(None);
        }
        if let Some(err) = failure.into_inner() {
            debug!(error = %err, "task failed");
            return Err(err);
        }
        results
            .into_iter()
            .collect::<Option<Vec<R>>>()
            .map(Some)
            .ok_or_else(|| OperationError::Pool("a task finished without a result".to_string()))
    }

    /// Run `f(index)` for every index in `0..count`.
    pub fn map_indices<R, F>(
        &self,
        count: usize,
        stop: &StopToken,
        f: F,
    ) -> Result<Option<Vec<R>>, OperationError>
    where
        R: Send,
        F: Fn(usize) -> Result<R, OperationError> + Sync,
    {
        let f = &f;
        let tasks: Vec<_> = (0..count).map(|index| move || f(index)).collect();
        self.start_pool(tasks, stop)
    }

    /// Run `f(chromosome, shard)` for every present shard; absent shards stay
    /// absent in the result.
    pub fn map_shards<T, R, F>(
        &self,
        shards: &ChromosomeShardedList<T>,
        stop: &StopToken,
        f: F,
    ) -> Result<Option<ChromosomeShardedList<R>>, OperationError>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> Result<R, OperationError> + Sync,
    {
        let results = self.map_indices(shards.len(), stop, |index| match shards.get(index) {
            Some(shard) => f(index, shard).map(Some),
            None => Ok(None),
        })?;
        Ok(results.map(ChromosomeShardedList::from_shards))
    }
}
