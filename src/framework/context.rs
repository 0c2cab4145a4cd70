use std::sync::Arc;

use super::{OperationError, OperationPool, StopToken};
use crate::genome::ChromosomeShardedList;

/// Pool and stop token handed to an operation at construction.
///
/// Each top-level operation owns a fresh token, so stopping one operation
/// leaves its siblings on the same pool running. A nested operation is
/// created with [`OperationContext::nested`] and shares its parent's token.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pool: Arc<OperationPool>,
    stop: StopToken,
}

impl OperationContext {
    /// Context on `pool` with its own stop token.
    pub fn new(pool: &Arc<OperationPool>) -> Self {
        Self {
            pool: Arc::clone(pool),
            stop: StopToken::new(),
        }
    }

    /// Context for an operation run from inside another one.
    pub fn nested(&self) -> Self {
        self.clone()
    }

    /// Shared worker pool.
    pub fn pool(&self) -> &Arc<OperationPool> {
        &self.pool
    }

    /// Cancellation flag polled by the tasks of this operation.
    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    /// Request cancellation of the operation (and its nested operations).
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether cancellation was requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// One pool task per present shard, honouring this context's token.
    pub fn map_shards<T, R, F>(
        &self,
        shards: &ChromosomeShardedList<T>,
        f: F,
    ) -> Result<Option<ChromosomeShardedList<R>>, OperationError>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> Result<R, OperationError> + Sync,
    {
        self.pool.map_shards(shards, &self.stop, f)
    }

    /// One pool task per index in `0..count`, honouring this context's token.
    pub fn map_indices<R, F>(&self, count: usize, f: F) -> Result<Option<Vec<R>>, OperationError>
    where
        R: Send,
        F: Fn(usize) -> Result<R, OperationError> + Sync,
    {
        self.pool.map_indices(count, &self.stop, f)
    }
}
