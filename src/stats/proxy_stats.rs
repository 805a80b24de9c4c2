//! Process-wide stats sink shared by every request context of a proxy.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::message::{Operation, ResultCode};
use crate::stats::pool_stats::PoolStats;

/// Stats sink owned by a [`crate::proxy::Proxy`].
#[derive(Debug, Default)]
pub struct ProxyStats {
    /// pool name -> stat index.
    pool_indexes: DashMap<String, usize>,
    pools: DashMap<usize, Arc<PoolStats>>,
    next_index: AtomicUsize,
    /// (operation, result) -> reply count, fed by the request logger.
    results: DashMap<(Operation, ResultCode), u64>,
    contexts_alive: AtomicI64,
}

impl ProxyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stat index for `pool`, allocating one on first use.
    ///
    /// Indexes are never reused, so a pool keeps its index across reloads.
    pub fn register_pool(&self, pool: &str) -> usize {
        *self
            .pool_indexes
            .entry(pool.to_string())
            .or_insert_with(|| {
                let index = self.next_index.fetch_add(1, Ordering::Relaxed);
                self.pools
                    .insert(index, Arc::new(PoolStats::new(pool, index)));
                index
            })
    }

    /// Stats for the pool at `index`. An absent index, or one that was never
    /// registered, yields `None`.
    pub fn get_pool_stats(&self, index: Option<usize>) -> Option<Arc<PoolStats>> {
        let index = index?;
        self.pools.get(&index).map(|r| Arc::clone(r.value()))
    }

    pub fn pool_stats_by_name(&self, pool: &str) -> Option<Arc<PoolStats>> {
        let index = *self.pool_indexes.get(pool)?.value();
        self.get_pool_stats(Some(index))
    }

    /// All registered pools, ordered by index.
    pub fn all_pools(&self) -> Vec<Arc<PoolStats>> {
        let mut pools: Vec<_> = self.pools.iter().map(|r| Arc::clone(r.value())).collect();
        pools.sort_by_key(|p| p.index());
        pools
    }

    pub fn record_result(&self, operation: Operation, result: ResultCode) {
        *self.results.entry((operation, result)).or_insert(0) += 1;
    }

    pub fn result_count(&self, operation: Operation, result: ResultCode) -> u64 {
        self.results
            .get(&(operation, result))
            .map(|r| *r.value())
            .unwrap_or(0)
    }

    pub(crate) fn context_created(&self) {
        self.contexts_alive.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn context_destroyed(&self) {
        self.contexts_alive.fetch_sub(1, Ordering::Relaxed);
    }

    /// Request contexts constructed and not yet destroyed.
    pub fn contexts_alive(&self) -> i64 {
        self.contexts_alive.load(Ordering::Relaxed)
    }
}
