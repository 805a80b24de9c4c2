//! Counters and duration windows for one backend pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::observability::metrics;

/// Number of recent samples kept per duration window.
const SAMPLE_WINDOW: usize = 1024;

#[derive(Debug, Default)]
struct DurationWindow {
    count: u64,
    sum_us: i64,
    recent: VecDeque<i64>,
}

impl DurationWindow {
    fn add(&mut self, duration_us: i64) {
        self.count += 1;
        self.sum_us = self.sum_us.saturating_add(duration_us);
        if self.recent.len() == SAMPLE_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(duration_us);
    }

    fn summary(&self) -> DurationSummary {
        DurationSummary {
            count: self.count,
            avg_us: if self.count == 0 {
                0
            } else {
                self.sum_us / self.count as i64
            },
            max_recent_us: self.recent.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Aggregate view of a duration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationSummary {
    pub count: u64,
    pub avg_us: i64,
    pub max_recent_us: i64,
}

/// Point-in-time copy of a pool's stats, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatsSnapshot {
    pub name: String,
    pub index: usize,
    pub request_count: u64,
    pub final_result_error_count: u64,
    pub duration: DurationSummary,
    pub total_duration: DurationSummary,
}

/// Stats for a single pool.
///
/// `duration` samples are per physical send; `total_duration` samples are per
/// logical request and are recorded when the request context is destroyed.
#[derive(Debug)]
pub struct PoolStats {
    name: String,
    index: usize,
    request_count: AtomicU64,
    final_result_error_count: AtomicU64,
    durations: Mutex<DurationWindow>,
    total_durations: Mutex<DurationWindow>,
}

impl PoolStats {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            request_count: AtomicU64::new(0),
            final_result_error_count: AtomicU64::new(0),
            durations: Mutex::new(DurationWindow::default()),
            total_durations: Mutex::new(DurationWindow::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn increment_request_count(&self, n: u64) {
        self.request_count.fetch_add(n, Ordering::Relaxed);
        metrics::record_pool_requests(&self.name, n);
    }

    pub fn add_duration_sample(&self, duration_us: i64) {
        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(duration_us);
        metrics::record_pool_duration(&self.name, duration_us);
    }

    pub fn increment_final_result_error_count(&self, n: u64) {
        self.final_result_error_count.fetch_add(n, Ordering::Relaxed);
        if n > 0 {
            metrics::record_pool_final_errors(&self.name, n);
        }
    }

    pub fn add_total_duration_sample(&self, duration_us: i64) {
        self.total_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(duration_us);
        metrics::record_pool_total_duration(&self.name, duration_us);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn final_result_error_count(&self) -> u64 {
        self.final_result_error_count.load(Ordering::Relaxed)
    }

    /// Most recent per-send duration samples, oldest first.
    pub fn duration_samples(&self) -> Vec<i64> {
        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent
            .iter()
            .copied()
            .collect()
    }

    /// Most recent total-duration samples, oldest first.
    pub fn total_duration_samples(&self) -> Vec<i64> {
        self.total_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent
            .iter()
            .copied()
            .collect()
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            name: self.name.clone(),
            index: self.index,
            request_count: self.request_count(),
            final_result_error_count: self.final_result_error_count(),
            duration: self
                .durations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .summary(),
            total_duration: self
                .total_durations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_and_samples() {
        let stats = PoolStats::new("main", 0);
        stats.increment_request_count(1);
        stats.increment_request_count(2);
        stats.add_duration_sample(150);
        stats.add_duration_sample(250);
        stats.increment_final_result_error_count(0);
        stats.increment_final_result_error_count(1);
        stats.add_total_duration_sample(400);

        assert_eq!(stats.request_count(), 3);
        assert_eq!(stats.duration_samples(), vec![150, 250]);
        assert_eq!(stats.final_result_error_count(), 1);
        assert_eq!(stats.total_duration_samples(), vec![400]);

        let snap = stats.snapshot();
        assert_eq!(snap.duration.count, 2);
        assert_eq!(snap.duration.avg_us, 200);
        assert_eq!(snap.duration.max_recent_us, 250);
        assert_eq!(snap.total_duration.count, 1);
    }

    #[test]
    fn window_keeps_most_recent_samples() {
        let stats = PoolStats::new("main", 0);
        for i in 0..(SAMPLE_WINDOW as i64 + 10) {
            stats.add_duration_sample(i);
        }
        let samples = stats.duration_samples();
        assert_eq!(samples.len(), SAMPLE_WINDOW);
        assert_eq!(samples[0], 10);
        assert_eq!(stats.snapshot().duration.count, SAMPLE_WINDOW as u64 + 10);
    }
}
