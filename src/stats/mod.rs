//! Proxy and per-pool statistics.
//!
//! # Data Flow
//! ```text
//! RequestContext::on_reply_received
//!     → pool_stats.rs (request count, per-send duration)
//! RequestContext drop
//!     → pool_stats.rs (final-result error count, total duration)
//! RequestLogger
//!     → proxy_stats.rs (per-operation result counters)
//! Admin API
//!     → proxy_stats.rs (snapshots)
//! ```
//!
//! # Design Decisions
//! - Stats are owned by the proxy, never by a request context
//! - Counters are atomics; duration windows sit behind short mutex sections
//! - Pool stat indexes are stable across config reloads (keyed by pool name)
//! - Every update is mirrored to the `metrics` facade

pub mod pool_stats;
pub mod proxy_stats;

use std::sync::OnceLock;
use std::time::Instant;

pub use pool_stats::{DurationSummary, PoolStats, PoolStatsSnapshot};
pub use proxy_stats::ProxyStats;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic microseconds since the first call in this process.
pub fn now_us() -> i64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    i64::try_from(epoch.elapsed().as_micros()).unwrap_or(i64::MAX)
}
