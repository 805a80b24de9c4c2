//! Destination abstraction.
//!
//! # Responsibilities
//! - Represent a single backend cache server within a pool
//! - Track in-flight sends
//! - Track health state (Healthy/Tko) from send outcomes

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::HealthConfig;
use crate::stats::now_us;

/// Health state of a destination.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    /// Marked down after consecutive failures; sends fail fast.
    Tko = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Tko,
            _ => HealthState::Unknown,
        }
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Destination {
    pub addr: SocketAddr,
    pub pool_name: String,
    health: HealthConfig,
    in_flight: AtomicUsize,
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
    /// When the last TKO probe was let through.
    last_probe_us: AtomicI64,
}

impl Destination {
    pub fn new(addr: SocketAddr, pool_name: impl Into<String>, health: HealthConfig) -> Self {
        Self {
            addr,
            pool_name: pool_name.into(),
            health,
            in_flight: AtomicUsize::new(0),
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
            last_probe_us: AtomicI64::new(0),
        }
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Healthy or Unknown.
    pub fn is_healthy(&self) -> bool {
        self.state() != HealthState::Tko
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Count a send as in flight until the guard drops.
    pub fn in_flight_guard(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            destination: Arc::clone(self),
        }
    }

    /// Report a send that got a reply.
    pub fn mark_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.state() == HealthState::Healthy {
            return;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= self.health.healthy_threshold {
            let previous = self.state.swap(HealthState::Healthy as u8, Ordering::Relaxed);
            if HealthState::from(previous) == HealthState::Tko {
                tracing::info!(pool = %self.pool_name, destination = %self.addr, "Destination recovered");
            }
        }
    }

    /// Report a send that failed at the transport.
    pub fn mark_failure(&self) {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        if self.state() == HealthState::Tko {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.health.unhealthy_threshold {
            self.state.store(HealthState::Tko as u8, Ordering::Relaxed);
            self.last_probe_us.store(now_us(), Ordering::Relaxed);
            tracing::warn!(
                pool = %self.pool_name,
                destination = %self.addr,
                failures,
                "Destination marked TKO"
            );
        }
    }

    /// Whether a send to a TKO destination may go through as a probe. At most
    /// one probe is let through per probe interval.
    pub fn try_probe(&self) -> bool {
        let last = self.last_probe_us.load(Ordering::Relaxed);
        let now = now_us();
        if now - last < self.health.probe_interval_ms.saturating_mul(1000) as i64 {
            return false;
        }
        self.last_probe_us
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    pub fn snapshot(&self) -> DestinationSnapshot {
        DestinationSnapshot {
            address: self.addr,
            state: self.state(),
            in_flight: self.in_flight(),
        }
    }
}

/// Point-in-time view of a destination, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationSnapshot {
    pub address: SocketAddr,
    pub state: HealthState,
    pub in_flight: usize,
}

/// RAII guard that manages the in-flight count.
#[derive(Debug)]
pub struct InFlightGuard {
    destination: Arc<Destination>,
}

impl Deref for InFlightGuard {
    type Target = Destination;

    fn deref(&self) -> &Self::Target {
        &self.destination
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.destination.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> Arc<Destination> {
        Arc::new(Destination::new(
            "127.0.0.1:11211".parse().unwrap(),
            "main",
            HealthConfig {
                unhealthy_threshold: 2,
                healthy_threshold: 1,
                probe_interval_ms: 60_000,
            },
        ))
    }

    #[test]
    fn tko_after_consecutive_failures() {
        let d = destination();
        d.mark_failure();
        assert!(d.is_healthy());
        d.mark_failure();
        assert_eq!(d.state(), HealthState::Tko);
        assert!(!d.is_healthy());

        d.mark_success();
        assert_eq!(d.state(), HealthState::Healthy);
    }

    #[test]
    fn probes_are_rate_limited() {
        let d = destination();
        d.mark_failure();
        d.mark_failure();
        assert!(!d.try_probe());

        let eager = Destination::new(
            d.addr,
            "main",
            HealthConfig {
                unhealthy_threshold: 1,
                healthy_threshold: 1,
                probe_interval_ms: 0,
            },
        );
        eager.mark_failure();
        assert!(eager.try_probe());
    }

    #[test]
    fn success_resets_failure_streak() {
        let d = destination();
        d.mark_failure();
        d.mark_success();
        d.mark_failure();
        assert!(d.is_healthy());
    }

    #[test]
    fn in_flight_guard_counts() {
        let d = destination();
        {
            let _a = d.in_flight_guard();
            let _b = d.in_flight_guard();
            assert_eq!(d.in_flight(), 2);
        }
        assert_eq!(d.in_flight(), 0);
    }
}
