//! Destination selection strategies.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::pool::destination::Destination;

/// Picks the destination a request is sent to within a pool.
pub trait Selector: Send + Sync + fmt::Debug {
    fn select(&self, destinations: &[Arc<Destination>], routing_key_hash: u32) -> Option<Arc<Destination>>;
}

/// Routing-key hash modulo pool size. A key always maps to the same
/// destination, healthy or not.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashSelector;

impl Selector for HashSelector {
    fn select(&self, destinations: &[Arc<Destination>], routing_key_hash: u32) -> Option<Arc<Destination>> {
        if destinations.is_empty() {
            return None;
        }
        let index = routing_key_hash as usize % destinations.len();
        destinations.get(index).cloned()
    }
}

/// Round-robin selector.
/// Stores an internal counter to rotate through destinations, skipping TKO ones.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn select(&self, destinations: &[Arc<Destination>], _routing_key_hash: u32) -> Option<Arc<Destination>> {
        if destinations.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = destinations.len();
        (0..len)
            .map(|i| &destinations[start.wrapping_add(i) % len])
            .find(|d| d.is_healthy())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;

    fn destinations(n: u16) -> Vec<Arc<Destination>> {
        (0..n)
            .map(|i| {
                let addr = format!("127.0.0.1:{}", 11211 + i).parse().unwrap();
                Arc::new(Destination::new(addr, "main", HealthConfig {
                    unhealthy_threshold: 1,
                    ..HealthConfig::default()
                }))
            })
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let selector = RoundRobin::new();
        let backends = destinations(2);

        let s1 = selector.select(&backends, 0).unwrap();
        assert_eq!(s1.addr, backends[0].addr);

        let s2 = selector.select(&backends, 0).unwrap();
        assert_eq!(s2.addr, backends[1].addr);

        let s3 = selector.select(&backends, 0).unwrap();
        assert_eq!(s3.addr, backends[0].addr);
    }

    #[test]
    fn round_robin_skips_tko() {
        let selector = RoundRobin::new();
        let backends = destinations(3);
        backends[1].mark_failure();

        for _ in 0..6 {
            let picked = selector.select(&backends, 0).unwrap();
            assert_ne!(picked.addr, backends[1].addr);
        }

        for d in &backends {
            d.mark_failure();
        }
        assert!(selector.select(&backends, 0).is_none());
    }

    #[test]
    fn round_robin_survives_counter_wrap() {
        let selector = RoundRobin {
            counter: AtomicUsize::new(usize::MAX),
        };
        let backends = destinations(2);
        // usize::MAX % 2 == 1, so the scan has to step past the end.
        backends[1].mark_failure();

        let picked = selector.select(&backends, 0).unwrap();
        assert_eq!(picked.addr, backends[0].addr);
        let next = selector.select(&backends, 0).unwrap();
        assert_eq!(next.addr, backends[0].addr);
    }

    #[test]
    fn hash_is_stable() {
        let backends = destinations(4);
        let a = HashSelector.select(&backends, 4242).unwrap();
        let b = HashSelector.select(&backends, 4242).unwrap();
        assert_eq!(a.addr, b.addr);
        assert_eq!(a.addr, backends[4242 % 4].addr);
        assert!(HashSelector.select(&[], 1).is_none());
    }
}
