//! Backend pools.
//!
//! # Data Flow
//! ```text
//! PoolRoute
//!     → Pool::select(routing_key_hash)
//!         → selector.rs (hash or round-robin)
//!     → destination.rs (health, in-flight tracking)
//!     → DestinationRoute sends
//! ```
//!
//! # Design Decisions
//! - Pools are rebuilt with every routing snapshot; their stat index is
//!   keyed by name and survives reloads
//! - Selection strategy per pool
//! - The hash selector keeps TKO destinations in place so keys never move;
//!   failover routes handle the fast-failed reply

pub mod destination;
pub mod selector;

use std::sync::Arc;

use serde::Serialize;

use crate::config::{HealthConfig, PoolConfig, SelectorKind, ValidationError};
pub use destination::{Destination, DestinationSnapshot, HealthState, InFlightGuard};
pub use selector::{HashSelector, RoundRobin, Selector};

/// A named group of destinations.
#[derive(Debug)]
pub struct Pool {
    name: String,
    stat_index: usize,
    destinations: Vec<Arc<Destination>>,
    selector: Box<dyn Selector>,
}

impl Pool {
    pub fn new(
        name: impl Into<String>,
        stat_index: usize,
        destinations: Vec<Arc<Destination>>,
        selector: Box<dyn Selector>,
    ) -> Self {
        Self {
            name: name.into(),
            stat_index,
            destinations,
            selector,
        }
    }

    /// Build a pool from its configuration.
    pub fn from_config(
        config: &PoolConfig,
        stat_index: usize,
        health: &HealthConfig,
    ) -> Result<Self, ValidationError> {
        let destinations = config
            .servers
            .iter()
            .map(|server| {
                server
                    .parse()
                    .map(|addr| Arc::new(Destination::new(addr, config.name.as_str(), health.clone())))
                    .map_err(|_| ValidationError::InvalidAddress {
                        pool: config.name.clone(),
                        address: server.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let selector: Box<dyn Selector> = match config.selector {
            SelectorKind::Hash => Box::new(HashSelector),
            SelectorKind::RoundRobin => Box::new(RoundRobin::new()),
        };
        Ok(Self::new(config.name.as_str(), stat_index, destinations, selector))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stat_index(&self) -> usize {
        self.stat_index
    }

    pub fn destinations(&self) -> &[Arc<Destination>] {
        &self.destinations
    }

    pub fn select(&self, routing_key_hash: u32) -> Option<Arc<Destination>> {
        let selected = self.selector.select(&self.destinations, routing_key_hash);
        if selected.is_none() {
            tracing::debug!(
                pool = %self.name,
                destination_count = self.destinations.len(),
                "No destination available in pool"
            );
        }
        selected
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            name: self.name.clone(),
            stat_index: self.stat_index,
            destinations: self.destinations.iter().map(|d| d.snapshot()).collect(),
        }
    }
}

/// Point-in-time view of a pool, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub name: String,
    pub stat_index: usize,
    pub destinations: Vec<DestinationSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_rejects_bad_address() {
        let config = PoolConfig {
            name: "main".into(),
            servers: vec!["127.0.0.1:11211".into(), "not-an-address".into()],
            selector: SelectorKind::Hash,
        };
        let err = Pool::from_config(&config, 0, &HealthConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAddress { .. }));
    }

    #[test]
    fn from_config_builds_destinations() {
        let config = PoolConfig {
            name: "main".into(),
            servers: vec!["127.0.0.1:11211".into(), "127.0.0.1:11212".into()],
            selector: SelectorKind::RoundRobin,
        };
        let pool = Pool::from_config(&config, 7, &HealthConfig::default()).unwrap();
        assert_eq!(pool.name(), "main");
        assert_eq!(pool.stat_index(), 7);
        assert_eq!(pool.destinations().len(), 2);
        assert_eq!(pool.destinations()[0].pool_name, "main");
        assert!(pool.select(0).is_some());
    }
}
