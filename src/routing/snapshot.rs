//! Immutable routing state for one configuration generation.
//!
//! # Responsibilities
//! - Compile a `RoutingConfig` into pools and one route tree per operation
//! - Keep pool stat indexes stable across generations
//!
//! # Design Decisions
//! - A snapshot never changes after it is built; a reload builds a new one
//! - Request contexts pin the snapshot they started with via `Arc`

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{validate_routing, ConfigError, RouteConfig, RoutingConfig, ValidationError};
use crate::message::Request;
use crate::pool::Pool;
use crate::routing::all_async::AllAsyncRoute;
use crate::routing::all_sync::AllSyncRoute;
use crate::routing::failover::FailoverRoute;
use crate::routing::pool_route::PoolRoute;
use crate::routing::route::{ProxyRoute, Route};
use crate::routing::shard_split::{ShardSplitRoute, ShardSplitter};
use crate::stats::ProxyStats;
use crate::transport::Transport;

/// Compiled routing configuration.
#[derive(Debug)]
pub struct RoutingSnapshot {
    pub generation: u64,
    pub routing_prefix: String,
    pools: HashMap<String, Arc<Pool>>,
    pub route: ProxyRoute,
}

struct Builder<'a> {
    pools: &'a HashMap<String, Arc<Pool>>,
    transport: &'a Arc<dyn Transport>,
    routing_prefix: Arc<str>,
}

impl Builder<'_> {
    fn build<R: Request>(&self, config: &RouteConfig) -> Result<Arc<dyn Route<R>>, ValidationError> {
        let route: Arc<dyn Route<R>> = match config {
            RouteConfig::Pool { pool } => {
                let pool = self.pools.get(pool).ok_or_else(|| ValidationError::UnknownPool {
                    route: "pool".to_string(),
                    pool: pool.clone(),
                })?;
                Arc::new(PoolRoute::new(
                    Arc::clone(pool),
                    Arc::clone(self.transport),
                    Arc::clone(&self.routing_prefix),
                ))
            }
            RouteConfig::AllSync { children } => Arc::new(AllSyncRoute::new(self.children(children)?)),
            RouteConfig::AllAsync { children } => Arc::new(AllAsyncRoute::new(self.children(children)?)),
            RouteConfig::Failover { children } => Arc::new(FailoverRoute::new(self.children(children)?)),
            RouteConfig::ShardSplit { shards, child } => Arc::new(ShardSplitRoute::new(
                ShardSplitter::new(*shards),
                self.build(child)?,
            )),
        };
        Ok(route)
    }

    fn children<R: Request>(&self, configs: &[RouteConfig]) -> Result<Vec<Arc<dyn Route<R>>>, ValidationError> {
        configs.iter().map(|c| self.build(c)).collect()
    }
}

impl RoutingSnapshot {
    /// Validate `config` and compile it. Pools are registered with `stats`
    /// by name, so a pool keeps its stat index across generations.
    pub fn build(
        config: &RoutingConfig,
        stats: &ProxyStats,
        transport: Arc<dyn Transport>,
        generation: u64,
    ) -> Result<Self, ConfigError> {
        validate_routing(config)?;

        let mut pools = HashMap::new();
        for pool_config in &config.pools {
            let stat_index = stats.register_pool(&pool_config.name);
            let pool = Pool::from_config(pool_config, stat_index, &config.health)
                .map_err(|e| ConfigError::Validation(vec![e]))?;
            pools.insert(pool_config.name.clone(), Arc::new(pool));
        }

        let builder = Builder {
            pools: &pools,
            transport: &transport,
            routing_prefix: Arc::from(config.routing_prefix.as_str()),
        };
        let invalid = |e: ValidationError| ConfigError::Validation(vec![e]);
        let ops = &config.operations;
        let route = ProxyRoute {
            get: builder
                .build(ops.get.as_ref().unwrap_or(&config.route))
                .map_err(invalid)?,
            set: builder
                .build(ops.set.as_ref().unwrap_or(&config.route))
                .map_err(invalid)?,
            delete: builder
                .build(ops.delete.as_ref().unwrap_or(&config.route))
                .map_err(invalid)?,
        };

        Ok(Self {
            generation,
            routing_prefix: config.routing_prefix.clone(),
            pools,
            route,
        })
    }

    pub fn pool(&self, name: &str) -> Option<&Arc<Pool>> {
        self.pools.get(name)
    }

    /// All pools, ordered by stat index.
    pub fn pools(&self) -> Vec<&Arc<Pool>> {
        let mut pools: Vec<_> = self.pools.values().collect();
        pools.sort_by_key(|p| p.stat_index());
        pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolConfig, SelectorKind};
    use crate::transport::MemoryTransport;

    fn config() -> RoutingConfig {
        RoutingConfig {
            routing_prefix: "/r/c/".into(),
            pools: vec![
                PoolConfig {
                    name: "a".into(),
                    servers: vec!["127.0.0.1:11211".into()],
                    selector: SelectorKind::Hash,
                },
                PoolConfig {
                    name: "b".into(),
                    servers: vec!["127.0.0.1:11212".into(), "127.0.0.1:11213".into()],
                    selector: SelectorKind::RoundRobin,
                },
            ],
            route: RouteConfig::Failover {
                children: vec![
                    RouteConfig::Pool { pool: "a".into() },
                    RouteConfig::Pool { pool: "b".into() },
                ],
            },
            operations: crate::config::OperationRoutes {
                set: Some(RouteConfig::AllSync {
                    children: vec![RouteConfig::Pool { pool: "a".into() }],
                }),
                ..Default::default()
            },
            health: Default::default(),
        }
    }

    #[test]
    fn builds_route_per_operation() {
        let stats = ProxyStats::new();
        let snapshot = RoutingSnapshot::build(&config(), &stats, Arc::new(MemoryTransport::new()), 1).unwrap();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.route.get.name(), "failover");
        assert_eq!(snapshot.route.set.name(), "all_sync");
        assert_eq!(snapshot.route.delete.name(), "failover");
        assert_eq!(snapshot.pools().len(), 2);
        assert_eq!(snapshot.pool("b").unwrap().destinations().len(), 2);
    }

    #[test]
    fn stat_indexes_survive_rebuilds() {
        let stats = ProxyStats::new();
        let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
        let first = RoutingSnapshot::build(&config(), &stats, Arc::clone(&transport), 1).unwrap();

        let mut reordered = config();
        reordered.pools.reverse();
        let second = RoutingSnapshot::build(&reordered, &stats, transport, 2).unwrap();

        for name in ["a", "b"] {
            assert_eq!(
                first.pool(name).unwrap().stat_index(),
                second.pool(name).unwrap().stat_index()
            );
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut bad = config();
        bad.route = RouteConfig::Pool { pool: "zzz".into() };
        let err = RoutingSnapshot::build(&bad, &ProxyStats::new(), Arc::new(MemoryTransport::new()), 1)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
