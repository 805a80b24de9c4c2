//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the cache proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Pools and the routing tree.
    pub routing: RoutingConfig,

    /// Sampled request logging.
    pub logging: SamplingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Routing topology. Every reload builds a new routing snapshot from this.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Routing prefix served by this proxy (e.g. "/region/cluster/").
    pub routing_prefix: String,

    /// Backend pools.
    pub pools: Vec<PoolConfig>,

    /// Root route for every operation without an override.
    pub route: RouteConfig,

    /// Per-operation root route overrides.
    pub operations: OperationRoutes,

    /// Destination health tracking.
    pub health: HealthConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            routing_prefix: "/default/default/".to_string(),
            pools: vec![PoolConfig {
                name: "default".to_string(),
                servers: vec!["127.0.0.1:11211".to_string()],
                selector: SelectorKind::Hash,
            }],
            route: RouteConfig::Pool {
                pool: "default".to_string(),
            },
            operations: OperationRoutes::default(),
            health: HealthConfig::default(),
        }
    }
}

/// Optional root routes for individual operations.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OperationRoutes {
    pub get: Option<RouteConfig>,
    pub set: Option<RouteConfig>,
    pub delete: Option<RouteConfig>,
}

/// A pool of backend cache servers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PoolConfig {
    /// Unique pool name, referenced by routes.
    pub name: String,

    /// Server addresses (e.g., "127.0.0.1:11211").
    pub servers: Vec<String>,

    /// How a destination is picked within the pool.
    #[serde(default)]
    pub selector: SelectorKind,
}

/// Destination selection strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Routing key hash modulo pool size.
    #[default]
    Hash,
    RoundRobin,
}

/// A node of the routing tree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteConfig {
    /// Send to one destination of a pool.
    Pool { pool: String },

    /// Send to every child and wait; the worst reply is returned.
    AllSync { children: Vec<RouteConfig> },

    /// Reply at once; every child runs in the background.
    AllAsync { children: Vec<RouteConfig> },

    /// Try children in order until one does not return an error.
    Failover { children: Vec<RouteConfig> },

    /// Spread a key over `shards` sub-keys.
    ShardSplit { shards: usize, child: Box<RouteConfig> },
}

/// Destination health thresholds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive transport failures before a destination is marked TKO.
    pub unhealthy_threshold: usize,

    /// Consecutive successes before a destination is marked healthy.
    pub healthy_threshold: usize,

    /// Minimum time between probe sends to a TKO destination, in milliseconds.
    pub probe_interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_threshold: 3,
            healthy_threshold: 1,
            probe_interval_ms: 1_000,
        }
    }
}

/// Tail sampling for the request log.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Emit sampled request records at all.
    pub enabled: bool,

    /// Sample rate for successful normal requests (0.0-1.0).
    pub sample_rate: f64,

    /// Sample rate for error replies (0.0-1.0).
    pub error_rate: f64,

    /// Sample rate for successful failover and shadow requests (0.0-1.0).
    pub failover_rate: f64,

    /// Replies at least this slow are always logged. 0 disables the rule.
    pub slow_threshold_us: i64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_rate: 0.01,
            error_rate: 1.0,
            failover_rate: 1.0,
            slow_threshold_us: 100_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_route_tree() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [routing]
            routing_prefix = "/east/c1/"

            [[routing.pools]]
            name = "primary"
            servers = ["10.0.0.1:11211", "10.0.0.2:11211"]

            [[routing.pools]]
            name = "backup"
            servers = ["10.0.1.1:11211"]
            selector = "round_robin"

            [routing.route]
            type = "failover"

            [[routing.route.children]]
            type = "pool"
            pool = "primary"

            [[routing.route.children]]
            type = "shard_split"
            shards = 4
            child = { type = "pool", pool = "backup" }

            [routing.operations.set]
            type = "all_sync"
            children = [{ type = "pool", pool = "primary" }, { type = "pool", pool = "backup" }]

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.routing.routing_prefix, "/east/c1/");
        assert_eq!(config.routing.pools[1].selector, SelectorKind::RoundRobin);
        let RouteConfig::Failover { children } = &config.routing.route else {
            panic!("expected failover root");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(children[1], RouteConfig::ShardSplit { shards: 4, .. }));
        assert!(matches!(config.routing.operations.set, Some(RouteConfig::AllSync { .. })));
        assert!(config.routing.operations.get.is_none());
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.routing, RoutingConfig::default());
        assert_eq!(config.routing.health.unhealthy_threshold, 3);
        assert_eq!(config.admin.bind_address, "127.0.0.1:8081");
    }
}
