//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing pools)
//! - Validate value ranges (thresholds > 0, sample rates in [0, 1])
//! - Detect duplicate pool names and unparsable addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, RouteConfig, RoutingConfig, SamplingConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("pool '{0}' is defined more than once")]
    DuplicatePool(String),

    #[error("pool '{0}' has no servers")]
    EmptyPool(String),

    #[error("pool '{pool}' has invalid server address '{address}'")]
    InvalidAddress { pool: String, address: String },

    #[error("route '{route}' references unknown pool '{pool}'")]
    UnknownPool { route: String, pool: String },

    #[error("{0} route has no children")]
    EmptyRoute(String),

    #[error("shard_split route must have at least one shard")]
    ZeroShards,

    #[error("{field} must be greater than zero")]
    ZeroThreshold { field: &'static str },

    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    RateOutOfRange { field: &'static str, value: String },

    #[error("invalid {field} address '{value}'")]
    InvalidBindAddress { field: &'static str, value: String },
}

/// Validate a whole configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = routing_errors(&config.routing);
    errors.extend(sampling_errors(&config.logging));

    if config.observability.metrics_enabled {
        check_bind_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }
    if config.admin.enabled {
        check_bind_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate only the routing section. This is what a routing snapshot build
/// checks before touching any pool.
pub fn validate_routing(routing: &RoutingConfig) -> Result<(), Vec<ValidationError>> {
    let errors = routing_errors(routing);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn routing_errors(routing: &RoutingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for pool in &routing.pools {
        if !names.insert(pool.name.as_str()) {
            errors.push(ValidationError::DuplicatePool(pool.name.clone()));
        }
        if pool.servers.is_empty() {
            errors.push(ValidationError::EmptyPool(pool.name.clone()));
        }
        for server in &pool.servers {
            if server.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::InvalidAddress {
                    pool: pool.name.clone(),
                    address: server.clone(),
                });
            }
        }
    }

    check_route(&routing.route, &names, &mut errors);
    let overrides = [
        &routing.operations.get,
        &routing.operations.set,
        &routing.operations.delete,
    ];
    for route in overrides.into_iter().flatten() {
        check_route(route, &names, &mut errors);
    }

    if routing.health.unhealthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold {
            field: "routing.health.unhealthy_threshold",
        });
    }
    if routing.health.healthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold {
            field: "routing.health.healthy_threshold",
        });
    }

    errors
}

fn check_route(route: &RouteConfig, pools: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    match route {
        RouteConfig::Pool { pool } => {
            if !pools.contains(pool.as_str()) {
                errors.push(ValidationError::UnknownPool {
                    route: "pool".to_string(),
                    pool: pool.clone(),
                });
            }
        }
        RouteConfig::AllSync { children } => check_children("all_sync", children, pools, errors),
        RouteConfig::AllAsync { children } => check_children("all_async", children, pools, errors),
        RouteConfig::Failover { children } => check_children("failover", children, pools, errors),
        RouteConfig::ShardSplit { shards, child } => {
            if *shards == 0 {
                errors.push(ValidationError::ZeroShards);
            }
            check_route(child, pools, errors);
        }
    }
}

fn check_children(
    kind: &str,
    children: &[RouteConfig],
    pools: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    if children.is_empty() {
        errors.push(ValidationError::EmptyRoute(kind.to_string()));
    }
    for child in children {
        check_route(child, pools, errors);
    }
}

fn sampling_errors(sampling: &SamplingConfig) -> Vec<ValidationError> {
    let rates = [
        ("logging.sample_rate", sampling.sample_rate),
        ("logging.error_rate", sampling.error_rate),
        ("logging.failover_rate", sampling.failover_rate),
    ];
    rates
        .into_iter()
        .filter(|(_, value)| !(0.0..=1.0).contains(value))
        .map(|(field, value)| ValidationError::RateOutOfRange {
            field,
            value: value.to_string(),
        })
        .collect()
}

fn check_bind_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PoolConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = ProxyConfig::default();
        config.routing.pools.push(PoolConfig {
            name: "default".into(),
            servers: vec![],
            selector: Default::default(),
        });
        config.routing.pools.push(PoolConfig {
            name: "bad".into(),
            servers: vec!["localhost".into()],
            selector: Default::default(),
        });
        config.routing.route = RouteConfig::Failover {
            children: vec![
                RouteConfig::Pool { pool: "missing".into() },
                RouteConfig::AllSync { children: vec![] },
                RouteConfig::ShardSplit {
                    shards: 0,
                    child: Box::new(RouteConfig::Pool { pool: "default".into() }),
                },
            ],
        };
        config.logging.sample_rate = 1.5;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePool("default".into())));
        assert!(errors.contains(&ValidationError::EmptyPool("default".into())));
        assert!(errors.contains(&ValidationError::InvalidAddress {
            pool: "bad".into(),
            address: "localhost".into(),
        }));
        assert!(errors.contains(&ValidationError::UnknownPool {
            route: "pool".into(),
            pool: "missing".into(),
        }));
        assert!(errors.contains(&ValidationError::EmptyRoute("all_sync".into())));
        assert!(errors.contains(&ValidationError::ZeroShards));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RateOutOfRange { field: "logging.sample_rate", .. })));
        assert_eq!(errors.len(), 7);
    }

    #[test]
    fn operation_overrides_are_checked() {
        let mut config = ProxyConfig::default();
        config.routing.operations.delete = Some(RouteConfig::Pool { pool: "nope".into() });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn bind_addresses_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.admin.bind_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidBindAddress {
                field: "admin.bind_address",
                value: "nowhere".into(),
            }]
        );
    }
}
