//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems from a validated configuration
//! - Pick the additional logger from the sampling settings
//! - Start the metrics exporter when enabled
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::logging::{AdditionalLogger, NoopAdditionalLogger, SampledAdditionalLogger};
use crate::observability::metrics;
use crate::proxy::Proxy;
use crate::transport::Transport;

/// Additional logger selected by `config.logging`.
pub fn additional_logger(config: &ProxyConfig) -> Arc<dyn AdditionalLogger> {
    if config.logging.enabled {
        Arc::new(SampledAdditionalLogger::new(config.logging.clone()))
    } else {
        Arc::new(NoopAdditionalLogger)
    }
}

/// Build the proxy and start the metrics exporter.
pub fn start(config: &ProxyConfig, transport: Arc<dyn Transport>) -> Result<Arc<Proxy>, ConfigError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidBindAddress {
                field: "observability.metrics_address",
                value: config.observability.metrics_address.clone(),
            }])
        })?;
        metrics::init_metrics(addr);
    }

    let proxy = Proxy::with_additional_logger(&config.routing, transport, additional_logger(config))?;
    tracing::info!(
        generation = proxy.generation(),
        sampled_logging = config.logging.enabled,
        "Proxy started"
    );
    Ok(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{RequestClass, ResultCode};
    use crate::transport::MemoryTransport;

    #[test]
    fn logger_follows_sampling_config() {
        let mut config = ProxyConfig::default();
        config.logging.slow_threshold_us = 1;
        assert!(!additional_logger(&config).may_log(0, RequestClass::Normal, ResultCode::Found, 10));

        config.logging.enabled = true;
        assert!(additional_logger(&config).may_log(0, RequestClass::Normal, ResultCode::Found, 10));
    }

    #[tokio::test]
    async fn starts_without_metrics() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_enabled = false;
        let proxy = start(&config, Arc::new(MemoryTransport::new())).unwrap();
        assert_eq!(proxy.generation(), 1);
    }
}
