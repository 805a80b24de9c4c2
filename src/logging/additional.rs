//! Pluggable secondary request logging.
//!
//! # Responsibilities
//! - Define the [`AdditionalLogger`] hook the proxy is built with
//! - Provide a no-op default
//! - Provide a deterministic tail sampler writing request records to tracing
//!
//! # Design Decisions
//! - `may_log` is pure: the same hash, class, result and duration always give
//!   the same answer, so callers can skip building expensive log payloads
//! - Sampling: `hash % 10000 < rate * 10000`; errors use their own rate, slow
//!   requests are always kept

use std::fmt;

use crate::config::SamplingConfig;
use crate::logging::logger_context::{ReplyView, RequestLoggerContext, RequestView};
use crate::message::{RequestClass, ResultCode};

/// Tracing target for sampled request records.
pub const REQUEST_LOG_TARGET: &str = "cache_proxy::requests";

/// Secondary logger injected into the proxy.
///
/// Implementations must not block and must not panic.
pub trait AdditionalLogger: Send + Sync + fmt::Debug {
    /// Called before each physical send.
    fn log_before_request_sent(&self, request: &RequestView<'_>, ctx: &RequestLoggerContext<'_>) {
        let _ = (request, ctx);
    }

    /// Called after each physical reply.
    fn log(&self, request: &RequestView<'_>, reply: &ReplyView<'_>, ctx: &RequestLoggerContext<'_>) {
        let _ = (request, reply, ctx);
    }

    /// Whether a request with these properties would be logged.
    fn may_log(
        &self,
        routing_key_hash: u32,
        request_class: RequestClass,
        result: ResultCode,
        duration_us: i64,
    ) -> bool;
}

/// Logs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdditionalLogger;

impl AdditionalLogger for NoopAdditionalLogger {
    fn may_log(&self, _: u32, _: RequestClass, _: ResultCode, _: i64) -> bool {
        false
    }
}

/// Emits a sampled subset of replies as `info` events on
/// [`REQUEST_LOG_TARGET`].
#[derive(Debug, Clone)]
pub struct SampledAdditionalLogger {
    config: SamplingConfig,
}

impl SampledAdditionalLogger {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    fn sample_at_rate(hash: u32, rate: f64) -> bool {
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        let threshold = (rate * 10000.0) as u32;
        hash % 10000 < threshold
    }
}

impl AdditionalLogger for SampledAdditionalLogger {
    fn log_before_request_sent(&self, request: &RequestView<'_>, ctx: &RequestLoggerContext<'_>) {
        tracing::trace!(
            target: REQUEST_LOG_TARGET,
            operation = %request.operation,
            key = request.key,
            pool = ctx.pool_name,
            destination = %ctx.destination,
            class = ctx.request_class.as_str(),
            "Sending request"
        );
    }

    fn log(&self, request: &RequestView<'_>, reply: &ReplyView<'_>, ctx: &RequestLoggerContext<'_>) {
        let duration_us = ctx.duration_us();
        if !self.may_log(request.routing_key_hash, ctx.request_class, reply.result, duration_us) {
            return;
        }

        let extra = ctx.extra_data();
        tracing::info!(
            target: REQUEST_LOG_TARGET,
            operation = %request.operation,
            key = request.key,
            pool = ctx.pool_name,
            destination = %ctx.destination,
            routing_prefix = ctx.stripped_routing_prefix,
            class = ctx.request_class.as_str(),
            result = %reply.result,
            message = reply.message.unwrap_or(""),
            duration_us,
            network_us = ctx.network_transport_time_us,
            request_bytes = ctx.rpc_stats.request_body_size,
            reply_bytes = ctx.rpc_stats.reply_body_size,
            server_load = ctx.rpc_stats.server_load,
            failover_count = ctx.failover_count,
            flags = ctx.flags.bits(),
            extra = ?extra,
            "Request completed"
        );
    }

    fn may_log(
        &self,
        routing_key_hash: u32,
        request_class: RequestClass,
        result: ResultCode,
        duration_us: i64,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }
        if result.is_error() {
            return Self::sample_at_rate(routing_key_hash, self.config.error_rate);
        }
        if self.config.slow_threshold_us > 0 && duration_us >= self.config.slow_threshold_us {
            return true;
        }
        let rate = if request_class.is_normal() {
            self.config.sample_rate
        } else {
            self.config.failover_rate
        };
        Self::sample_at_rate(routing_key_hash, rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(sample_rate: f64) -> SampledAdditionalLogger {
        SampledAdditionalLogger::new(SamplingConfig {
            enabled: true,
            sample_rate,
            error_rate: 1.0,
            failover_rate: 1.0,
            slow_threshold_us: 50_000,
        })
    }

    #[test]
    fn noop_never_logs() {
        assert!(!NoopAdditionalLogger.may_log(0, RequestClass::Normal, ResultCode::Timeout, 1_000_000));
    }

    #[test]
    fn disabled_sampler_never_logs() {
        let logger = SampledAdditionalLogger::new(SamplingConfig {
            enabled: false,
            ..sampler(1.0).config
        });
        assert!(!logger.may_log(1, RequestClass::Normal, ResultCode::Found, 10));
    }

    #[test]
    fn errors_and_slow_requests_are_kept() {
        let logger = sampler(0.0);
        assert!(logger.may_log(1234, RequestClass::Normal, ResultCode::Timeout, 10));
        assert!(logger.may_log(1234, RequestClass::Normal, ResultCode::Found, 50_000));
        assert!(!logger.may_log(1234, RequestClass::Normal, ResultCode::Found, 49_999));
    }

    #[test]
    fn sampling_is_deterministic_by_hash() {
        let logger = sampler(0.1);
        // threshold is 1000 out of 10000
        assert!(logger.may_log(999, RequestClass::Normal, ResultCode::Found, 10));
        assert!(!logger.may_log(1000, RequestClass::Normal, ResultCode::Found, 10));
        assert!(logger.may_log(10_500, RequestClass::Normal, ResultCode::Found, 10));
        for hash in [0u32, 7, 4242, u32::MAX] {
            let first = logger.may_log(hash, RequestClass::Normal, ResultCode::Found, 10);
            let second = logger.may_log(hash, RequestClass::Normal, ResultCode::Found, 10);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn failover_traffic_uses_its_own_rate() {
        let logger = SampledAdditionalLogger::new(SamplingConfig {
            enabled: true,
            sample_rate: 0.0,
            error_rate: 0.0,
            failover_rate: 1.0,
            slow_threshold_us: 0,
        });
        assert!(!logger.may_log(5, RequestClass::Normal, ResultCode::Found, 10));
        assert!(logger.may_log(5, RequestClass::Failover, ResultCode::Found, 10));
    }
}
