//! Primary per-context request logger.

use std::sync::Arc;

use uuid::Uuid;

use crate::logging::logger_context::{RequestLoggerContext, RequestLoggerContextFlags};
use crate::message::Request;
use crate::observability::metrics;
use crate::stats::ProxyStats;

/// Logs every reply received on behalf of one request context.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    stats: Arc<ProxyStats>,
    context_id: Uuid,
}

impl RequestLogger {
    pub fn new(stats: Arc<ProxyStats>, context_id: Uuid) -> Self {
        Self { stats, context_id }
    }

    /// Record one physical reply for request type `R`.
    pub fn log<R: Request>(&self, ctx: &RequestLoggerContext<'_>) {
        let operation = R::OPERATION;
        self.stats.record_result(operation, ctx.reply_result);
        metrics::record_reply(
            operation.as_str(),
            ctx.reply_result.as_str(),
            ctx.request_class.as_str(),
            ctx.duration_us(),
        );

        tracing::trace!(
            context_id = %self.context_id,
            operation = %operation,
            pool = ctx.pool_name,
            destination = %ctx.destination,
            result = %ctx.reply_result,
            class = ctx.request_class.as_str(),
            duration_us = ctx.duration_us(),
            network_us = ctx.network_transport_time_us,
            failover_count = ctx.failover_count,
            background = ctx.flags.contains(RequestLoggerContextFlags::BACKGROUND),
            "Reply received"
        );
    }
}
