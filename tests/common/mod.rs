//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cache_proxy::config::{HealthConfig, OperationRoutes, PoolConfig, RouteConfig, RoutingConfig, SelectorKind};
use cache_proxy::logging::{AdditionalLogger, ReplyView, RequestLoggerContext, RequestLoggerContextFlags, RequestView};
use cache_proxy::message::{Operation, RequestClass, ResultCode};
use cache_proxy::proxy::Proxy;
use cache_proxy::transport::MemoryTransport;

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn pool(name: &str, ports: &[u16]) -> PoolConfig {
    PoolConfig {
        name: name.to_string(),
        servers: ports.iter().map(|p| addr(*p).to_string()).collect(),
        selector: SelectorKind::Hash,
    }
}

pub fn pool_route(name: &str) -> RouteConfig {
    RouteConfig::Pool {
        pool: name.to_string(),
    }
}

pub fn routing(pools: Vec<PoolConfig>, route: RouteConfig) -> RoutingConfig {
    RoutingConfig {
        routing_prefix: "/test/cluster/".to_string(),
        pools,
        route,
        operations: OperationRoutes::default(),
        health: HealthConfig::default(),
    }
}

/// One reply seen by [`CapturingLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedReply {
    pub operation: Operation,
    pub key: String,
    pub pool: String,
    pub destination: SocketAddr,
    pub result: ResultCode,
    pub request_class: RequestClass,
    pub flags: RequestLoggerContextFlags,
    pub failover_count: u32,
    pub duration_us: i64,
}

/// Additional logger that keeps every record in memory.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    before_sent: Mutex<Vec<String>>,
    replies: Mutex<Vec<LoggedReply>>,
}

impl CapturingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replies(&self) -> Vec<LoggedReply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn before_sent(&self) -> Vec<String> {
        self.before_sent.lock().unwrap().clone()
    }
}

impl AdditionalLogger for CapturingLogger {
    fn log_before_request_sent(&self, request: &RequestView<'_>, _ctx: &RequestLoggerContext<'_>) {
        self.before_sent.lock().unwrap().push(request.key.to_string());
    }

    fn log(&self, request: &RequestView<'_>, reply: &ReplyView<'_>, ctx: &RequestLoggerContext<'_>) {
        self.replies.lock().unwrap().push(LoggedReply {
            operation: request.operation,
            key: request.key.to_string(),
            pool: ctx.pool_name.to_string(),
            destination: ctx.destination,
            result: reply.result,
            request_class: ctx.request_class,
            flags: ctx.flags,
            failover_count: ctx.failover_count,
            duration_us: ctx.duration_us(),
        });
    }

    fn may_log(&self, _: u32, _: RequestClass, result: ResultCode, _: i64) -> bool {
        result.is_error()
    }
}

/// A proxy over an in-memory transport, logging into a [`CapturingLogger`].
pub fn proxy(config: &RoutingConfig) -> (Arc<Proxy>, MemoryTransport, Arc<CapturingLogger>) {
    let transport = MemoryTransport::new();
    let logger = CapturingLogger::new();
    let proxy = Proxy::with_additional_logger(
        config,
        Arc::new(transport.clone()),
        Arc::clone(&logger) as Arc<dyn AdditionalLogger>,
    )
    .unwrap();
    (proxy, transport, logger)
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
