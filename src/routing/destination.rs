//! Leaf route: the only place a request leaves the proxy.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::{fiber_local, ReplyTiming, SendTarget, TypedContext};
use crate::logging::RpcStatsContext;
use crate::message::{Reply, Request, ResultCode};
use crate::pool::{Destination, Pool};
use crate::routing::route::Route;
use crate::stats::now_us;
use crate::transport::Transport;

/// Sends to one destination of a pool.
///
/// Recording contexts never reach the transport: the client callback is
/// invoked and the request's default reply returned. TKO destinations fail
/// fast unless a probe is due.
#[derive(Debug)]
pub struct DestinationRoute {
    pool: Arc<Pool>,
    destination: Arc<Destination>,
    transport: Arc<dyn Transport>,
    routing_prefix: Arc<str>,
}

impl DestinationRoute {
    pub fn new(
        pool: Arc<Pool>,
        destination: Arc<Destination>,
        transport: Arc<dyn Transport>,
        routing_prefix: Arc<str>,
    ) -> Self {
        Self {
            pool,
            destination,
            transport,
            routing_prefix,
        }
    }

    async fn send<R: Request>(&self, request: &R, ctx: &TypedContext<R>) -> R::Reply {
        let addr = self.destination.addr;
        if !self.destination.is_healthy() && !self.destination.try_probe() {
            return R::Reply::from_result(ResultCode::Tko, format!("destination {} is TKO", addr));
        }

        let target = SendTarget {
            pool_name: self.pool.name(),
            destination: addr,
            stripped_routing_prefix: &self.routing_prefix,
            request_class: fiber_local::request_class(),
            flags: fiber_local::log_flags(),
        };

        let start_time_us = now_us();
        ctx.on_before_request_sent(&target, request, start_time_us);

        let result = {
            let _in_flight = self.destination.in_flight_guard();
            self.transport.send(addr, request.to_wire()).await
        };
        let end_time_us = now_us();

        let (reply, rpc_stats, network_transport_time_us) = match result {
            Ok(wire) => {
                self.destination.mark_success();
                let rpc_stats = wire.rpc_stats;
                let network = wire.network_transport_time_us;
                (R::Reply::from_wire(wire), rpc_stats, network)
            }
            Err(e) => {
                self.destination.mark_failure();
                tracing::debug!(
                    context_id = %ctx.id(),
                    pool = self.pool.name(),
                    destination = %addr,
                    error = %e,
                    "Send failed"
                );
                (
                    R::Reply::from_result(e.result_code(), e.to_string()),
                    RpcStatsContext::default(),
                    0,
                )
            }
        };

        ctx.on_reply_received(
            &target,
            request,
            &reply,
            &ReplyTiming {
                start_time_us,
                end_time_us,
                pool_stat_index: Some(self.pool.stat_index()),
                rpc_stats,
                network_transport_time_us,
                extra_data_callbacks: &[],
            },
        );
        reply
    }
}

impl<R: Request> Route<R> for DestinationRoute {
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply> {
        Box::pin(async move {
            if ctx.record_send(self.pool.name(), &self.destination) {
                return request.default_reply();
            }
            self.send(request, ctx).await
        })
    }

    fn name(&self) -> &'static str {
        "destination"
    }
}
