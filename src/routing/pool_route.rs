//! Pool route: picks a destination and attributes the request to the pool.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::TypedContext;
use crate::message::{Reply, Request, ResultCode};
use crate::pool::Pool;
use crate::routing::destination::DestinationRoute;
use crate::routing::route::Route;
use crate::transport::Transport;

#[derive(Debug)]
pub struct PoolRoute {
    pool: Arc<Pool>,
    transport: Arc<dyn Transport>,
    routing_prefix: Arc<str>,
}

impl PoolRoute {
    pub fn new(pool: Arc<Pool>, transport: Arc<dyn Transport>, routing_prefix: Arc<str>) -> Self {
        Self {
            pool,
            transport,
            routing_prefix,
        }
    }
}

impl<R: Request> Route<R> for PoolRoute {
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply> {
        Box::pin(async move {
            if !ctx.is_recording() {
                ctx.set_pool_stat_index(self.pool.stat_index());
            }

            let Some(destination) = self.pool.select(request.routing_key_hash()) else {
                return R::Reply::from_result(
                    ResultCode::Tko,
                    format!("no destination available in pool {}", self.pool.name()),
                );
            };

            let leaf = DestinationRoute::new(
                Arc::clone(&self.pool),
                destination,
                Arc::clone(&self.transport),
                Arc::clone(&self.routing_prefix),
            );
            Route::<R>::route(&leaf, request, ctx).await
        })
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}
