//! Tries children in order until one returns a non-error reply.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::{fiber_local, TypedContext};
use crate::message::{Reply, Request, RequestClass};
use crate::routing::route::Route;

/// Every retry bumps the task-local failover count and is sent with the
/// `Failover` request class. Recording contexts visit every child.
#[derive(Debug)]
pub struct FailoverRoute<R: Request> {
    children: Vec<Arc<dyn Route<R>>>,
}

impl<R: Request> FailoverRoute<R> {
    pub fn new(children: Vec<Arc<dyn Route<R>>>) -> Self {
        Self { children }
    }
}

impl<R: Request> Route<R> for FailoverRoute<R> {
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply> {
        Box::pin(async move {
            let mut children = self.children.iter();
            let Some(first) = children.next() else {
                return request.default_reply();
            };

            let mut reply = first.route(request, ctx).await;
            for child in children {
                if !ctx.is_recording() && !reply.result().is_error() {
                    break;
                }
                fiber_local::increment_failover_count();
                let locals = fiber_local::snapshot().with_request_class(RequestClass::Failover);
                tracing::debug!(
                    context_id = %ctx.id(),
                    failed_result = %reply.result(),
                    failover_count = fiber_local::failover_count(),
                    next = child.name(),
                    "Failing over"
                );
                reply = fiber_local::scope(locals, child.route(request, ctx)).await;
            }
            reply
        })
    }

    fn name(&self) -> &'static str {
        "failover"
    }
}
