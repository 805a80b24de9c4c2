//! Replies immediately and runs every child in the background.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::{fiber_local, TypedContext};
use crate::logging::RequestLoggerContextFlags;
use crate::message::Request;
use crate::routing::route::Route;

/// Each background branch owns a handle to the context, so the context
/// outlives the reply until every branch is done.
#[derive(Debug)]
pub struct AllAsyncRoute<R: Request> {
    children: Vec<Arc<dyn Route<R>>>,
}

impl<R: Request> AllAsyncRoute<R> {
    pub fn new(children: Vec<Arc<dyn Route<R>>>) -> Self {
        Self { children }
    }
}

impl<R: Request> Route<R> for AllAsyncRoute<R> {
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply> {
        Box::pin(async move {
            for child in &self.children {
                let child = Arc::clone(child);
                let ctx = Arc::clone(ctx);
                let request = request.clone();
                let locals =
                    fiber_local::snapshot().with_log_flags(RequestLoggerContextFlags::BACKGROUND);
                tokio::spawn(fiber_local::scope(locals, async move {
                    child.route(&request, &ctx).await;
                }));
            }
            request.default_reply()
        })
    }

    fn name(&self) -> &'static str {
        "all_async"
    }
}
