//! Sends to every child concurrently on the calling task and returns the
//! worst reply.

use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};

use crate::context::{fiber_local, TypedContext};
use crate::message::Request;
use crate::routing::route::{worst_reply, Route};

#[derive(Debug)]
pub struct AllSyncRoute<R: Request> {
    children: Vec<Arc<dyn Route<R>>>,
}

impl<R: Request> AllSyncRoute<R> {
    pub fn new(children: Vec<Arc<dyn Route<R>>>) -> Self {
        Self { children }
    }
}

impl<R: Request> Route<R> for AllSyncRoute<R> {
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply> {
        Box::pin(async move {
            // Each branch gets its own copy of the task-local state.
            let branches = self
                .children
                .iter()
                .map(|child| fiber_local::scope(fiber_local::snapshot(), child.route(request, ctx)));
            let replies = join_all(branches).await;
            worst_reply(replies).unwrap_or_else(|| request.default_reply())
        })
    }

    fn name(&self) -> &'static str {
        "all_sync"
    }
}
