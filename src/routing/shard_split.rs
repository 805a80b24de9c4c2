//! Spreads hot keys over several sub-keys.

use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};

use crate::context::{fiber_local, TypedContext};
use crate::logging::RequestLoggerContextFlags;
use crate::message::{Request, RequestClass};
use crate::routing::route::{worst_reply, Route};

/// Shard-split metadata for a route.
///
/// Shard 0 is the original key; shard `i > 0` appends `:ss{i}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSplitter {
    shards: usize,
}

impl ShardSplitter {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    pub fn shard_key(&self, key: &str, shard: usize) -> String {
        if shard == 0 {
            key.to_string()
        } else {
            format!("{}:ss{}", key, shard)
        }
    }
}

/// Reads go to one randomly chosen shard; updates go to every shard and
/// return the worst reply.
#[derive(Debug)]
pub struct ShardSplitRoute<R: Request> {
    splitter: ShardSplitter,
    child: Arc<dyn Route<R>>,
}

impl<R: Request> ShardSplitRoute<R> {
    pub fn new(splitter: ShardSplitter, child: Arc<dyn Route<R>>) -> Self {
        Self { splitter, child }
    }
}

impl<R: Request> Route<R> for ShardSplitRoute<R> {
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply> {
        Box::pin(async move {
            let is_shadow = fiber_local::request_class() == RequestClass::Shadow;
            ctx.record_shard_split(&self.splitter, is_shadow);

            let shards = self.splitter.shard_count();
            if shards == 1 {
                return self.child.route(request, ctx).await;
            }

            if R::OPERATION.is_read() {
                let shard = fastrand::usize(..shards);
                let sub = request.with_key(self.splitter.shard_key(request.key(), shard));
                let locals =
                    fiber_local::snapshot().with_log_flags(RequestLoggerContextFlags::SHARD_SPLIT);
                return fiber_local::scope(locals, self.child.route(&sub, ctx)).await;
            }

            let subs: Vec<R> = (0..shards)
                .map(|shard| request.with_key(self.splitter.shard_key(request.key(), shard)))
                .collect();
            let branches = subs.iter().map(|sub| {
                let locals =
                    fiber_local::snapshot().with_log_flags(RequestLoggerContextFlags::SHARD_SPLIT);
                fiber_local::scope(locals, self.child.route(sub, ctx))
            });
            let replies = join_all(branches).await;
            worst_reply(replies).unwrap_or_else(|| request.default_reply())
        })
    }

    fn name(&self) -> &'static str {
        "shard_split"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_keys() {
        let splitter = ShardSplitter::new(3);
        assert_eq!(splitter.shard_key("user:1", 0), "user:1");
        assert_eq!(splitter.shard_key("user:1", 2), "user:1:ss2");
        assert_eq!(ShardSplitter::new(0).shard_count(), 1);
    }
}
