//! The route abstraction every routing node implements.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::TypedContext;
use crate::message::{
    DeleteRequest, GetRequest, Reply, Request, SetRequest,
};

/// A node of the routing tree for requests of type `R`.
///
/// Routes are immutable and shared by every request routed through the
/// snapshot that owns them. Per-request state lives on the context.
pub trait Route<R: Request>: Send + Sync + fmt::Debug {
    /// Route `request` and produce its reply. `request` may differ from the
    /// context's original request when a parent rewrote the key.
    fn route<'a>(&'a self, request: &'a R, ctx: &'a Arc<TypedContext<R>>) -> BoxFuture<'a, R::Reply>;

    fn name(&self) -> &'static str;
}

/// Root routes of a snapshot, one per request type.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    pub get: Arc<dyn Route<GetRequest>>,
    pub set: Arc<dyn Route<SetRequest>>,
    pub delete: Arc<dyn Route<DeleteRequest>>,
}

/// A request type the proxy can route.
pub trait Routable: Request {
    /// Root route for this request type.
    fn root(route: &ProxyRoute) -> &Arc<dyn Route<Self>>;
}

impl Routable for GetRequest {
    fn root(route: &ProxyRoute) -> &Arc<dyn Route<Self>> {
        &route.get
    }
}

impl Routable for SetRequest {
    fn root(route: &ProxyRoute) -> &Arc<dyn Route<Self>> {
        &route.set
    }
}

impl Routable for DeleteRequest {
    fn root(route: &ProxyRoute) -> &Arc<dyn Route<Self>> {
        &route.delete
    }
}

/// The most severe of `replies`; the first one wins ties.
pub(crate) fn worst_reply<Rep: Reply>(replies: impl IntoIterator<Item = Rep>) -> Option<Rep> {
    replies.into_iter().reduce(|worst, reply| {
        if reply.result().severity() > worst.result().severity() {
            reply
        } else {
            worst
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ResultCode, SetReply};

    #[test]
    fn worst_reply_prefers_errors_then_first() {
        let replies = vec![
            SetReply::from_result(ResultCode::Stored, "a"),
            SetReply::from_result(ResultCode::Timeout, "b"),
            SetReply::from_result(ResultCode::Stored, "c"),
        ];
        assert_eq!(worst_reply(replies).unwrap().result(), ResultCode::Timeout);

        let replies = vec![
            SetReply::from_result(ResultCode::Stored, "first"),
            SetReply::from_result(ResultCode::Stored, "second"),
        ];
        assert_eq!(worst_reply(replies).unwrap().message(), Some("first"));
        assert!(worst_reply(Vec::<SetReply>::new()).is_none());
    }
}
