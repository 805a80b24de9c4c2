//! Request context bound to one request type.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::base::{
    Baton, ClientCallback, Priority, RequestContext, ShardSplitCallback,
};
use crate::context::fiber_local::{self, FiberLocals};
use crate::message::{Reply, Request, ResultCode};
use crate::proxy::Proxy;
use crate::routing::{ProxyRoute, Routable, RoutingSnapshot};

/// Delivers the reply of a request back to its client.
pub trait ReplySink<Rep>: Send + 'static {
    fn send_reply(self: Box<Self>, reply: Rep);
}

impl<Rep, F> ReplySink<Rep> for F
where
    F: FnOnce(Rep) + Send + 'static,
{
    fn send_reply(self: Box<Self>, reply: Rep) {
        (*self)(reply)
    }
}

/// Posts a baton once everything else owned by the context has been dropped.
struct DestroySignal(Option<Baton>);

impl Drop for DestroySignal {
    fn drop(&mut self) {
        if let Some(baton) = self.0.take() {
            baton.post();
        }
    }
}

/// One in-flight request of type `R`.
///
/// Built exclusively owned as a [`UniqueContext`], then shared (`Arc`) by
/// [`UniqueContext::process`]. Every routing branch holds a clone of the
/// `Arc`; the last one to drop it destroys the context.
pub struct TypedContext<R: Request> {
    base: RequestContext,
    config: Option<Arc<RoutingSnapshot>>,
    request: Mutex<Option<Arc<R>>>,
    reply_sink: Mutex<Option<Box<dyn ReplySink<R::Reply>>>>,
    replied: AtomicBool,
    // Must stay last so the baton is posted after all other fields drop.
    destroy_signal: DestroySignal,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R: Request> TypedContext<R> {
    /// A normal context whose reply goes to `sink`.
    pub fn new(
        proxy: Arc<Proxy>,
        request: R,
        priority: Priority,
        sink: impl ReplySink<R::Reply>,
    ) -> UniqueContext<R> {
        UniqueContext(Box::new(Self {
            base: RequestContext::new(proxy, priority),
            config: None,
            request: Mutex::new(Some(Arc::new(request))),
            reply_sink: Mutex::new(Some(Box::new(sink))),
            replied: AtomicBool::new(false),
            destroy_signal: DestroySignal(None),
        }))
    }

    /// A recording context: routing runs against it but nothing is sent.
    /// `client_callback` is called wherever a send would happen and
    /// `shard_split_callback` wherever shard-split metadata is consulted.
    pub fn recording(
        proxy: Arc<Proxy>,
        request: R,
        client_callback: Option<ClientCallback>,
        shard_split_callback: Option<ShardSplitCallback>,
    ) -> Arc<Self> {
        Arc::new(Self::build_recording(
            proxy,
            request,
            client_callback,
            shard_split_callback,
            None,
        ))
    }

    /// Like [`TypedContext::recording`], and posts `baton` once the context
    /// is fully destroyed.
    pub fn recording_notify(
        proxy: Arc<Proxy>,
        request: R,
        baton: Baton,
        client_callback: Option<ClientCallback>,
        shard_split_callback: Option<ShardSplitCallback>,
    ) -> Arc<Self> {
        Arc::new(Self::build_recording(
            proxy,
            request,
            client_callback,
            shard_split_callback,
            Some(baton),
        ))
    }

    fn build_recording(
        proxy: Arc<Proxy>,
        request: R,
        client_callback: Option<ClientCallback>,
        shard_split_callback: Option<ShardSplitCallback>,
        baton: Option<Baton>,
    ) -> Self {
        Self {
            base: RequestContext::new_recording(proxy, client_callback, shard_split_callback),
            config: None,
            request: Mutex::new(Some(Arc::new(request))),
            reply_sink: Mutex::new(None),
            replied: AtomicBool::new(false),
            destroy_signal: DestroySignal(baton),
        }
    }

    /// Post `baton` once this context is fully destroyed.
    pub fn set_destroy_baton(&mut self, baton: Baton) {
        self.destroy_signal.0 = Some(baton);
    }

    /// The request, until a reply has been sent.
    pub fn request(&self) -> Option<Arc<R>> {
        lock(&self.request).clone()
    }

    pub fn replied(&self) -> bool {
        self.replied.load(Ordering::Acquire)
    }

    /// Deliver the reply. Records the final result and releases the request.
    ///
    /// # Panics
    ///
    /// In debug builds, if a reply was already sent. Release builds log the
    /// second reply and drop it.
    pub fn send_reply(&self, reply: R::Reply) {
        let already_replied = self.replied.swap(true, Ordering::AcqRel);
        debug_assert!(!already_replied, "reply already sent for context {}", self.id());
        if already_replied {
            tracing::error!(
                context_id = %self.id(),
                result = %reply.result(),
                "Reply already sent, dropping second reply"
            );
            return;
        }

        self.set_final_result(reply.result());
        let sink = lock(&self.reply_sink).take();
        *lock(&self.request) = None;
        if let Some(sink) = sink {
            sink.send_reply(reply);
        }
    }

    /// Deliver a reply carrying only `result` and `message`.
    ///
    /// This never builds a value reply; construct those explicitly and pass
    /// them to [`TypedContext::send_reply`].
    pub fn send_reply_with(&self, result: ResultCode, message: impl Into<String>) {
        self.send_reply(R::Reply::from_result(result, message));
    }

    /// Routing snapshot pinned by [`UniqueContext::process`].
    ///
    /// # Panics
    ///
    /// If the context has not been processed. Recording contexts never are.
    pub fn proxy_config(&self) -> &Arc<RoutingSnapshot> {
        debug_assert!(!self.is_recording(), "proxy_config() called on a recording context");
        match &self.config {
            Some(config) => config,
            None => panic!("proxy_config() called on context {} before process()", self.id()),
        }
    }

    /// Root routes of the pinned snapshot.
    pub fn proxy_route(&self) -> &ProxyRoute {
        &self.proxy_config().route
    }
}

/// Exclusively owned context, before routing starts.
///
/// Configuration that needs `&mut` access (completion callback, destroy
/// baton) happens here. [`UniqueContext::process`] is the only way to turn it
/// into a shared handle.
pub struct UniqueContext<R: Request>(Box<TypedContext<R>>);

impl<R: Routable> UniqueContext<R> {
    /// Pin `config`, share the context and start routing it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn process(self, config: Arc<RoutingSnapshot>) -> Arc<TypedContext<R>> {
        let mut ctx = self.0;
        ctx.config = Some(config);
        let shared: Arc<TypedContext<R>> = Arc::from(ctx);
        shared.start_processing();
        shared
    }
}

impl<R: Request> Deref for UniqueContext<R> {
    type Target = TypedContext<R>;

    fn deref(&self) -> &TypedContext<R> {
        &self.0
    }
}

impl<R: Request> DerefMut for UniqueContext<R> {
    fn deref_mut(&mut self) -> &mut TypedContext<R> {
        &mut self.0
    }
}

impl<R: Request> fmt::Debug for UniqueContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniqueContext").field(&self.0).finish()
    }
}

impl<R: Routable> TypedContext<R> {
    fn start_processing(self: &Arc<Self>) {
        let ctx = Arc::clone(self);
        let Some(request) = ctx.request() else {
            return;
        };

        tokio::spawn(fiber_local::scope(FiberLocals::new(), async move {
            let route = Arc::clone(R::root(ctx.proxy_route()));
            tracing::debug!(
                context_id = %ctx.id(),
                operation = %R::OPERATION,
                route = route.name(),
                generation = ctx.proxy_config().generation,
                "Routing request"
            );
            let reply = route.route(&request, &ctx).await;
            ctx.send_reply(reply);
        }));
    }
}

impl<R: Request> Deref for TypedContext<R> {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &self.base
    }
}

impl<R: Request> DerefMut for TypedContext<R> {
    fn deref_mut(&mut self) -> &mut RequestContext {
        &mut self.base
    }
}

impl<R: Request> fmt::Debug for TypedContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedContext")
            .field("base", &self.base)
            .field("generation", &self.config.as_ref().map(|c| c.generation))
            .field("replied", &self.replied())
            .finish()
    }
}
