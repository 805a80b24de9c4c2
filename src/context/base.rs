//! State and hooks shared by every request context, whatever the request
//! type.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::context::fiber_local;
use crate::logging::{
    AdditionalLogger, ExtraDataCallback, ReplyView, RequestLogger, RequestLoggerContext,
    RequestLoggerContextFlags, RequestView, RpcStatsContext,
};
use crate::message::{Reply, Request, RequestClass, ResultCode};
use crate::pool::Destination;
use crate::proxy::Proxy;
use crate::routing::ShardSplitter;
use crate::stats::now_us;

/// Scheduling class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    #[default]
    Critical = 0,
    Async = 1,
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        match value {
            1 => Priority::Async,
            _ => Priority::Critical,
        }
    }
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Async => "async",
        }
    }
}

/// Called by a recording context wherever a real context would send, with the
/// pool name and the destination that would be contacted.
pub type ClientCallback = Arc<dyn Fn(&str, &Destination) + Send + Sync>;

/// Called by a recording context when routing consults shard-split metadata.
/// The flag is set when the split was reached on a shadow path.
pub type ShardSplitCallback = Arc<dyn Fn(&ShardSplitter, bool) + Send + Sync>;

/// Called exactly once when the context is destroyed.
pub type CompletionCallback = Box<dyn FnOnce(&RequestContext) + Send>;

pub(crate) enum Mode {
    Normal {
        logger: RequestLogger,
        additional_logger: Arc<dyn AdditionalLogger>,
    },
    Recording {
        client_callback: Option<ClientCallback>,
        shard_split_callback: Option<ShardSplitCallback>,
    },
}

/// One-shot notification between tasks.
///
/// Posting is sticky: a waiter that arrives after [`Baton::post`] returns
/// immediately.
#[derive(Debug, Clone, Default)]
pub struct Baton {
    inner: Arc<BatonInner>,
}

#[derive(Debug, Default)]
struct BatonInner {
    posted: AtomicBool,
    notify: Notify,
}

impl Baton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self) {
        self.inner.posted.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_posted(&self) -> bool {
        self.inner.posted.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_posted() {
                return;
            }
            notified.await;
        }
    }
}

/// Where a physical send goes, and how it is classified.
#[derive(Debug, Clone, Copy)]
pub struct SendTarget<'a> {
    pub pool_name: &'a str,
    pub destination: SocketAddr,
    pub stripped_routing_prefix: &'a str,
    pub request_class: RequestClass,
    pub flags: RequestLoggerContextFlags,
}

/// Timing and transport data for a completed send.
#[derive(Clone, Copy)]
pub struct ReplyTiming<'a> {
    pub start_time_us: i64,
    pub end_time_us: i64,
    /// Stat index of the pool the send went to.
    pub pool_stat_index: Option<usize>,
    pub rpc_stats: RpcStatsContext,
    pub network_transport_time_us: i64,
    pub extra_data_callbacks: &'a [ExtraDataCallback],
}

const NO_POOL: i64 = -1;

/// Per-request state independent of the request type.
///
/// Created by [`crate::context::TypedContext`], which dereferences to it.
/// Dropping the last handle finalizes pool stats and runs the completion
/// callback.
pub struct RequestContext {
    id: Uuid,
    priority: Priority,
    mode: Mode,
    proxy: Arc<Proxy>,
    start_time_us: i64,
    final_result: AtomicU8,
    pool_stat_index: AtomicI64,
    completion: Mutex<Option<CompletionCallback>>,
}

impl RequestContext {
    pub(crate) fn new(proxy: Arc<Proxy>, priority: Priority) -> Self {
        let id = Uuid::new_v4();
        let mode = Mode::Normal {
            logger: RequestLogger::new(Arc::clone(proxy.stats()), id),
            additional_logger: Arc::clone(proxy.additional_logger()),
        };
        Self::with_mode(id, proxy, priority, mode)
    }

    pub(crate) fn new_recording(
        proxy: Arc<Proxy>,
        client_callback: Option<ClientCallback>,
        shard_split_callback: Option<ShardSplitCallback>,
    ) -> Self {
        let mode = Mode::Recording {
            client_callback,
            shard_split_callback,
        };
        Self::with_mode(Uuid::new_v4(), proxy, Priority::Critical, mode)
    }

    fn with_mode(id: Uuid, proxy: Arc<Proxy>, priority: Priority, mode: Mode) -> Self {
        proxy.stats().context_created();
        Self {
            id,
            priority,
            mode,
            proxy,
            start_time_us: now_us(),
            final_result: AtomicU8::new(ResultCode::Unknown as u8),
            pool_stat_index: AtomicI64::new(NO_POOL),
            completion: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.mode, Mode::Recording { .. })
    }

    pub fn start_time_us(&self) -> i64 {
        self.start_time_us
    }

    pub fn final_result(&self) -> ResultCode {
        ResultCode::from(self.final_result.load(Ordering::Acquire))
    }

    pub(crate) fn set_final_result(&self, result: ResultCode) {
        self.final_result.store(result as u8, Ordering::Release);
    }

    /// Stat index of the pool this request was last routed to.
    pub fn pool_stat_index(&self) -> Option<usize> {
        usize::try_from(self.pool_stat_index.load(Ordering::Acquire)).ok()
    }

    /// Record the pool this request is routed to. When several pool routes
    /// are traversed the last one wins.
    pub fn set_pool_stat_index(&self, index: usize) {
        let index = i64::try_from(index).unwrap_or(NO_POOL);
        self.pool_stat_index.store(index, Ordering::Release);
    }

    /// Install the callback run when this context is destroyed. Only possible
    /// while the context is still exclusively owned.
    pub fn set_completion_callback(&mut self, callback: impl FnOnce(&RequestContext) + Send + 'static) {
        *self
            .completion
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Hook for the recording client callback. Returns `true` when this is a
    /// recording context, in which case the caller must not send.
    pub(crate) fn record_send(&self, pool_name: &str, destination: &Destination) -> bool {
        match &self.mode {
            Mode::Recording { client_callback, .. } => {
                if let Some(callback) = client_callback {
                    callback(pool_name, destination);
                }
                true
            }
            Mode::Normal { .. } => false,
        }
    }

    pub(crate) fn record_shard_split(&self, splitter: &ShardSplitter, is_shadow: bool) {
        if let Mode::Recording {
            shard_split_callback: Some(callback),
            ..
        } = &self.mode
        {
            callback(splitter, is_shadow);
        }
    }

    /// Called right before a request is handed to the transport.
    pub fn on_before_request_sent<R: Request>(
        &self,
        target: &SendTarget<'_>,
        request: &R,
        start_time_us: i64,
    ) {
        let Mode::Normal {
            additional_logger, ..
        } = &self.mode
        else {
            return;
        };

        let ctx = RequestLoggerContext {
            pool_name: target.pool_name,
            destination: target.destination,
            stripped_routing_prefix: target.stripped_routing_prefix,
            request_class: target.request_class,
            start_time_us,
            end_time_us: 0,
            reply_result: ResultCode::Unknown,
            rpc_stats: RpcStatsContext::default(),
            network_transport_time_us: 0,
            extra_data_callbacks: &[],
            flags: target.flags,
            failover_count: 0,
        };
        additional_logger.log_before_request_sent(&request_view(request), &ctx);
    }

    /// Called once per reply obtained from the transport.
    pub fn on_reply_received<R: Request>(
        &self,
        target: &SendTarget<'_>,
        request: &R,
        reply: &R::Reply,
        timing: &ReplyTiming<'_>,
    ) {
        let Mode::Normal {
            logger,
            additional_logger,
        } = &self.mode
        else {
            return;
        };

        if let Some(stats) = self.proxy.stats().get_pool_stats(timing.pool_stat_index) {
            stats.increment_request_count(1);
            stats.add_duration_sample(timing.end_time_us - timing.start_time_us);
        }

        let ctx = RequestLoggerContext {
            pool_name: target.pool_name,
            destination: target.destination,
            stripped_routing_prefix: target.stripped_routing_prefix,
            request_class: target.request_class,
            start_time_us: timing.start_time_us,
            end_time_us: timing.end_time_us,
            reply_result: reply.result(),
            rpc_stats: timing.rpc_stats,
            network_transport_time_us: timing.network_transport_time_us,
            extra_data_callbacks: timing.extra_data_callbacks,
            flags: target.flags,
            failover_count: fiber_local::failover_count(),
        };
        logger.log::<R>(&ctx);

        let reply_view = ReplyView {
            result: reply.result(),
            message: reply.message(),
        };
        additional_logger.log(&request_view(request), &reply_view, &ctx);
    }

    /// Whether the additional logger would log a request with these
    /// properties. Always `false` for recording contexts.
    pub fn may_log(
        &self,
        routing_key_hash: u32,
        request_class: RequestClass,
        result: ResultCode,
        duration_us: i64,
    ) -> bool {
        match &self.mode {
            Mode::Normal {
                additional_logger, ..
            } => additional_logger.may_log(routing_key_hash, request_class, result, duration_us),
            Mode::Recording { .. } => false,
        }
    }
}

fn request_view<R: Request>(request: &R) -> RequestView<'_> {
    RequestView {
        operation: R::OPERATION,
        key: request.key(),
        routing_key_hash: request.routing_key_hash(),
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if !self.is_recording() {
            if let Some(stats) = self.proxy.stats().get_pool_stats(self.pool_stat_index()) {
                stats.increment_final_result_error_count(u64::from(self.final_result().is_error()));
                stats.add_total_duration_sample(now_us() - self.start_time_us);
            }
        }

        let callback = self
            .completion
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            fiber_local::run_without_locals(|| callback(&*self));
        }

        self.proxy.stats().context_destroyed();
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("recording", &self.is_recording())
            .field("start_time_us", &self.start_time_us)
            .field("final_result", &self.final_result())
            .field("pool_stat_index", &self.pool_stat_index())
            .finish()
    }
}
