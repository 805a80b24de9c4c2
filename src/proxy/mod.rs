//! Proxy: owner of the live routing snapshot and of process-wide state.
//!
//! # Data Flow
//! ```text
//! Proxy::execute(request)
//!     → TypedContext::new (oneshot reply sink)
//!     → Proxy::dispatch → UniqueContext::process(current snapshot)
//!     → reply awaited on the oneshot
//!
//! Proxy::reload(config)
//!     → RoutingSnapshot::build (next generation)
//!     → ArcSwap::store          (new requests see it; in-flight ones keep theirs)
//!
//! Proxy::route_debug(request)
//!     → TypedContext::recording_notify
//!     → root route traversal without sends
//!     → Baton wait until every branch dropped the context
//! ```
//!
//! # Design Decisions
//! - Contexts hold the proxy by `Arc`; the proxy never holds contexts
//! - The snapshot is swapped atomically and never mutated

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::{ConfigError, RoutingConfig};
use crate::context::{
    fiber_local, Baton, ClientCallback, FiberLocals, Priority, ShardSplitCallback, TypedContext,
    UniqueContext,
};
use crate::logging::{AdditionalLogger, NoopAdditionalLogger};
use crate::message::{Reply, ResultCode};
use crate::observability::metrics;
use crate::pool::Destination;
use crate::routing::{Routable, RoutingSnapshot, ShardSplitter};
use crate::stats::ProxyStats;
use crate::transport::Transport;

/// A destination a recording traversal would have contacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedDestination {
    pub pool: String,
    pub address: SocketAddr,
}

/// A shard split a recording traversal went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedShardSplit {
    pub shards: usize,
    pub is_shadow: bool,
}

/// Result of [`Proxy::route_debug`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteDebug {
    pub generation: u64,
    pub destinations: Vec<RecordedDestination>,
    pub shard_splits: Vec<RecordedShardSplit>,
}

/// The routing proxy.
#[derive(Debug)]
pub struct Proxy {
    config: ArcSwap<RoutingSnapshot>,
    stats: Arc<ProxyStats>,
    transport: Arc<dyn Transport>,
    additional_logger: Arc<dyn AdditionalLogger>,
    generation: AtomicU64,
}

impl Proxy {
    /// Build a proxy with the no-op additional logger.
    pub fn new(config: &RoutingConfig, transport: Arc<dyn Transport>) -> Result<Arc<Self>, ConfigError> {
        Self::with_additional_logger(config, transport, Arc::new(NoopAdditionalLogger))
    }

    pub fn with_additional_logger(
        config: &RoutingConfig,
        transport: Arc<dyn Transport>,
        additional_logger: Arc<dyn AdditionalLogger>,
    ) -> Result<Arc<Self>, ConfigError> {
        let stats = Arc::new(ProxyStats::new());
        let snapshot = RoutingSnapshot::build(config, &stats, Arc::clone(&transport), 1)?;
        tracing::info!(
            generation = 1,
            pools = snapshot.pools().len(),
            routing_prefix = %snapshot.routing_prefix,
            "Routing configured"
        );

        Ok(Arc::new(Self {
            config: ArcSwap::from_pointee(snapshot),
            stats,
            transport,
            additional_logger,
            generation: AtomicU64::new(1),
        }))
    }

    /// The current snapshot. The returned `Arc` stays valid across reloads.
    pub fn config(&self) -> Arc<RoutingSnapshot> {
        self.config.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &Arc<ProxyStats> {
        &self.stats
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn additional_logger(&self) -> &Arc<dyn AdditionalLogger> {
        &self.additional_logger
    }

    /// Build the next generation from `config` and make it current. On error
    /// the current snapshot stays in place.
    pub fn reload(&self, config: &RoutingConfig) -> Result<u64, ConfigError> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        match RoutingSnapshot::build(config, &self.stats, Arc::clone(&self.transport), generation) {
            Ok(snapshot) => {
                self.config.store(Arc::new(snapshot));
                metrics::record_config_reload(true, generation);
                tracing::info!(generation, "Routing config reloaded");
                Ok(generation)
            }
            Err(e) => {
                metrics::record_config_reload(false, generation);
                tracing::error!(generation, error = %e, "Routing config rejected, keeping current");
                Err(e)
            }
        }
    }

    /// Start routing `ctx` against the current snapshot.
    pub fn dispatch<R: Routable>(&self, ctx: UniqueContext<R>) -> Arc<TypedContext<R>> {
        ctx.process(self.config())
    }

    /// Route `request` and wait for its reply.
    pub async fn execute<R: Routable>(self: &Arc<Self>, request: R, priority: Priority) -> R::Reply {
        let (tx, rx) = oneshot::channel();
        let ctx = TypedContext::new(Arc::clone(self), request, priority, move |reply: R::Reply| {
            let _ = tx.send(reply);
        });
        drop(self.dispatch(ctx));

        rx.await.unwrap_or_else(|_| {
            R::Reply::from_result(ResultCode::LocalError, "request context dropped without a reply")
        })
    }

    /// Route `request` in recording mode and report every destination and
    /// shard split it would go through. Returns once the recording context
    /// has been destroyed, background branches included.
    pub async fn route_debug<R: Routable>(self: &Arc<Self>, request: R) -> RouteDebug {
        let snapshot = self.config();
        let destinations = Arc::new(Mutex::new(Vec::new()));
        let shard_splits = Arc::new(Mutex::new(Vec::new()));

        let client_callback: ClientCallback = {
            let destinations = Arc::clone(&destinations);
            Arc::new(move |pool: &str, destination: &Destination| {
                destinations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(RecordedDestination {
                        pool: pool.to_string(),
                        address: destination.addr,
                    });
            })
        };
        let shard_split_callback: ShardSplitCallback = {
            let shard_splits = Arc::clone(&shard_splits);
            Arc::new(move |splitter: &ShardSplitter, is_shadow: bool| {
                shard_splits
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(RecordedShardSplit {
                        shards: splitter.shard_count(),
                        is_shadow,
                    });
            })
        };

        let baton = Baton::new();
        let ctx = TypedContext::recording_notify(
            Arc::clone(self),
            request.clone(),
            baton.clone(),
            Some(client_callback),
            Some(shard_split_callback),
        );
        let route = Arc::clone(R::root(&snapshot.route));
        tokio::spawn(fiber_local::scope(FiberLocals::new(), async move {
            route.route(&request, &ctx).await;
        }));
        baton.wait().await;

        let destinations = std::mem::take(&mut *destinations.lock().unwrap_or_else(PoisonError::into_inner));
        let shard_splits = std::mem::take(&mut *shard_splits.lock().unwrap_or_else(PoisonError::into_inner));
        RouteDebug {
            generation: snapshot.generation,
            destinations,
            shard_splits,
        }
    }
}
