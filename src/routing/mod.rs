//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RoutingConfig
//!     → snapshot.rs (validate, build pools, compile one tree per operation)
//!     → RoutingSnapshot (immutable, Arc-shared)
//!
//! Request:
//!     TypedContext::start_processing
//!     → Routable::root(snapshot.route)
//!     → failover.rs / all_sync.rs / all_async.rs / shard_split.rs
//!     → pool_route.rs (select destination, set pool stat index)
//!     → destination.rs (send or record)
//! ```
//!
//! # Design Decisions
//! - Routes compiled per generation, immutable at runtime
//! - Routes are generic over the request type; the tree is built once per
//!   operation from the same configuration
//! - Per-request state lives on the context and in task-locals, never on a
//!   route

pub mod all_async;
pub mod all_sync;
pub mod destination;
pub mod failover;
pub mod pool_route;
pub mod route;
pub mod shard_split;
pub mod snapshot;

pub use all_async::AllAsyncRoute;
pub use all_sync::AllSyncRoute;
pub use destination::DestinationRoute;
pub use failover::FailoverRoute;
pub use pool_route::PoolRoute;
pub use route::{ProxyRoute, Routable, Route};
pub use shard_split::{ShardSplitRoute, ShardSplitter};
pub use snapshot::RoutingSnapshot;
