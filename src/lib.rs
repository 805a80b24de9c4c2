//! Protocol-routing cache proxy.
//!
//! The core is the per-request execution context ([`context`]): one object
//! per in-flight request, shared by every routing branch working on it, that
//! pins a routing snapshot, delivers exactly one reply and emits stats and
//! logs as the request completes.

pub mod admin;
pub mod config;
pub mod context;
pub mod lifecycle;
pub mod logging;
pub mod message;
pub mod observability;
pub mod pool;
pub mod proxy;
pub mod routing;
pub mod stats;
pub mod transport;

pub use config::schema::ProxyConfig;
pub use context::{Priority, RequestContext, TypedContext};
pub use lifecycle::Shutdown;
pub use proxy::Proxy;
