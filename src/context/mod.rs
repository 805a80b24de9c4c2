//! Per-request execution context.
//!
//! # Data Flow
//! ```text
//! Connection handler
//!     → TypedContext::new                 (UniqueContext, exclusively owned)
//!     → Proxy::dispatch
//!         → UniqueContext::process        (pins snapshot, Box → Arc)
//!             → start_processing          (spawns routing task)
//!                 → Route tree            (each branch clones the Arc)
//!                 → send_reply            (exactly once)
//!     → last Arc dropped
//!         → RequestContext::drop          (final pool stats, completion callback)
//!         → destroy baton posted
//! ```
//!
//! # Responsibilities
//! - Carry request state through an arbitrarily deep routing tree
//! - Pin one routing snapshot for the whole life of a request
//! - Guarantee a single reply per logical request
//! - Emit stats and logs once per physical send and once per completion
//! - Support recording traversals that never send
//!
//! # Design Decisions
//! - Shared ownership is an `Arc`; destruction runs on whichever task drops
//!   the last handle
//! - The exclusive handle never exposes its `Box`, so `process` is the only
//!   way to share a normal context
//! - Fields changed after sharing are atomics or short mutex sections
//! - Task-local state (`fiber_local`) carries failover count and request class

pub mod base;
pub mod fiber_local;
pub mod typed;

pub use base::{
    Baton, ClientCallback, CompletionCallback, Priority, ReplyTiming, RequestContext,
    SendTarget, ShardSplitCallback,
};
pub use fiber_local::FiberLocals;
pub use typed::{ReplySink, TypedContext, UniqueContext};
