//! Cache protocol messages.
//!
//! # Data Flow
//! ```text
//! Connection handler decodes a request
//!     → request.rs (typed request: Get / Set / Delete)
//!     → routing tree forwards it, producing a typed reply
//!     → result.rs (result code classification, worst-reply ordering)
//!     → reply delivered back to the connection handler
//! ```
//!
//! # Design Decisions
//! - One concrete type per request shape; shared behavior lives in the
//!   `Request` / `Reply` traits instead of a single dynamic message type
//! - Result codes are a closed enum with an explicit error class
//! - Routing key hashing is stable across processes (CRC32)

pub mod request;
pub mod result;

pub use request::{
    DeleteReply, DeleteRequest, GetReply, GetRequest, Operation, Reply, Request, SetReply,
    SetRequest,
};
pub use result::{RequestClass, ResultCode};
