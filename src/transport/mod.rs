//! Backend transport boundary.
//!
//! # Data Flow
//! ```text
//! DestinationRoute
//!     → Transport::send(addr, WireRequest)     (suspends the calling task)
//!     → wire codec + connection pool            (external)
//!     → WireReply or TransportError
//! ```
//!
//! # Design Decisions
//! - The wire codec and connection pool live outside this crate; only the
//!   trait is defined here
//! - Object-safe trait so one transport serves every request type
//! - `memory.rs` provides loopback backends for tests and local runs

pub mod memory;

use std::fmt;
use std::net::SocketAddr;

use futures_util::future::BoxFuture;

use crate::logging::RpcStatsContext;
use crate::message::{Operation, ResultCode};

pub use memory::MemoryTransport;

/// Request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub operation: Operation,
    pub key: String,
    pub value: Option<Vec<u8>>,
    pub exptime: u32,
}

/// Reply as returned by the transport.
#[derive(Debug, Clone, Default)]
pub struct WireReply {
    pub result: ResultCode,
    pub value: Option<Vec<u8>>,
    pub message: Option<String>,
    /// Time spent on the network, as measured by the transport.
    pub network_transport_time_us: i64,
    pub rpc_stats: RpcStatsContext,
}

impl WireReply {
    pub fn new(result: ResultCode) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }
}

/// Failure to obtain any reply from a destination.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request to {0} timed out")]
    Timeout(SocketAddr),
    #[error("failed to connect to {0}")]
    ConnectFailed(SocketAddr),
    #[error("remote error: {0}")]
    Remote(String),
}

impl TransportError {
    /// Result code reported to routing for this failure.
    pub fn result_code(&self) -> ResultCode {
        match self {
            TransportError::Timeout(_) => ResultCode::Timeout,
            TransportError::ConnectFailed(_) => ResultCode::ConnectError,
            TransportError::Remote(_) => ResultCode::RemoteError,
        }
    }
}

/// Sends requests to backend cache servers.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(
        &self,
        destination: SocketAddr,
        request: WireRequest,
    ) -> BoxFuture<'static, Result<WireReply, TransportError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_error_results() {
        let addr: SocketAddr = "127.0.0.1:11211".parse().unwrap();
        assert_eq!(TransportError::Timeout(addr).result_code(), ResultCode::Timeout);
        assert_eq!(
            TransportError::ConnectFailed(addr).result_code(),
            ResultCode::ConnectError
        );
        assert!(TransportError::Remote("boom".into()).result_code().is_error());
    }
}
