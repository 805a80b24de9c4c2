//! The record handed to request loggers for every send and every reply.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::message::{Operation, RequestClass, ResultCode};

/// Produces extra key/value pairs to attach to a log record.
pub type ExtraDataCallback = Arc<dyn Fn() -> HashMap<String, String> + Send + Sync>;

/// Per-RPC stats reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatsContext {
    pub request_body_size: usize,
    pub reply_body_size: usize,
    /// Backend-reported load, 0 when unknown.
    pub server_load: u32,
}

bitflags! {
    /// Bit flags qualifying a log record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RequestLoggerContextFlags: u32 {
        /// Sent from a background fan-out branch whose reply is not returned.
        const BACKGROUND = 1;
        /// Sent to one shard of a split key.
        const SHARD_SPLIT = 1 << 1;
    }
}

impl RequestLoggerContextFlags {
    pub const NONE: Self = Self::empty();
}

/// Borrowed view of a request, independent of its concrete type.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub operation: Operation,
    pub key: &'a str,
    pub routing_key_hash: u32,
}

/// Borrowed view of a reply, independent of its concrete type.
#[derive(Debug, Clone, Copy)]
pub struct ReplyView<'a> {
    pub result: ResultCode,
    pub message: Option<&'a str>,
}

/// Everything known about one physical send at the time it is logged.
#[derive(Clone)]
pub struct RequestLoggerContext<'a> {
    pub pool_name: &'a str,
    pub destination: SocketAddr,
    pub stripped_routing_prefix: &'a str,
    pub request_class: RequestClass,
    pub start_time_us: i64,
    /// 0 for records emitted before the send.
    pub end_time_us: i64,
    pub reply_result: ResultCode,
    pub rpc_stats: RpcStatsContext,
    pub network_transport_time_us: i64,
    pub extra_data_callbacks: &'a [ExtraDataCallback],
    pub flags: RequestLoggerContextFlags,
    /// Failovers already taken by this logical request when the reply arrived.
    pub failover_count: u32,
}

impl RequestLoggerContext<'_> {
    /// End-to-end duration of the send, 0 if it has not completed.
    pub fn duration_us(&self) -> i64 {
        if self.end_time_us == 0 {
            0
        } else {
            self.end_time_us - self.start_time_us
        }
    }

    /// Merged output of every extra-data callback; later callbacks win.
    pub fn extra_data(&self) -> HashMap<String, String> {
        let mut data = HashMap::new();
        for callback in self.extra_data_callbacks {
            data.extend(callback());
        }
        data
    }
}

impl fmt::Debug for RequestLoggerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoggerContext")
            .field("pool_name", &self.pool_name)
            .field("destination", &self.destination)
            .field("stripped_routing_prefix", &self.stripped_routing_prefix)
            .field("request_class", &self.request_class)
            .field("start_time_us", &self.start_time_us)
            .field("end_time_us", &self.end_time_us)
            .field("reply_result", &self.reply_result)
            .field("rpc_stats", &self.rpc_stats)
            .field("network_transport_time_us", &self.network_transport_time_us)
            .field("extra_data_callbacks", &self.extra_data_callbacks.len())
            .field("flags", &self.flags)
            .field("failover_count", &self.failover_count)
            .finish()
    }
}
