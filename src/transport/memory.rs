//! In-process loopback cache backends.
//!
//! Every destination address gets its own key space. Latency and outages can
//! be injected per destination, which is what the routing tests rely on.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use futures_util::future::BoxFuture;

use crate::logging::RpcStatsContext;
use crate::message::{Operation, ResultCode};
use crate::transport::{Transport, TransportError, WireReply, WireRequest};

/// A thread-safe set of fake cache servers keyed by address.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    data: DashMap<(SocketAddr, String), Vec<u8>>,
    down: DashSet<SocketAddr>,
    latency: DashMap<SocketAddr, Duration>,
    sends: DashMap<SocketAddr, u64>,
    total_sends: AtomicU64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `addr` fail with a connect error.
    pub fn set_down(&self, addr: SocketAddr, down: bool) {
        if down {
            self.inner.down.insert(addr);
        } else {
            self.inner.down.remove(&addr);
        }
    }

    /// Delay every reply from `addr`.
    pub fn set_latency(&self, addr: SocketAddr, latency: Duration) {
        self.inner.latency.insert(addr, latency);
    }

    /// Number of sends attempted against `addr`.
    pub fn sends_to(&self, addr: SocketAddr) -> u64 {
        self.inner.sends.get(&addr).map(|r| *r.value()).unwrap_or(0)
    }

    /// Number of sends attempted against any destination.
    pub fn total_sends(&self) -> u64 {
        self.inner.total_sends.load(Ordering::Relaxed)
    }

    /// Read a stored value directly, bypassing routing.
    pub fn stored(&self, addr: SocketAddr, key: &str) -> Option<Vec<u8>> {
        self.inner
            .data
            .get(&(addr, key.to_string()))
            .map(|r| r.value().clone())
    }
}

impl Inner {
    fn apply(&self, addr: SocketAddr, request: WireRequest) -> WireReply {
        let request_body_size = request.key.len() + request.value.as_ref().map_or(0, Vec::len);
        let mut reply = match request.operation {
            Operation::Get => match self.data.get(&(addr, request.key)) {
                Some(value) => WireReply {
                    result: ResultCode::Found,
                    value: Some(value.value().clone()),
                    ..Default::default()
                },
                None => WireReply::new(ResultCode::NotFound),
            },
            Operation::Set => {
                self.data
                    .insert((addr, request.key), request.value.unwrap_or_default());
                WireReply::new(ResultCode::Stored)
            }
            Operation::Delete => match self.data.remove(&(addr, request.key)) {
                Some(_) => WireReply::new(ResultCode::Deleted),
                None => WireReply::new(ResultCode::NotFound),
            },
        };
        reply.rpc_stats = RpcStatsContext {
            request_body_size,
            reply_body_size: reply.value.as_ref().map_or(0, Vec::len),
            server_load: 0,
        };
        reply
    }
}

impl Transport for MemoryTransport {
    fn send(
        &self,
        destination: SocketAddr,
        request: WireRequest,
    ) -> BoxFuture<'static, Result<WireReply, TransportError>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let started = Instant::now();
            inner.total_sends.fetch_add(1, Ordering::Relaxed);
            *inner.sends.entry(destination).or_insert(0) += 1;

            let latency = inner.latency.get(&destination).map(|r| *r.value());
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if inner.down.contains(&destination) {
                return Err(TransportError::ConnectFailed(destination));
            }

            let mut reply = inner.apply(destination, request);
            reply.network_transport_time_us =
                i64::try_from(started.elapsed().as_micros()).unwrap_or(i64::MAX);
            Ok(reply)
        })
    }
}
