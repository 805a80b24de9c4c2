use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::message::{DeleteRequest, GetRequest, Operation, SetRequest};
use crate::pool::PoolSnapshot;
use crate::proxy::RouteDebug;
use crate::stats::PoolStatsSnapshot;

/// Errors returned by admin handlers.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    UnknownOperation(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::UnknownOperation(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub routing_prefix: String,
    pub contexts_alive: i64,
}

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    #[serde(flatten)]
    pub pool: PoolSnapshot,
    pub stats: Option<PoolStatsSnapshot>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.proxy.config();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        generation: snapshot.generation,
        routing_prefix: snapshot.routing_prefix.clone(),
        contexts_alive: state.proxy.stats().contexts_alive(),
    })
}

pub async fn get_pools(State(state): State<AdminState>) -> Json<Vec<PoolStatus>> {
    let snapshot = state.proxy.config();
    let stats = state.proxy.stats();
    let pools = snapshot
        .pools()
        .into_iter()
        .map(|pool| PoolStatus {
            pool: pool.snapshot(),
            stats: stats
                .get_pool_stats(Some(pool.stat_index()))
                .map(|s| s.snapshot()),
        })
        .collect();
    Json(pools)
}

pub async fn get_route(
    State(state): State<AdminState>,
    Path((op, key)): Path<(String, String)>,
) -> Result<Json<RouteDebug>, AdminError> {
    let operation: Operation = op.parse().map_err(AdminError::UnknownOperation)?;
    let proxy = &state.proxy;
    let debug = match operation {
        Operation::Get => proxy.route_debug(GetRequest::new(key)).await,
        Operation::Set => proxy.route_debug(SetRequest::new(key, Vec::new())).await,
        Operation::Delete => proxy.route_debug(DeleteRequest::new(key)).await,
    };
    Ok(Json(debug))
}
