//! Admin HTTP API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, routing generation, live contexts
//! - `GET /admin/pools`: pools of the current snapshot with their stats
//! - `GET /admin/route/{op}/{key}`: destinations a request would reach,
//!   computed by a recording traversal
//!
//! # Design Decisions
//! - Every endpoint sits behind bearer-token auth
//! - Read-only: nothing here changes routing state

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::proxy::Proxy;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin router.
#[derive(Clone)]
pub struct AdminState {
    pub proxy: Arc<Proxy>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(proxy: Arc<Proxy>, api_key: &str) -> Self {
        Self {
            proxy,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/pools", get(get_pools))
        .route("/admin/route/{op}/{key}", get(get_route))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
