//! Admin API tests, driven through the router without a socket.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use cache_proxy::admin::{setup_admin_router, AdminState};
use cache_proxy::config::RouteConfig;
use cache_proxy::context::Priority;
use cache_proxy::message::SetRequest;

mod common;
use common::{pool, pool_route, routing};

const KEY: &str = "test-admin-key";

fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn rejects_missing_or_wrong_token() {
    let (proxy, _transport, _logger) = common::proxy(&routing(vec![pool("a", &[22001])], pool_route("a")));
    let app = setup_admin_router(AdminState::new(proxy, KEY));

    let response = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/admin/status", Some("wrong"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_reports_generation() {
    let config = routing(vec![pool("a", &[22011])], pool_route("a"));
    let (proxy, _transport, _logger) = common::proxy(&config);
    proxy.reload(&config).unwrap();
    let app = setup_admin_router(AdminState::new(proxy, KEY));

    let response = app.oneshot(get("/admin/status", Some(KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["generation"], 2);
    assert_eq!(body["routing_prefix"], "/test/cluster/");
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn pools_include_stats() {
    let (proxy, _transport, _logger) = common::proxy(&routing(vec![pool("a", &[22021])], pool_route("a")));
    proxy.execute(SetRequest::new("k", "v"), Priority::Critical).await;
    let app = setup_admin_router(AdminState::new(proxy, KEY));

    let response = app.oneshot(get("/admin/pools", Some(KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    let pools = body.as_array().unwrap();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0]["name"], "a");
    assert_eq!(pools[0]["stats"]["request_count"], 1);
}

#[tokio::test]
async fn route_endpoint_runs_recording_traversal() {
    let config = routing(
        vec![pool("a", &[22031]), pool("b", &[22032])],
        RouteConfig::AllSync {
            children: vec![pool_route("a"), pool_route("b")],
        },
    );
    let (proxy, transport, _logger) = common::proxy(&config);
    let app = setup_admin_router(AdminState::new(proxy, KEY));

    let response = app
        .clone()
        .oneshot(get("/admin/route/get/user:1", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["destinations"].as_array().unwrap().len(), 2);
    assert_eq!(transport.total_sends(), 0);

    let response = app
        .oneshot(get("/admin/route/append/user:1", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
