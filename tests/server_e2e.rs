//! HTTP surface: tag endpoints, routing, rendering and failure headers.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{closed_port, page, start_programmable_backend, test_config, RecordingAnalytics, ScriptedOrigin};
use edge_ssr_cache::config::ProxyConfig;
use edge_ssr_cache::handlers::Backends;
use edge_ssr_cache::storage::{MemoryBlobStore, MemoryEdgeCache};
use edge_ssr_cache::versions::LocalCounter;
use edge_ssr_cache::{HttpServer, Shutdown};

fn server_with(config: ProxyConfig, origin: Arc<ScriptedOrigin>) -> HttpServer {
    let backends = Backends {
        edge_cache: Arc::new(MemoryEdgeCache::new(100)),
        blob_store: Arc::new(MemoryBlobStore::new()),
        origin,
        counter: Arc::new(LocalCounter::new()),
        analytics: Arc::new(RecordingAnalytics::default()),
    };
    HttpServer::with_backends(config, backends)
}

async fn send(server: &HttpServer, method: Method, uri: &str, body: &'static str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap();
    server.router().oneshot(request).await.unwrap()
}

async fn get(server: &HttpServer, uri: &str) -> Response {
    send(server, Method::GET, uri, "").await
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn rendered_origin() -> Arc<ScriptedOrigin> {
    Arc::new(ScriptedOrigin::fixed(page(
        StatusCode::OK,
        &[("cdn-cache-control", "public, max-age=600"), ("content-type", "text/html")],
        "<html>home</html>",
    )))
}

#[tokio::test]
async fn test_tag_endpoints() {
    let server = server_with(test_config(3000), rendered_origin());

    assert_eq!(body_text(get(&server, "/ssr/tags/home").await).await, "0");
    assert_eq!(body_text(get(&server, "/ssr/tags/home/increment").await).await, "1");
    assert_eq!(body_text(get(&server, "/ssr/tags/home/increment").await).await, "2");
    assert_eq!(body_text(get(&server, "/ssr/tags/home/current").await).await, "2");
    assert_eq!(body_text(get(&server, "/ssr/tags/home/decrement").await).await, "1");
    assert_eq!(body_text(get(&server, "/ssr/tags/home/").await).await, "1");
    assert_eq!(body_text(get(&server, "/ssr/tags/other").await).await, "0");
}

#[tokio::test]
async fn test_unknown_tag_operation_is_not_found() {
    let server = server_with(test_config(3000), rendered_origin());

    let response = get(&server, "/ssr/tags/home/reset").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_render_rejects_non_get() {
    let origin = rendered_origin();
    let server = server_with(test_config(3000), origin.clone());

    let response = send(&server, Method::POST, "/home", "payload").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(origin.calls(), 0);
}

#[tokio::test]
async fn test_render_miss_then_hit() {
    let origin = rendered_origin();
    let server = server_with(test_config(3000), origin.clone());

    let first = get(&server, "/home").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "x-cache-status"), Some("MISS"));
    assert_eq!(header(&first, "x-debug-handler"), Some("L3"));
    assert_eq!(header(&first, "x-debug-rendering-mode"), Some("SSR"));
    assert_eq!(header(&first, "cache-control"), Some("no-store"));
    assert!(header(&first, "x-request-id").is_some());
    assert_eq!(body_text(first).await, "<html>home</html>");

    server.lifecycle().drain().await;

    let second = get(&server, "/home").await;
    assert_eq!(header(&second, "x-cache-status"), Some("HIT"));
    assert_eq!(header(&second, "x-debug-handler"), Some("L1"));
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn test_client_request_id_is_kept() {
    let server = server_with(test_config(3000), rendered_origin());

    let request = Request::builder()
        .uri("/home")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();

    assert_eq!(header(&response, "x-request-id"), Some("req-42"));
}

#[tokio::test]
async fn test_bypass_forwards_untouched() {
    let origin = Arc::new(ScriptedOrigin::fixed(page(
        StatusCode::OK,
        &[("set-cookie", "cart=1")],
        "cart page",
    )));
    let server = server_with(test_config(3000), origin.clone());

    let response = send(&server, Method::POST, "/es/cart/add", "sku=42").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "x-cache-status").is_none());
    assert_eq!(header(&response, "set-cookie"), Some("cart=1"));
    assert_eq!(body_text(response).await, "cart page");

    let forwarded = origin.requests();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].method, Method::POST);
    assert_eq!(forwarded[0].url.path(), "/es/cart/add");
    assert_eq!(forwarded[0].body.as_ref(), b"sku=42");
}

#[tokio::test]
async fn test_bypass_origin_failure_is_bad_gateway() {
    let server = server_with(test_config(3000), Arc::new(ScriptedOrigin::down()));

    let response = get(&server, "/es/checkout").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_no_response_reports_error_headers() {
    let server = server_with(test_config(3000), Arc::new(ScriptedOrigin::down()));

    let response = get(&server, "/home").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        header(&response, "x-debug-error"),
        Some("no cache tier produced a response for /home")
    );
    assert!(header(&response, "x-debug-error-stack").is_some());
    assert!(body_text(response).await.contains("/home"));
}

#[tokio::test]
async fn test_serves_over_tcp_against_real_origin() {
    let backend = start_programmable_backend(|| async {
        (
            200,
            vec![("cdn-cache-control", "public, max-age=600"), ("content-type", "text/html")],
            "<html>from origin</html>".to_string(),
        )
    })
    .await;

    let server = HttpServer::new(test_config(backend.port())).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let first = client.get(format!("http://{}/home", addr)).send().await.unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers()["x-cache-status"], "MISS");
    assert_eq!(first.text().await.unwrap(), "<html>from origin</html>");

    // Cache writes run in the background; give them a moment.
    let mut status = String::new();
    for _ in 0..50 {
        let response = client.get(format!("http://{}/home", addr)).send().await.unwrap();
        status = response.headers()["x-cache-status"].to_str().unwrap().to_string();
        if status == "HIT" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "HIT");

    let bumped = client
        .get(format!("http://{}/ssr/tags/default/increment", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(bumped.text().await.unwrap(), "1");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_unreachable_origin_is_internal_error() {
    let server = HttpServer::new(test_config(closed_port().await)).unwrap();

    let response = get(&server, "/home").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(header(&response, "x-debug-error").is_some());
}
