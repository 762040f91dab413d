//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Expose tag counter operations under `/ssr/tags/`
//! - Forward bypassed paths to the origin untouched
//! - Render everything else through the cache tier chain
//! - Drain background work on shutdown

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::context::{ForwardRequest, RequestContext};
use crate::handlers::{BackendError, Backends, CacheHandler, ChainError, Origin};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::failure_response;
use crate::lifecycle::Lifecycle;
use crate::observability::metrics;
use crate::routing::{EntryRouter, Route};
use crate::versions::{self, Counter, CounterOp};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub cache: Arc<CacheHandler>,
    pub origin: Arc<dyn Origin>,
    pub counter: Arc<dyn Counter>,
    pub router: Arc<EntryRouter>,
    pub lifecycle: Lifecycle,
}

/// HTTP server for the edge cache.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    lifecycle: Lifecycle,
}

impl HttpServer {
    /// Create a server over the default backends for `config`.
    pub fn new(config: ProxyConfig) -> Result<Self, BackendError> {
        let backends = Backends::from_config(&config)?;
        Ok(Self::with_backends(config, backends))
    }

    /// Create a server over explicit backends.
    pub fn with_backends(config: ProxyConfig, backends: Backends) -> Self {
        let config = Arc::new(config);
        let lifecycle = Lifecycle::new();

        let state = AppState {
            config: Arc::clone(&config),
            cache: Arc::new(CacheHandler::assemble(&config, &backends)),
            origin: Arc::clone(&backends.origin),
            counter: Arc::clone(&backends.counter),
            router: Arc::new(EntryRouter::from_config(&config.bypass)),
            lifecycle: lifecycle.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            lifecycle,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/ssr/tags/{tag}", any(tag_current))
            .route("/ssr/tags/{tag}/", any(tag_current))
            .route("/ssr/tags/{tag}/{operation}", any(tag_operation))
            .fallback(entry_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.origin.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router, for serving or driving with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Lifecycle that every request's background work is counted against.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then wait for outstanding background work.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %format!("{}://{}:{}", self.config.origin.protocol, self.config.origin.host, self.config.origin.port),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(pending = self.lifecycle.pending(), "Draining background work");
        self.lifecycle.drain().await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn tag_current(State(state): State<AppState>, Path(tag): Path<String>) -> Response {
    run_tag_operation(&state, &tag, CounterOp::Current).await
}

async fn tag_operation(
    State(state): State<AppState>,
    Path((tag, operation)): Path<(String, String)>,
) -> Response {
    let Some(op) = CounterOp::parse(&operation) else {
        tracing::debug!(tag = %tag, operation = %operation, "Unknown tag operation");
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    run_tag_operation(&state, &tag, op).await
}

async fn run_tag_operation(state: &AppState, tag: &str, op: CounterOp) -> Response {
    metrics::record_tag_operation(op.as_str());
    match versions::dispatch(state.counter.as_ref(), tag, op).await {
        Ok(value) => value.to_string().into_response(),
        Err(e) => {
            tracing::error!(tag = %tag, operation = op.as_str(), error = %e, "Tag operation failed");
            failure_response(&e)
        }
    }
}

/// Everything outside `/ssr/tags/`: bypass or render.
async fn entry_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.router.route(request.uri().path()) {
        Route::Bypass => bypass(&state, request).await,
        Route::Render => render(&state, request).await,
    }
}

async fn render(state: &AppState, request: Request<Body>) -> Response {
    if request.method() != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET")],
            "Method Not Allowed",
        )
            .into_response();
    }

    let (parts, _body) = request.into_parts();
    let ctx = match RequestContext::from_parts(
        parts.method,
        &parts.uri,
        parts.headers,
        Arc::clone(&state.config),
        state.lifecycle.child(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, "Cannot build request context");
            return failure_response(&e);
        }
    };

    let request_id = ctx.request_id.clone();
    let resource = ctx.request.resource();

    match state.cache.handle(ctx).await {
        Ok(Some(result)) => {
            tracing::info!(
                request_id = %request_id,
                resource = %resource,
                handler = %result.source,
                mode = %result.rendering_mode,
                status = result.status(),
                cache_status = result.cache_status().unwrap_or("-"),
                duration_ms = result.aggregated_duration.as_millis() as u64,
                "Served"
            );
            result.response.into_response()
        }
        Ok(None) => failure_response(&ChainError::NoResponse { resource }),
        Err(e) => {
            tracing::error!(request_id = %request_id, resource = %resource, error = %e, "Render failed");
            failure_response(&e)
        }
    }
}

async fn bypass(state: &AppState, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.origin.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    let forward = match ForwardRequest::to_origin(
        parts.method,
        &parts.uri,
        parts.headers,
        body,
        &state.config.origin,
    ) {
        Ok(forward) => forward,
        Err(e) => return failure_response(&e),
    };

    tracing::debug!(method = %forward.method, resource = %forward.resource(), "Bypassing cache");
    match state.origin.forward(&forward).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(resource = %forward.resource(), error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
