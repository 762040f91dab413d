//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_ssr_cache::config::ProxyConfig;
use edge_ssr_cache::context::{ForwardRequest, RequestContext, ResponseContext};
use edge_ssr_cache::handlers::{Backends, CacheHandler, ChainError, Origin, OriginError};
use edge_ssr_cache::http::BufferedResponse;
use edge_ssr_cache::lifecycle::Lifecycle;
use edge_ssr_cache::observability::{AnalyticsSink, DataPoint};
use edge_ssr_cache::storage::{
    BlobStore, GetOptions, MemoryBlobStore, MemoryEdgeCache, ObjectMeta, PutOptions, StorageError,
    StoredObject,
};
use edge_ssr_cache::versions::LocalCounter;

/// Config pointing at `127.0.0.1:port` with short refresh delays.
pub fn test_config(port: u16) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.origin.host = "127.0.0.1".to_string();
    config.origin.port = port;
    config.cache.retry_delays_ms = vec![10, 20];
    config
}

/// Build an origin response from static header pairs.
pub fn page(status: StatusCode, headers: &[(&'static str, &'static str)], body: &'static str) -> BufferedResponse {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, HeaderValue::from_static(*value));
    }
    BufferedResponse::new(status, map, body)
}

type Responder = dyn Fn(&ForwardRequest, usize) -> Option<BufferedResponse> + Send + Sync;

/// In-process origin answering from a closure and recording every call.
///
/// The closure receives the request and the zero-based call number;
/// `None` simulates an unreachable origin.
pub struct ScriptedOrigin {
    responder: Box<Responder>,
    calls: Mutex<Vec<ForwardRequest>>,
}

impl ScriptedOrigin {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ForwardRequest, usize) -> Option<BufferedResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same response.
    pub fn fixed(response: BufferedResponse) -> Self {
        Self::new(move |_, _| Some(response.clone()))
    }

    pub fn down() -> Self {
        Self::new(|_, _| None)
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ForwardRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn user_agents(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| {
                r.headers
                    .get(axum::http::header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn forward(&self, request: &ForwardRequest) -> Result<BufferedResponse, OriginError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };
        (self.responder)(request, call).ok_or_else(|| OriginError::Body("connection refused".to_string()))
    }
}

/// Analytics sink that keeps every point.
#[derive(Default)]
pub struct RecordingAnalytics {
    points: Mutex<Vec<DataPoint>>,
}

impl RecordingAnalytics {
    pub fn points(&self) -> Vec<DataPoint> {
        self.points.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingAnalytics {
    async fn write(&self, point: DataPoint) {
        self.points.lock().unwrap().push(point);
    }
}

/// Object store whose every call fails.
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn get(&self, _key: &str, _options: GetOptions) -> Result<Option<StoredObject>, StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }

    async fn head(&self, _key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }

    async fn put(&self, _key: &str, _body: bytes::Bytes, _options: PutOptions) -> Result<ObjectMeta, StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }
}

/// A cache handler over in-memory stores and a scripted origin.
pub struct Harness {
    pub config: Arc<ProxyConfig>,
    pub handler: Arc<CacheHandler>,
    pub edge: Arc<MemoryEdgeCache>,
    pub blob: Arc<MemoryBlobStore>,
    pub origin: Arc<ScriptedOrigin>,
    pub counter: Arc<LocalCounter>,
    pub analytics: Arc<RecordingAnalytics>,
    pub lifecycle: Lifecycle,
}

impl Harness {
    pub fn new(config: ProxyConfig, origin: ScriptedOrigin) -> Self {
        Self::with_blob_store(config, origin, None)
    }

    /// Same as `new`, but with `blob_store` replacing the in-memory one as L2.
    pub fn with_blob_store(
        config: ProxyConfig,
        origin: ScriptedOrigin,
        blob_store: Option<Arc<dyn BlobStore>>,
    ) -> Self {
        let edge = Arc::new(MemoryEdgeCache::new(config.cache.edge_max_entries));
        let blob = Arc::new(MemoryBlobStore::new());
        let origin = Arc::new(origin);
        let counter = Arc::new(LocalCounter::new());
        let analytics = Arc::new(RecordingAnalytics::default());

        let blob_store: Arc<dyn BlobStore> = match blob_store {
            Some(store) => store,
            None => blob.clone(),
        };
        let backends = Backends {
            edge_cache: edge.clone(),
            blob_store,
            origin: origin.clone(),
            counter: counter.clone(),
            analytics: analytics.clone(),
        };
        let handler = Arc::new(CacheHandler::assemble(&config, &backends));

        Self {
            config: Arc::new(config),
            handler,
            edge,
            blob,
            origin,
            counter,
            analytics,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn context(&self, uri: &str, headers: HeaderMap) -> RequestContext {
        let uri: Uri = uri.parse().unwrap();
        RequestContext::from_parts(
            Method::GET,
            &uri,
            headers,
            Arc::clone(&self.config),
            self.lifecycle.child(),
        )
        .unwrap()
    }

    /// Serve `uri` and wait for every background task it scheduled.
    pub async fn serve(&self, uri: &str) -> Result<Option<ResponseContext>, ChainError> {
        self.serve_with(uri, HeaderMap::new()).await
    }

    pub async fn serve_with(&self, uri: &str, headers: HeaderMap) -> Result<Option<ResponseContext>, ChainError> {
        let result = self.handler.handle(self.context(uri, headers)).await;
        tokio::time::timeout(Duration::from_secs(5), self.lifecycle.drain())
            .await
            .expect("background work did not drain");
        result
    }
}

/// Start a programmable mock backend speaking raw HTTP/1.1.
///
/// The closure returns status, extra header lines and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<(&'static str, &'static str)>, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, headers, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            _ => "200 OK",
                        };
                        let extra: String = headers
                            .iter()
                            .map(|(name, value)| format!("{}: {}\r\n", name, value))
                            .collect();

                        let response_str = format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            extra,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
