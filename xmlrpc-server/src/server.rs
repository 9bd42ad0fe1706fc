//! HTTP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::RpcHandler;
use crate::metrics::{Metrics, METRICS_CONTENT_TYPE};
use crate::overview;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use xmlrpc_core::Registry;
use xmlrpc_protocol::DEFAULT_PORT;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Request path of the RPC endpoint.
    pub rpc_path: String,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Overview page title; `None` disables the page.
    pub overview_title: Option<String>,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("rpc_path", &self.rpc_path)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("overview_title", &self.overview_title)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            rpc_path: "/RPC2".to_string(),
            max_body_bytes: 1024 * 1024,
            overview_title: Some(String::new()),
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the server configuration from loaded settings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            rpc_path: config.rpc.path.clone(),
            max_body_bytes: config.rpc.max_body_bytes,
            overview_title: config
                .overview
                .enabled
                .then(|| config.overview.title.clone()),
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// State shared by every connection.
struct Shared {
    handler: RpcHandler,
    rpc_path: String,
    max_body_bytes: usize,
    overview: Option<Bytes>,
    metrics: Option<Arc<Metrics>>,
}

/// HTTP server for an XML-RPC registry.
pub struct Server {
    config: ServerConfig,
    shared: Arc<Shared>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, registry: Arc<Registry>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handler = RpcHandler::new(registry);
        if let Some(ref metrics) = config.metrics {
            handler = handler.with_metrics(metrics.clone());
        }
        let overview = config
            .overview_title
            .as_deref()
            .map(|title| Bytes::from(overview::render(handler.registry(), title)));
        let shared = Arc::new(Shared {
            handler,
            rpc_path: config.rpc_path.clone(),
            max_body_bytes: config.max_body_bytes,
            overview,
            metrics: config.metrics.clone(),
        });
        Self {
            config,
            shared,
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on http://{}{} ({} methods)",
            addr,
            self.config.rpc_path,
            self.shared.handler.registry().len()
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let shared = self.shared.clone();
                            let conn_shutdown = self.shutdown.subscribe();
                            tokio::spawn(async move {
                                let metrics = shared.metrics.clone();
                                Self::handle_connection(stream, peer, shared, conn_shutdown).await;
                                if let Some(metrics) = metrics {
                                    metrics.connections_active.dec();
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Serves HTTP/1.1 on one connection, draining it on shutdown.
    async fn handle_connection(
        stream: tokio::net::TcpStream,
        peer: SocketAddr,
        shared: Arc<Shared>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::debug!("Client connected: {}", peer);

        let io = TokioIo::new(stream);
        let service = service_fn(move |req| {
            let shared = shared.clone();
            async move { Ok::<_, Infallible>(route(req, shared).await) }
        });
        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        let mut draining = false;
        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!("Connection {} error: {}", peer, e);
                    }
                    break;
                }
                _ = shutdown.recv(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }

        tracing::debug!("Client disconnected: {}", peer);
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Routes a request to the endpoint, the overview page, or the side paths.
async fn route(req: Request<Incoming>, shared: Arc<Shared>) -> Response<Full<Bytes>> {
    if req.uri().path() == shared.rpc_path {
        return match *req.method() {
            Method::POST => handle_call(req, shared).await,
            Method::GET => match shared.overview {
                Some(ref page) => respond(StatusCode::OK, HTML_CONTENT_TYPE, page.clone()),
                None => not_found(),
            },
            _ => {
                let allow = if shared.overview.is_some() {
                    "GET, POST"
                } else {
                    "POST"
                };
                let mut response = respond(
                    StatusCode::METHOD_NOT_ALLOWED,
                    TEXT_CONTENT_TYPE,
                    Bytes::from_static(b"Method Not Allowed"),
                );
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(allow));
                response
            }
        };
    }

    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => match shared.metrics {
            Some(ref metrics) => match metrics.encode() {
                Ok(body) => respond(StatusCode::OK, METRICS_CONTENT_TYPE, Bytes::from(body)),
                Err(e) => {
                    tracing::error!("Failed to encode metrics: {}", e);
                    error_response(&ServerError::Metrics(e))
                }
            },
            None => not_found(),
        },
        (&Method::GET, "/health") => respond(
            StatusCode::OK,
            TEXT_CONTENT_TYPE,
            Bytes::from_static(b"OK"),
        ),
        _ => not_found(),
    }
}

/// Runs one call on a blocking thread.
async fn handle_call(req: Request<Incoming>, shared: Arc<Shared>) -> Response<Full<Bytes>> {
    let body = match read_body(req.into_body(), shared.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Rejected request body: {}", e);
            shared.handler.record_failure();
            return error_response(&e);
        }
    };

    let task_shared = shared.clone();
    let result = tokio::task::spawn_blocking(move || task_shared.handler.handle(&body)).await;

    match result {
        Ok(Ok(reply)) => respond(StatusCode::OK, reply.content_type, Bytes::from(reply.body)),
        Ok(Err(e)) => {
            if e.status().is_server_error() {
                tracing::error!("Call failed: {}", e);
            } else {
                tracing::debug!("Bad call: {}", e);
            }
            error_response(&e)
        }
        Err(join_error) => {
            shared.handler.record_failure();
            let e = ServerError::Panicked(panic_message(join_error));
            tracing::error!("{}", e);
            error_response(&e)
        }
    }
}

/// Collects a request body, enforcing the size limit.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, ServerError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ServerError::BodyTooLarge { limit })
        }
        Err(e) => Err(ServerError::InvalidBody(e.to_string())),
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn not_found() -> Response<Full<Bytes>> {
    respond(
        StatusCode::NOT_FOUND,
        TEXT_CONTENT_TYPE,
        Bytes::from_static(b"Not Found"),
    )
}

/// Client errors carry their message; server errors stay generic.
fn error_response(err: &ServerError) -> Response<Full<Bytes>> {
    let status = err.status();
    let body = if status.is_server_error() {
        Bytes::from_static(b"Internal Server Error")
    } else {
        Bytes::from(err.to_string())
    };
    respond(status, TEXT_CONTENT_TYPE, body)
}
