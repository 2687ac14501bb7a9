use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use catalog_core::PlatformFactory;
use catalog_platform::CatalogSources;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers;
use crate::sessions::{self, SessionRegistry};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time the router-wide timeout allows past the handler deadline, so
/// remote calls time out inside handlers and render an error page.
const ROUTER_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Creates one platform handle per new session.
    pub platform: Arc<dyn PlatformFactory>,
    pub sources: Arc<CatalogSources>,
    /// Deadline for the remote work done by one request.
    pub request_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        platform: Arc<dyn PlatformFactory>,
        sources: CatalogSources,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            sessions,
            platform,
            sources: Arc::new(sources),
            request_timeout: ServerConfig::default().request_timeout,
            start_time: Instant::now(),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Build the Axum router with all routes.
///
/// Handlers bound their remote calls by `state.request_timeout`; the
/// router-wide timeout is a backstop that answers 504 a little later.
pub fn build_router(state: AppState) -> Router {
    let backstop = state.request_timeout + ROUTER_TIMEOUT_GRACE;
    Router::new()
        .route("/", get(handlers::landing))
        .route("/credentials", post(handlers::credentials))
        .route("/token", post(handlers::token))
        .route("/catalog", post(handlers::catalog))
        .route("/subscribeForm", post(handlers::subscribe_form))
        .route("/publishForm", post(handlers::publish_form))
        .route("/static/style.css", get(handlers::stylesheet))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            backstop,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Bind the listener and start serving. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    platform: Arc<dyn PlatformFactory>,
    sources: CatalogSources,
) -> Result<ServerHandle, ServerError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let sessions = Arc::new(SessionRegistry::new(config.session_ttl, config.max_sessions));
    let shutdown = CancellationToken::new();
    let sweeper = sessions::start_sweeper(
        Arc::clone(&sessions),
        config.sweep_interval,
        shutdown.clone(),
    );

    let state =
        AppState::new(platform, sources, sessions).with_request_timeout(config.request_timeout);
    let router = build_router(state.clone());

    info!(%local_addr, "catalog dashboard listening");

    let token = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        local_addr,
        state,
        shutdown,
        tasks: vec![server, sweeper],
    })
}

/// Handle returned by [`start`]; keeps the listener and sweeper alive.
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Token cancelled when the server begins shutting down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting connections, let in-flight requests finish, and stop
    /// the sweeper.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        info!(task_count = self.tasks.len(), "shutting down");

        let drain = futures::future::join_all(self.tasks);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!("shutdown timed out after {SHUTDOWN_TIMEOUT:?}, some tasks may still be running");
        }
    }
}
