//! HTTP server implementation.

use crate::{handlers, middleware, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use geocode_config::ServerConfig;
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Build the router with every gateway route
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/geocode", post(handlers::geocode))
        .route("/reverse-geocode", post(handlers::reverse_geocode))
        .route("/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/tools", get(handlers::list_tools))
        .route("/tools/:name", post(handlers::call_tool))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::logging_middleware)),
        )
        .with_state(state)
}

/// HTTP server for the gateway
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Run until Ctrl-C or SIGTERM
    ///
    /// # Errors
    /// Returns error if the server fails to start or encounters a fatal error
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves
    ///
    /// # Errors
    /// Returns error if the server fails to start
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;
        info!(address = %addr, "Server listening");

        let maintenance = tokio::spawn(maintenance_loop(self.state.clone()));
        let grace = self.config.graceful_shutdown_timeout;
        let router = create_router(self.state);

        let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
        let shutdown = async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        };
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .into_future();
        let grace_elapsed = async move {
            if signalled_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(grace).await;
        };

        let result = tokio::select! {
            result = serve => result.map_err(|e| ServerError::Serve(e.to_string())),
            () = grace_elapsed => {
                warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out, dropping open connections");
                Ok(())
            }
        };
        maintenance.abort();

        match &result {
            Ok(()) => info!("Server shutdown complete"),
            Err(e) => error!(error = %e, "Server stopped with an error"),
        }
        result
    }
}

/// Periodically sweep expired cache entries and idle rate-limit windows
async fn maintenance_loop(state: AppState) {
    let mut interval = tokio::time::interval(state.maintenance_interval.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        state.gateway.run_maintenance(state.idle_window_ttl()).await;
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),
    /// Server error during operation
    #[error("Server error: {0}")]
    Serve(String),
}

/// Resolves on Ctrl-C or SIGTERM. If a handler cannot be installed that
/// signal is ignored and the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
