//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the payment handlers
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Serve on a bound listener until the shutdown future resolves

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::payment;
use crate::payments::{PaymentDispatcher, TransactionHistory};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: PaymentDispatcher,
    pub history: Arc<TransactionHistory>,
    /// Process start, for uptime reporting.
    pub started: Instant,
}

impl AppState {
    pub fn new(dispatcher: PaymentDispatcher, history: Arc<TransactionHistory>) -> Self {
        Self {
            dispatcher,
            history,
            started: Instant::now(),
        }
    }
}

/// HTTP server for the payment API.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/payment/execute", post(payment::execute_payment))
            .route("/api/payment/batch", post(payment::execute_batch))
            .route("/api/payment/status", get(payment::status))
            .route("/api/payment/history", get(payment::history))
            .route("/api/payment/metrics", get(payment::metrics))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on `listener` until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.request_timeout_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
