//! # HTTP Server
//!
//! Combines the health, observability and debug routers.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::config::HttpServerConfig;
use super::debug_routes::{debug_routes, DebugState};
use super::observability_routes::{health_routes, observability_routes};
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::report::DocumentSizeResponder;

/// HTTP server exposing the size report
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn with_config(config: HttpServerConfig, responder: DocumentSizeResponder) -> Self {
        let router = Self::build_router(&config, responder);
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, responder: DocumentSizeResponder) -> Router {
        let metrics = Arc::clone(responder.metrics());
        let debug_state = Arc::new(DebugState::new(responder, config.stream_buffer_chunks));

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .nest("/observability", observability_routes(metrics))
            .nest("/debug", debug_routes(debug_state))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C.
    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid socket address '{}': {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?.to_string();
        log_event_with_fields(Event::Serving, &[("addr", &bound)]);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        log_event(Event::ShutdownComplete);
        Ok(())
    }
}
