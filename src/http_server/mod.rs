//! # HTTP Server Module
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/observability/metrics` - Size report counters
//! - `/debug/extremely-slow-top-big-documents` - Streaming size report

pub mod body;
pub mod config;
pub mod debug_routes;
pub mod observability_routes;
pub mod server;

pub use body::{channel_body, ChannelWriter};
pub use config::HttpServerConfig;
pub use debug_routes::{DebugState, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
pub use server::HttpServer;
