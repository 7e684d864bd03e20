//! Debug HTTP Routes
//!
//! `GET /debug/extremely-slow-top-big-documents?minSizeInKB=N`
//!
//! Full table scan, so the route is meant for operators and never for
//! request paths. The singular form is accepted as well.
//!
//! Rejections are plain text with 400 or 501. Once the scan starts the
//! status is 200 and a later failure is appended to the body as text.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::body::channel_body;
use crate::report::{DocumentSizeResponder, ReportError};

/// `Content-Type` of a report
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// `Content-Type` of every error body
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// State shared by the debug handlers
pub struct DebugState {
    pub responder: DocumentSizeResponder,
    pub stream_buffer_chunks: usize,
}

impl DebugState {
    pub fn new(responder: DocumentSizeResponder, stream_buffer_chunks: usize) -> Self {
        Self {
            responder,
            stream_buffer_chunks,
        }
    }
}

/// Create debug routes
pub fn debug_routes(state: Arc<DebugState>) -> Router {
    Router::new()
        .route("/extremely-slow-top-big-documents", get(top_big_documents_handler))
        .route("/extremely-slow-top-big-document", get(top_big_documents_handler))
        .with_state(state)
}

async fn top_big_documents_handler(
    State(state): State<Arc<DebugState>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Response {
    // An unparsable query string carries no usable threshold either.
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return plain_text(&ReportError::invalid_request(rejection.body_text()));
        }
    };

    let scan = match state.responder.prepare(&params) {
        Ok(scan) => scan,
        Err(e) => return plain_text(&e),
    };

    let (writer, body) = channel_body(state.stream_buffer_chunks);
    tokio::task::spawn_blocking(move || {
        // Outcome is logged and counted by the scan itself.
        let _ = scan.stream(writer);
    });

    (StatusCode::OK, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}

fn plain_text(err: &ReportError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], err.to_string()).into_response()
}
