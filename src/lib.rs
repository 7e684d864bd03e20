//! aerodb-docstats - large-document diagnostics for an AeroDB table
//!
//! Finds every document whose data plus metadata exceeds a threshold and
//! streams `{"DocumentsAndSizes":[{"Id":..,"Size":..}]}` while scanning.
//!
//! - [`storage`]: document table with the `by_etag` ordered scan
//! - [`report`]: threshold parsing, size estimation, streaming reporter
//! - [`http_server`]: `/debug/extremely-slow-top-big-documents`
//! - [`cli`]: init, serve, scan, put, delete
//! - [`observability`]: JSON-line logs, scan tracing, counters

pub mod cli;
pub mod http_server;
pub mod observability;
pub mod report;
pub mod storage;
