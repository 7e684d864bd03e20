//! Document size report
//!
//! Streams `{"DocumentsAndSizes":[...]}` for every document whose data plus
//! metadata length exceeds `minSizeInKB` kibibytes, in `by_etag` order.
//!
//! - [`threshold`]: query parameter to byte threshold
//! - [`size`]: per-record size and the wire entry
//! - [`heartbeat`]: keep-alive whitespace for long scans
//! - [`envelope`]: incremental JSON framing
//! - [`reporter`]: the scan loop
//! - [`responder`]: validation, tracing and metrics around a scan

pub mod envelope;
pub mod errors;
pub mod heartbeat;
pub mod reporter;
pub mod responder;
pub mod size;
pub mod threshold;

pub use envelope::{JsonStreamWriter, ENTRIES_PROPERTY};
pub use errors::{ReportError, ReportResult, INVALID_REQUEST_MESSAGE, UNSUPPORTED_BACKEND_MESSAGE};
pub use heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL, HEARTBEAT_BYTE};
pub use reporter::{DocumentSizeReporter, ReporterState, ScanSummary};
pub use responder::{DocumentSizeResponder, PreparedScan};
pub use size::{estimate_size, RecordSizeEstimate, ReportEntry};
pub use threshold::{ScanRequest, MIN_SIZE_PARAM};
