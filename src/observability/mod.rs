//! Observability for aerodb-docstats
//!
//! - Structured logging (JSON lines)
//! - Monotonic counters
//! - Lifecycle event tracing
//!
//! Observability is read-only: nothing here can fail an operation.
//!
//! ```ignore
//! use aerodb_docstats::observability::{Logger, Event, log_event_with_fields};
//!
//! log_event_with_fields(Event::StorageOpened, &[("engine", "esent")]);
//! Logger::warn("SLOW_CLIENT", &[("scan_id", "...")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

fn severity_of(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_of(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_of(event), event.as_str(), fields);
}
