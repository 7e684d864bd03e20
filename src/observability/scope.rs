//! ObservationScope for begin/complete logging around a unit of work
//!
//! - `{name}_BEGIN` on creation (INFO)
//! - `{name}_COMPLETE` on [`ObservationScope::complete`] (INFO), with `elapsed_ms`
//! - `{name}_FAILED` on [`ObservationScope::fail`] (ERROR), with `elapsed_ms`
//! - `{name}_INCOMPLETE` if dropped without either (WARN)

use std::time::Instant;

use super::logger::Logger;

/// Logs the lifecycle of one unit of work.
///
/// Fields given at creation are repeated on every line so a scan's lines can
/// be correlated by `scan_id`.
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    /// Open a scope without fields
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, Vec::new())
    }

    /// Open a scope whose fields appear on every line it logs
    pub fn with_fields(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            started: Instant::now(),
            finished: false,
        };
        Logger::info(&format!("{}_BEGIN", name), &scope.field_refs(&[]));
        scope
    }

    fn field_refs<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        self.fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(extra.iter().copied())
            .collect()
    }

    /// Milliseconds since the scope was opened
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Log `{name}_COMPLETE` with extra fields
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields = self.field_refs(extra);
        fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Log `{name}_FAILED` with a reason and extra fields
    pub fn fail(mut self, reason: &str, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields = self.field_refs(extra);
        fields.push(("elapsed_ms", &elapsed));
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            let mut fields = self.field_refs(&[]);
            fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
