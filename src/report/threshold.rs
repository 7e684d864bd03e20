//! # Threshold Parser
//!
//! `minSizeInKB` (kibibytes) -> byte threshold.

use std::collections::HashMap;

use super::errors::{ReportError, ReportResult};

/// Query parameter carrying the threshold
pub const MIN_SIZE_PARAM: &str = "minSizeInKB";

const BYTES_PER_KIB: u64 = 1024;

/// One size report invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    min_size_bytes: u64,
}

impl ScanRequest {
    /// Threshold given in kibibytes. `None` if it overflows `u64` bytes.
    pub fn from_kib(kib: u64) -> Option<Self> {
        kib.checked_mul(BYTES_PER_KIB)
            .map(|min_size_bytes| Self { min_size_bytes })
    }

    /// Parse the request's query parameters.
    pub fn from_query(params: &HashMap<String, String>) -> ReportResult<Self> {
        let raw = params
            .get(MIN_SIZE_PARAM)
            .ok_or_else(|| ReportError::invalid_request(format!("{} is missing", MIN_SIZE_PARAM)))?;
        Self::parse_kib(raw)
    }

    /// Parse a textual kibibyte count. Surrounding whitespace is ignored.
    pub fn parse_kib(raw: &str) -> ReportResult<Self> {
        let kib: u64 = raw.trim().parse().map_err(|e| {
            ReportError::invalid_request(format!("{} '{}' is not a non-negative integer: {}", MIN_SIZE_PARAM, raw, e))
        })?;
        Self::from_kib(kib).ok_or_else(|| {
            ReportError::invalid_request(format!("{} '{}' overflows a byte count", MIN_SIZE_PARAM, raw))
        })
    }

    pub fn min_size_bytes(&self) -> u64 {
        self.min_size_bytes
    }

    /// Strictly greater: a record exactly at the threshold is not reported.
    pub fn admits(&self, size_bytes: u64) -> bool {
        size_bytes > self.min_size_bytes
    }
}
