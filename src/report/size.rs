//! # Size Estimator

use serde::{Deserialize, Serialize};

/// Reportable size of one record: data column plus metadata column.
///
/// An absent column counts as zero, for either column.
pub fn estimate_size(data_len: Option<u64>, metadata_len: Option<u64>) -> u64 {
    data_len
        .unwrap_or(0)
        .saturating_add(metadata_len.unwrap_or(0))
}

/// Size computed for one record during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSizeEstimate {
    pub identifier: String,
    pub size_bytes: u64,
}

/// One element of the `DocumentsAndSizes` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportEntry {
    pub id: String,
    pub size: u64,
}

impl From<RecordSizeEstimate> for ReportEntry {
    fn from(estimate: RecordSizeEstimate) -> Self {
        Self {
            id: estimate.identifier,
            size: estimate.size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_of_both_columns() {
        assert_eq!(estimate_size(Some(1000), Some(500)), 1500);
    }

    #[test]
    fn test_absent_columns_count_as_zero() {
        assert_eq!(estimate_size(None, Some(12)), 12);
        assert_eq!(estimate_size(Some(12), None), 12);
        assert_eq!(estimate_size(None, None), 0);
    }

    #[test]
    fn test_saturates_instead_of_wrapping() {
        assert_eq!(estimate_size(Some(u64::MAX), Some(1)), u64::MAX);
    }

    #[test]
    fn test_entry_wire_names() {
        let entry = ReportEntry::from(RecordSizeEstimate {
            identifier: "users/1".to_string(),
            size_bytes: 2048,
        });
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"Id":"users/1","Size":2048}"#
        );
    }
}
