//! Scan failure taxonomy.
//!
//! Only `MissingPartition` is recovered inside the executor (by resplitting
//! along the new ownership boundary); every other kind is fatal to the scan
//! and surfaces to the driver, which decides whether the query as a whole is
//! retried.

use std::fmt;

use crate::partition::PartitionSet;

#[derive(Clone, Debug)]
pub enum ScanError {
    /// The target member no longer owns some of the requested partitions.
    MissingPartition { partitions: PartitionSet },
    /// The index definition changed under the scan; the planner must retry
    /// the query end to end.
    StaleIndexStamp { index: String, detail: String },
    /// The target member has no index by this name.
    IndexNotFound { index: String },
    /// A fetch response could not be decoded.
    Serialization { detail: String },
    /// An executor invariant was violated; this is a bug.
    Internal { detail: String },
    /// The fetch was abandoned before completion.
    Cancelled,
}

impl ScanError {
    pub fn internal(detail: impl Into<String>) -> Self {
        ScanError::Internal { detail: detail.into() }
    }

    pub fn is_missing_partition(&self) -> bool {
        matches!(self, ScanError::MissingPartition { .. })
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::MissingPartition { partitions } => {
                write!(f, "target member no longer owns partitions {partitions:?}")
            }
            ScanError::StaleIndexStamp { index, detail } => {
                write!(f, "index '{index}' changed under the scan: {detail}")
            }
            ScanError::IndexNotFound { index } => {
                write!(f, "index '{index}' does not exist on the target member")
            }
            ScanError::Serialization { detail } => {
                write!(f, "failed to decode index fetch response: {detail}")
            }
            ScanError::Internal { detail } => {
                write!(f, "internal scan invariant violated: {detail}")
            }
            ScanError::Cancelled => write!(f, "index scan cancelled"),
        }
    }
}

impl std::error::Error for ScanError {}
