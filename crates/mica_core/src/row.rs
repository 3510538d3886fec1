//! Rows and index entries flowing through the scan pipeline.

use serde::{Deserialize, Serialize};

use crate::partition::PartitionId;
use crate::value::Value;

/// A materialized row: the stored record on the fetch side, the projected
/// record on the emit side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<Value>) -> Self {
        Self { columns }
    }

    pub fn column(&self, idx: usize) -> Option<&Value> {
        self.columns.get(idx)
    }

    pub fn columns(&self) -> &[Value] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// One secondary-index entry as returned by a fetch: the indexed key, the
/// partition that stores it, and the full stored row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub partition: PartitionId,
    pub key: Value,
    pub row: Row,
}
