//! Structured index filters and scan direction.
//!
//! A filter narrows the index traversal to a key range, an exact key, or a
//! disjunction of exact keys. It is consumed once, at scan open, to seed the
//! resumable cursor; residual predicates that the index cannot answer are
//! applied per row by the shaper.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Direction of the index traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOrder {
    Ascending,
    Descending,
}

impl ScanOrder {
    pub fn is_descending(self) -> bool {
        matches!(self, ScanOrder::Descending)
    }
}

/// One end of a key range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBound {
    pub value: Value,
    pub inclusive: bool,
}

impl RangeBound {
    pub fn inclusive(value: Value) -> Self {
        Self { value, inclusive: true }
    }

    pub fn exclusive(value: Value) -> Self {
        Self { value, inclusive: false }
    }
}

/// Structured description of the index key ranges a scan should visit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexFilter {
    /// Full index traversal.
    All,
    /// Exactly one key.
    Equals(Value),
    /// A disjunction of exact keys.
    In(Vec<Value>),
    /// A contiguous key range; either bound may be open.
    Range {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
}
