//! Resumable index-traversal cursors.
//!
//! A cursor is the ordered list of key-range pointers a traversal still has
//! to visit, plus the direction. The executor treats it as an opaque resume
//! token and only ever asks whether it is terminal; the member serving a
//! fetch consumes the head pointer and returns a narrowed cursor alongside
//! the batch. A terminal cursor (no pointers left) means end of data.
//!
//! The one correctness contract the whole migration story rests on: for a
//! fixed cursor, traversal over a partition subset is deterministic, so
//! descendants of a resplit may share their parent's cursor without
//! duplicating or losing rows.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::filter::{IndexFilter, RangeBound, ScanOrder};
use crate::value::Value;

/// One contiguous key range still to visit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPointer {
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

impl KeyPointer {
    pub fn unbounded() -> Self {
        Self { lower: None, upper: None }
    }

    /// Pointer matching exactly one key.
    pub fn at(value: Value) -> Self {
        Self {
            lower: Some(RangeBound::inclusive(value.clone())),
            upper: Some(RangeBound::inclusive(value)),
        }
    }

    pub fn between(lower: Option<RangeBound>, upper: Option<RangeBound>) -> Self {
        Self { lower, upper }
    }

    /// Whether `key` falls inside this pointer's range.
    pub fn admits(&self, key: &Value) -> bool {
        if let Some(bound) = &self.lower {
            match key.total_cmp(&bound.value) {
                Ordering::Less => return false,
                Ordering::Equal if !bound.inclusive => return false,
                _ => {}
            }
        }
        if let Some(bound) = &self.upper {
            match key.total_cmp(&bound.value) {
                Ordering::Greater => return false,
                Ordering::Equal if !bound.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Whether any key can satisfy both bounds.
    pub fn is_satisfiable(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.value.total_cmp(&upper.value) {
                Ordering::Greater => false,
                Ordering::Equal => lower.inclusive && upper.inclusive,
                Ordering::Less => true,
            },
            _ => true,
        }
    }

    /// Narrow the pointer to keys strictly past `key` in scan order; `None`
    /// when nothing can remain.
    pub fn resumed_after(&self, key: &Value, order: ScanOrder) -> Option<KeyPointer> {
        let mut next = self.clone();
        match order {
            ScanOrder::Ascending => next.lower = Some(RangeBound::exclusive(key.clone())),
            ScanOrder::Descending => next.upper = Some(RangeBound::exclusive(key.clone())),
        }
        next.is_satisfiable().then_some(next)
    }
}

/// Opaque resume token for one index traversal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCursor {
    pointers: Vec<KeyPointer>,
    order: ScanOrder,
}

impl IndexCursor {
    /// Synthesize the initial cursor from an index filter: one pointer per
    /// disjoint key range, visited in scan order.
    pub fn from_filter(filter: &IndexFilter, order: ScanOrder) -> Self {
        let mut pointers = match filter {
            IndexFilter::All => vec![KeyPointer::unbounded()],
            IndexFilter::Equals(value) => vec![KeyPointer::at(value.clone())],
            IndexFilter::In(values) => {
                let mut keys = values.clone();
                keys.sort_by(Value::total_cmp);
                keys.dedup();
                keys.into_iter().map(KeyPointer::at).collect()
            }
            IndexFilter::Range { lower, upper } => {
                vec![KeyPointer::between(lower.clone(), upper.clone())]
            }
        };
        pointers.retain(KeyPointer::is_satisfiable);
        if order.is_descending() {
            pointers.reverse();
        }
        Self { pointers, order }
    }

    /// Cursor with nothing left to visit.
    pub fn terminal(order: ScanOrder) -> Self {
        Self { pointers: Vec::new(), order }
    }

    /// Resume token built from the pointers a fetch did not exhaust.
    pub fn resume(pointers: Vec<KeyPointer>, order: ScanOrder) -> Self {
        Self { pointers, order }
    }

    pub fn is_terminal(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn order(&self) -> ScanOrder {
        self.order
    }

    pub fn pointers(&self) -> &[KeyPointer] {
        &self.pointers
    }
}
