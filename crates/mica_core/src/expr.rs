//! Scalar expressions, predicates under three-valued logic, and row
//! comparators.
//!
//! Residual predicates follow Kleene semantics: a comparison against Null is
//! Unknown, conjunction and disjunction propagate Unknown, and only rows
//! evaluating to True survive the shaper.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::filter::ScanOrder;
use crate::row::Row;
use crate::value::Value;

/// Three-valued logic result of a predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    Unknown,
}

impl Ternary {
    pub fn is_true(self) -> bool {
        matches!(self, Ternary::True)
    }

    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::True, Ternary::True) => Ternary::True,
            _ => Ternary::Unknown,
        }
    }

    pub fn or(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::True, _) | (_, Ternary::True) => Ternary::True,
            (Ternary::False, Ternary::False) => Ternary::False,
            _ => Ternary::Unknown,
        }
    }

    pub fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Unknown => Ternary::Unknown,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value {
            Ternary::True
        } else {
            Ternary::False
        }
    }
}

/// A scalar expression over a stored row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarExpr {
    /// Reference to a column of the stored row; out-of-range reads are Null.
    Column(usize),
    Literal(Value),
}

impl ScalarExpr {
    pub fn eval(&self, row: &Row) -> Value {
        match self {
            ScalarExpr::Column(idx) => row.column(*idx).cloned().unwrap_or(Value::Null),
            ScalarExpr::Literal(value) => value.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn matches(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Boolean predicate evaluated per row by the shaper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        op: CompareOp,
        lhs: ScalarExpr,
        rhs: ScalarExpr,
    },
    IsNull(ScalarExpr),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eval(&self, row: &Row) -> Ternary {
        match self {
            Predicate::Compare { op, lhs, rhs } => {
                match lhs.eval(row).try_cmp(&rhs.eval(row)) {
                    Some(ordering) => Ternary::from(op.matches(ordering)),
                    None => Ternary::Unknown,
                }
            }
            Predicate::IsNull(expr) => Ternary::from(expr.eval(row).is_null()),
            Predicate::And(lhs, rhs) => lhs.eval(row).and(rhs.eval(row)),
            Predicate::Or(lhs, rhs) => lhs.eval(row).or(rhs.eval(row)),
            Predicate::Not(inner) => inner.eval(row).not(),
        }
    }
}

/// One component of a sort order over projected rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: usize,
    pub order: ScanOrder,
}

/// Total comparator over projected rows, used by the sorted-merge loop.
///
/// Must agree with the per-partition index order the fetches provide; the
/// executor does not verify this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowComparator {
    keys: Vec<SortKey>,
}

impl RowComparator {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn by_column(column: usize, order: ScanOrder) -> Self {
        Self::new(vec![SortKey { column, order }])
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn compare(&self, left: &Row, right: &Row) -> Ordering {
        for key in &self.keys {
            let lhs = left.column(key.column).unwrap_or(&Value::Null);
            let rhs = right.column(key.column).unwrap_or(&Value::Null);
            let mut ordering = lhs.total_cmp(rhs);
            if key.order.is_descending() {
                ordering = ordering.reverse();
            }
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
