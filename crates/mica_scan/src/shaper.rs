//! Residual filtering and projection of fetched entries.

use mica_core::{IndexEntry, Predicate, Row, ScalarExpr};

/// Applies the residual predicate and the projection to each fetched entry.
///
/// The residual uses three-valued logic: only rows evaluating to True
/// survive; False and Unknown are dropped alike.
#[derive(Clone, Debug)]
pub struct RowShaper {
    residual: Option<Predicate>,
    projection: Vec<ScalarExpr>,
}

impl RowShaper {
    pub fn new(residual: Option<Predicate>, projection: Vec<ScalarExpr>) -> Self {
        Self { residual, projection }
    }

    /// Shaper that keeps every entry and projects the first `width` stored
    /// columns unchanged.
    pub fn identity(width: usize) -> Self {
        Self::new(None, (0..width).map(ScalarExpr::Column).collect())
    }

    /// `None` means the entry was filtered out.
    pub fn shape(&self, entry: &IndexEntry) -> Option<Row> {
        if let Some(residual) = &self.residual {
            if !residual.eval(&entry.row).is_true() {
                return None;
            }
        }
        Some(Row::new(self.projection.iter().map(|expr| expr.eval(&entry.row)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_core::{CompareOp, Value};

    fn entry(key: i64, tag: &str) -> IndexEntry {
        IndexEntry {
            partition: 0,
            key: Value::Int(key),
            row: Row::new(vec![Value::Int(key), Value::Str(tag.into())]),
        }
    }

    #[test]
    fn unknown_residual_drops_the_row() {
        let shaper = RowShaper::new(
            Some(Predicate::Compare {
                op: CompareOp::Gt,
                lhs: ScalarExpr::Column(0),
                rhs: ScalarExpr::Literal(Value::Null),
            }),
            vec![ScalarExpr::Column(0)],
        );
        assert!(shaper.shape(&entry(1, "a")).is_none());
    }

    #[test]
    fn projection_reorders_and_synthesizes_columns() {
        let shaper = RowShaper::new(
            None,
            vec![
                ScalarExpr::Column(1),
                ScalarExpr::Literal(Value::Bool(true)),
                ScalarExpr::Column(0),
            ],
        );
        let shaped = shaper.shape(&entry(7, "x")).expect("row survives");
        assert_eq!(
            shaped.columns(),
            &[Value::Str("x".into()), Value::Bool(true), Value::Int(7)]
        );
    }
}
