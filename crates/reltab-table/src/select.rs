//! Selection and classification.
//!
//! Every variant evaluates the whole table first and only then mutates it,
//! so a failing bind leaves the table untouched.

use reltab_core::error::Result;
use reltab_core::types::Value;

use crate::predicate::{CompareOp, Predicate};
use crate::table::Table;

impl Table {
    fn matching_rows(&self, pred: &Predicate) -> Result<Vec<usize>> {
        let bound = pred.bind(self)?;
        let pool = self.context.read();
        Ok(self
            .row_ids()
            .into_iter()
            .filter(|&r| bound.eval(self, &pool, r))
            .collect())
    }

    /// Physical indices of the rows satisfying `pred`, in logical order.
    /// With `remove`, every other row is logically removed.
    pub fn select(&mut self, pred: &Predicate, remove: bool) -> Result<Vec<usize>> {
        let selected = self.matching_rows(pred)?;
        if remove {
            let mut keep = vec![false; self.num_rows()];
            for &r in &selected {
                keep[r] = true;
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(
                table = %self.name,
                before = self.valid_rows,
                after = selected.len(),
                "select"
            );
            self.retain_where(|r| keep[r]);
        }
        Ok(selected)
    }

    /// Write `pos` into integer column `label` for rows satisfying `pred`
    /// and `neg` for the others. No rows are removed.
    pub fn classify(&mut self, pred: &Predicate, label: &str, pos: i64, neg: i64) -> Result<()> {
        let bound = pred.bind(self)?;
        let labels: Vec<i64> = {
            let pool = self.context.read();
            self.row_ids()
                .into_iter()
                .map(|r| if bound.eval(self, &pool, r) { pos } else { neg })
                .collect()
        };
        self.store_int_col(label, &labels)
    }

    /// `col1 op col2` selection.
    pub fn select_atomic(&mut self, col1: &str, col2: &str, op: CompareOp, remove: bool) -> Result<Vec<usize>> {
        self.select(&Predicate::cols(col1, op, col2), remove)
    }

    pub fn select_atomic_int_const(&mut self, col: &str, val: i64, op: CompareOp, remove: bool) -> Result<Vec<usize>> {
        self.select(&Predicate::lit(col, op, val), remove)
    }

    pub fn select_atomic_flt_const(&mut self, col: &str, val: f64, op: CompareOp, remove: bool) -> Result<Vec<usize>> {
        self.select(&Predicate::lit(col, op, val), remove)
    }

    pub fn select_atomic_str_const(&mut self, col: &str, val: &str, op: CompareOp, remove: bool) -> Result<Vec<usize>> {
        self.select(&Predicate::lit(col, op, Value::from(val)), remove)
    }

    pub fn classify_atomic(&mut self, col1: &str, col2: &str, op: CompareOp, label: &str, pos: i64, neg: i64) -> Result<()> {
        self.classify(&Predicate::cols(col1, op, col2), label, pos, neg)
    }

    pub fn classify_atomic_int_const(&mut self, col: &str, val: i64, op: CompareOp, label: &str, pos: i64, neg: i64) -> Result<()> {
        self.classify(&Predicate::lit(col, op, val), label, pos, neg)
    }

    pub fn classify_atomic_flt_const(&mut self, col: &str, val: f64, op: CompareOp, label: &str, pos: i64, neg: i64) -> Result<()> {
        self.classify(&Predicate::lit(col, op, val), label, pos, neg)
    }

    pub fn classify_atomic_str_const(&mut self, col: &str, val: &str, op: CompareOp, label: &str, pos: i64, neg: i64) -> Result<()> {
        self.classify(&Predicate::lit(col, op, Value::from(val)), label, pos, neg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::context::Context;
    use reltab_core::error::Error;
    use reltab_core::schema::{AttrType, Schema};

    fn xyz() -> Table {
        let ctx = Context::new();
        let schema = Schema::try_from_pairs([
            ("A", AttrType::Int),
            ("B", AttrType::Str),
            ("C", AttrType::Int),
        ])
        .unwrap();
        let mut t = Table::new("t", schema, &ctx).unwrap();
        for (a, b, c) in [(1, "x", 3), (2, "y", 2), (3, "z", 1)] {
            t.add_row_values(&[Value::Int(a), Value::from(b), Value::Int(c)]).unwrap();
        }
        t
    }

    #[test]
    fn select_with_remove() {
        let mut t = xyz();
        let hits = t.select(&Predicate::lit("A", CompareOp::Gt, 1i64), true).unwrap();
        assert_eq!(hits, vec![1, 2]);
        assert_eq!(t.read_int_col("A").unwrap(), vec![2, 3]);
        assert_eq!(t.read_str_col("B").unwrap(), vec!["y", "z"]);
    }

    #[test]
    fn select_without_remove_leaves_rows() {
        let mut t = xyz();
        let pred = Predicate::lit("B", CompareOp::Eq, "x").or(Predicate::cols("A", CompareOp::Gt, "C"));
        assert_eq!(t.select(&pred, false).unwrap(), vec![0, 2]);
        assert_eq!(t.num_valid_rows(), 3);
    }

    #[test]
    fn kind_mismatch_fails_before_mutation() {
        let mut t = xyz();
        let err = t.select(&Predicate::lit("A", CompareOp::Gt, 1.0), true).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(t.select_atomic("A", "B", CompareOp::Eq, true).is_err());
        assert_eq!(t.num_valid_rows(), 3);
    }

    #[test]
    fn classify_writes_labels() {
        let mut t = xyz();
        t.classify(&Predicate::lit("C", CompareOp::Gte, 2i64).not(), "Low", 1, 0).unwrap();
        assert_eq!(t.read_int_col("Low").unwrap(), vec![0, 0, 1]);
        t.classify_atomic_str_const("B", "y", CompareOp::Neq, "NotY", 7, -7).unwrap();
        assert_eq!(t.read_int_col("NotY").unwrap(), vec![7, -7, 7]);
    }

    #[test]
    fn atomic_fast_paths() {
        let mut t = xyz();
        assert_eq!(t.select_atomic("A", "C", CompareOp::Eq, false).unwrap(), vec![1]);
        assert_eq!(t.select_atomic_str_const("B", "xyz", CompareOp::Substr, false).unwrap(), vec![0, 1, 2]);
        t.select_atomic_int_const("A", 3, CompareOp::Lt, true).unwrap();
        assert_eq!(t.num_valid_rows(), 2);
    }
}
