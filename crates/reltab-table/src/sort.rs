//! Multi-key row ordering.
//!
//! Rows are sorted as vectors of physical indices. The comparator walks the
//! keys in order and the first non-equal key decides; strings compare
//! lexicographically, floats by IEEE total order. Equal keys fall back to the
//! physical index, so every sort here is deterministic.

use std::cmp::Ordering;
use std::sync::RwLockReadGuard;

use reltab_core::context::StringPool;
use reltab_core::error::{Error, Result};
use reltab_core::schema::AttrType;

use crate::table::{ColumnRef, Table};

pub(crate) struct RowComparator<'t> {
    table: &'t Table,
    keys: Vec<ColumnRef>,
    asc: bool,
    pool: RwLockReadGuard<'t, StringPool>,
}

impl<'t> RowComparator<'t> {
    pub(crate) fn new(table: &'t Table, by: &[&str], asc: bool) -> Result<Self> {
        if by.is_empty() {
            return Err(Error::Schema("sort needs at least one key column".into()));
        }
        let keys = by
            .iter()
            .map(|name| table.col_ref(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            table,
            keys,
            asc,
            pool: table.context.read(),
        })
    }

    fn compare_key(&self, key: ColumnRef, a: usize, b: usize) -> Ordering {
        let t = self.table;
        match key.kind {
            AttrType::Int => t.int_cols[key.index][a].cmp(&t.int_cols[key.index][b]),
            AttrType::Flt => t.flt_cols[key.index][a].total_cmp(&t.flt_cols[key.index][b]),
            AttrType::Str => {
                let (ca, cb) = (t.str_cols[key.index][a], t.str_cols[key.index][b]);
                if ca == cb {
                    Ordering::Equal
                } else {
                    let sa = self.pool.get(ca).unwrap_or_default();
                    let sb = self.pool.get(cb).unwrap_or_default();
                    sa.cmp(sb)
                }
            }
        }
    }

    /// Ascending comparison on the most significant key only.
    pub(crate) fn compare_first(&self, a: usize, b: usize) -> Ordering {
        self.compare_key(self.keys[0], a, b)
    }

    /// Key comparison in the requested direction, without the tie-break.
    pub(crate) fn compare_keys(&self, a: usize, b: usize) -> Ordering {
        let ord = self
            .keys
            .iter()
            .map(|k| self.compare_key(*k, a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal);
        if self.asc {
            ord
        } else {
            ord.reverse()
        }
    }

    pub(crate) fn compare(&self, a: usize, b: usize) -> Ordering {
        self.compare_keys(a, b).then_with(|| a.cmp(&b))
    }
}

/// Quicksort with median-of-three pivots that finishes short ranges with
/// insertion sort. Recursion always goes into the smaller partition, so the
/// stack depth stays logarithmic.
pub fn hybrid_sort<F>(mut v: &mut [usize], threshold: usize, cmp: &F)
where
    F: Fn(usize, usize) -> Ordering,
{
    let threshold = threshold.max(2);
    loop {
        if v.len() < threshold {
            insertion_sort(v, cmp);
            return;
        }
        let p = partition(v, cmp);
        let whole = std::mem::take(&mut v);
        let (left, rest) = whole.split_at_mut(p);
        let right = &mut rest[1..];
        if left.len() < right.len() {
            hybrid_sort(left, threshold, cmp);
            v = right;
        } else {
            hybrid_sort(right, threshold, cmp);
            v = left;
        }
    }
}

fn partition<F>(v: &mut [usize], cmp: &F) -> usize
where
    F: Fn(usize, usize) -> Ordering,
{
    let hi = v.len() - 1;
    let mid = v.len() / 2;
    if cmp(v[mid], v[0]) == Ordering::Less {
        v.swap(0, mid);
    }
    if cmp(v[hi], v[0]) == Ordering::Less {
        v.swap(0, hi);
    }
    if cmp(v[hi], v[mid]) == Ordering::Less {
        v.swap(mid, hi);
    }
    v.swap(mid, hi);
    let pivot = v[hi];
    let mut store = 0;
    for j in 0..hi {
        if cmp(v[j], pivot) == Ordering::Less {
            v.swap(store, j);
            store += 1;
        }
    }
    v.swap(store, hi);
    store
}

pub fn insertion_sort<F>(v: &mut [usize], cmp: &F)
where
    F: Fn(usize, usize) -> Ordering,
{
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 && cmp(v[j - 1], v[j]) == Ordering::Greater {
            v.swap(j - 1, j);
            j -= 1;
        }
    }
}

impl Table {
    fn check_rows(&self, rows: &[usize]) -> Result<()> {
        rows.iter().try_for_each(|&r| self.check_row(r))
    }

    /// Sort physical row indices by the named key columns. Every index must
    /// name a valid row.
    pub fn sort_rows(&self, rows: &mut [usize], by: &[&str], asc: bool) -> Result<()> {
        self.check_rows(rows)?;
        let cmp = RowComparator::new(self, by, asc)?;
        hybrid_sort(rows, self.config.insertion_sort_threshold, &|a, b| cmp.compare(a, b));
        Ok(())
    }

    /// Insertion sort only; meant for short index lists.
    pub fn insertion_sort_rows(&self, rows: &mut [usize], by: &[&str], asc: bool) -> Result<()> {
        self.check_rows(rows)?;
        let cmp = RowComparator::new(self, by, asc)?;
        insertion_sort(rows, &|a, b| cmp.compare(a, b));
        Ok(())
    }

    /// Reorder the logical chain by `by`. With `order_col`, also write each
    /// row's 0-based position in the new order into that integer column;
    /// `reset_rank_by_msc` restarts the position whenever the first key
    /// changes value.
    pub fn order(
        &mut self,
        by: &[&str],
        order_col: Option<&str>,
        reset_rank_by_msc: bool,
        asc: bool,
    ) -> Result<()> {
        if let Some(name) = order_col {
            if let Some(c) = self.col_map.get(name) {
                if c.kind != AttrType::Int {
                    return Err(Error::Schema(format!("{name}: rank column must be int")));
                }
            }
        }
        let mut rows = self.row_ids();
        let ranks = {
            let cmp = RowComparator::new(self, by, asc)?;
            hybrid_sort(&mut rows, self.config.insertion_sort_threshold, &|a, b| {
                cmp.compare(a, b)
            });
            order_col.map(|_| {
                let mut ranks = Vec::with_capacity(rows.len());
                let mut rank = 0i64;
                for (pos, &row) in rows.iter().enumerate() {
                    if pos > 0 {
                        let restart = reset_rank_by_msc
                            && cmp.compare_first(rows[pos - 1], row) != Ordering::Equal;
                        rank = if restart { 0 } else { rank + 1 };
                    }
                    ranks.push(rank);
                }
                ranks
            })
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.name, keys = ?by, asc, rows = rows.len(), "order");
        self.relink(&rows);
        if let (Some(name), Some(ranks)) = (order_col, ranks) {
            self.store_int_col(name, &ranks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::context::Context;
    use reltab_core::schema::Schema;
    use reltab_core::types::Value;

    fn people() -> Table {
        let ctx = Context::new();
        // Intern in reverse so code order disagrees with lexicographic order.
        for s in ["zed", "bob", "amy"] {
            ctx.intern(s).unwrap();
        }
        let schema = Schema::try_from_pairs([
            ("Name", AttrType::Str),
            ("Age", AttrType::Int),
            ("Score", AttrType::Flt),
        ])
        .unwrap();
        let mut t = Table::new("p", schema, &ctx).unwrap();
        for (n, a, s) in [("bob", 30, 1.5), ("amy", 25, 2.5), ("zed", 30, 0.5), ("amy", 40, 2.5)] {
            t.add_row_values(&[Value::from(n), Value::Int(a), Value::Flt(s)]).unwrap();
        }
        t
    }

    #[test]
    fn hybrid_sort_matches_std_sort() {
        let data: Vec<i64> = (0..500).map(|i| (i * 7919) % 211).collect();
        let mut idx: Vec<usize> = (0..data.len()).collect();
        let cmp = |a: usize, b: usize| data[a].cmp(&data[b]).then(a.cmp(&b));
        hybrid_sort(&mut idx, 16, &cmp);
        let mut expected: Vec<usize> = (0..data.len()).collect();
        expected.sort_by(|a, b| cmp(*a, *b));
        assert_eq!(idx, expected);
    }

    #[test]
    fn strings_sort_lexicographically() {
        let mut t = people();
        t.order(&["Name"], None, false, true).unwrap();
        assert_eq!(t.read_str_col("Name").unwrap(), vec!["amy", "amy", "bob", "zed"]);
        // Ties keep physical order.
        assert_eq!(t.row_ids(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn multi_key_descending_with_rank() {
        let mut t = people();
        t.order(&["Age", "Score"], Some("Rank"), false, false).unwrap();
        assert_eq!(t.read_int_col("Age").unwrap(), vec![40, 30, 30, 25]);
        assert_eq!(t.read_flt_col("Score").unwrap(), vec![2.5, 1.5, 0.5, 2.5]);
        assert_eq!(t.read_int_col("Rank").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn rank_resets_on_leading_key() {
        let mut t = people();
        t.order(&["Name", "Age"], Some("Rank"), true, true).unwrap();
        assert_eq!(t.read_int_col("Rank").unwrap(), vec![0, 1, 0, 0]);
    }

    #[test]
    fn empty_keys_and_unknown_columns_fail() {
        let mut t = people();
        assert!(matches!(t.order(&[], None, false, true), Err(Error::Schema(_))));
        assert!(t.order(&["Nope"], None, false, true).is_err());
        assert_eq!(t.row_ids(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn insertion_sort_rows_on_subset() {
        let t = people();
        let mut rows = vec![2, 0, 1];
        t.insertion_sort_rows(&mut rows, &["Score"], true).unwrap();
        assert_eq!(rows, vec![2, 0, 1]);
        t.insertion_sort_rows(&mut rows, &["Age"], true).unwrap();
        assert_eq!(rows, vec![1, 0, 2]);
    }

    #[test]
    fn sorting_rejects_removed_or_missing_rows() {
        let mut t = people();
        t.remove_row(3).unwrap();
        let mut rows = vec![0, 9, 1];
        assert!(matches!(t.sort_rows(&mut rows, &["Age"], true), Err(Error::InvalidRow(9))));
        assert_eq!(rows, vec![0, 9, 1]);
        let mut rows = vec![3, 0];
        assert!(matches!(
            t.insertion_sort_rows(&mut rows, &["Age"], true),
            Err(Error::InvalidRow(3))
        ));
    }
}
