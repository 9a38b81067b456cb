//! Partitioning the valid rows into ordered buckets by an integer column,
//! for consumers that build one graph per time window.

use reltab_core::error::{Error, Result};
use reltab_core::schema::AttrType;

use crate::table::Table;

/// Upper bound on the number of windows one call may allocate.
pub const MAX_WINDOW_BUCKETS: usize = 1 << 24;

impl Table {
    fn split_values(&self, split_attr: &str) -> Result<Vec<(usize, i64)>> {
        let c = self.col_ref_of_kind(split_attr, AttrType::Int)?;
        Ok(self
            .row_ids()
            .into_iter()
            .map(|r| (r, self.int_cols[c.index][r]))
            .collect())
    }

    /// Sliding windows `[s, s + window)` for `s = start, start + jump, ...`
    /// up to and including `end`. Missing bounds default to the column's
    /// minimum and maximum. A row can fall into several windows when
    /// `jump < window`.
    pub fn buckets_by_window(
        &self,
        split_attr: &str,
        window: i64,
        jump: i64,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Vec<Vec<usize>>> {
        if window <= 0 || jump <= 0 {
            return Err(Error::Config(format!(
                "window ({window}) and jump ({jump}) must be positive"
            )));
        }
        let values = self.split_values(split_attr)?;
        let (lo, hi) = match (
            start.or_else(|| values.iter().map(|v| v.1).min()),
            end.or_else(|| values.iter().map(|v| v.1).max()),
        ) {
            (Some(lo), Some(hi)) if lo <= hi => (lo, hi),
            _ => return Ok(Vec::new()),
        };
        // Offsets are taken in i128 so that extreme bounds cannot overflow.
        let (lo, window, jump) = (i128::from(lo), i128::from(window), i128::from(jump));
        let count = (i128::from(hi) - lo) / jump + 1;
        let count = match usize::try_from(count) {
            Ok(n) if n <= MAX_WINDOW_BUCKETS => n,
            _ => {
                return Err(Error::Config(format!(
                    "{count} windows exceed the limit of {MAX_WINDOW_BUCKETS}"
                )))
            }
        };
        let mut buckets = vec![Vec::new(); count];
        for (row, v) in values {
            let off = i128::from(v) - lo;
            if off < 0 {
                continue;
            }
            // Windows containing v start in (v - window, v].
            let first = if off < window { 0 } else { (off - window) / jump + 1 };
            let last = (off / jump).min(count as i128 - 1);
            let mut b = first;
            while b <= last {
                buckets[b as usize].push(row);
                b += 1;
            }
        }
        Ok(buckets)
    }

    /// One bucket per half-open interval `[lo, hi)`.
    pub fn buckets_by_interval(&self, split_attr: &str, intervals: &[(i64, i64)]) -> Result<Vec<Vec<usize>>> {
        let values = self.split_values(split_attr)?;
        Ok(intervals
            .iter()
            .map(|&(lo, hi)| {
                values
                    .iter()
                    .filter(|(_, v)| lo <= *v && *v < hi)
                    .map(|(r, _)| *r)
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::context::Context;
    use reltab_core::schema::Schema;
    use reltab_core::types::Value;

    fn times(ts: &[i64]) -> Table {
        let ctx = Context::new();
        let schema = Schema::try_from_pairs([("T", AttrType::Int), ("W", AttrType::Flt)]).unwrap();
        let mut t = Table::new("times", schema, &ctx).unwrap();
        for &v in ts {
            t.add_row_values(&[Value::Int(v), Value::Flt(0.0)]).unwrap();
        }
        t
    }

    #[test]
    fn tumbling_windows() {
        let t = times(&[0, 1, 5, 9, 10]);
        let b = t.buckets_by_window("T", 5, 5, None, None).unwrap();
        assert_eq!(b, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn overlapping_windows_with_bounds() {
        let t = times(&[1, 2, 3, 4, 7]);
        let b = t.buckets_by_window("T", 3, 1, Some(2), Some(4)).unwrap();
        // [2,5), [3,6), [4,7)
        assert_eq!(b, vec![vec![1, 2, 3], vec![2, 3], vec![3]]);
    }

    #[test]
    fn intervals_are_half_open() {
        let mut t = times(&[1, 2, 3, 4]);
        t.remove_row(1).unwrap();
        let b = t.buckets_by_interval("T", &[(1, 3), (3, 5), (10, 20)]).unwrap();
        assert_eq!(b, vec![vec![0], vec![2, 3], vec![]]);
    }

    #[test]
    fn bad_arguments() {
        let t = times(&[1]);
        assert!(t.buckets_by_window("T", 0, 1, None, None).is_err());
        assert!(t.buckets_by_window("W", 1, 1, None, None).is_err());
        assert!(times(&[]).buckets_by_window("T", 1, 1, None, None).unwrap().is_empty());
    }

    #[test]
    fn extreme_bounds_do_not_overflow() {
        let t = times(&[i64::MIN, -1, 0, i64::MAX]);
        let full = t.buckets_by_window("T", 10, i64::MAX, Some(i64::MIN), None).unwrap();
        assert_eq!(full.len(), 3);
        assert_eq!(full[0], vec![0]);
        assert_eq!(full[2], vec![3]);

        let wide = t.buckets_by_window("T", i64::MAX, i64::MAX, None, None).unwrap();
        assert_eq!(wide, vec![vec![0], vec![1, 2], vec![3]]);

        let err = t.buckets_by_window("T", 1, 1, None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(times(&[0, 1 << 40]).buckets_by_window("T", 1, 1, None, None).is_err());
    }
}
