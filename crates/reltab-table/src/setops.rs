//! Set algebra under full-row equality.
//!
//! Two rows are equal when every column agrees; strings compare by interned
//! code, translated into a common context first when the tables do not
//! share one. All operations require equal schemas.

use std::collections::HashSet;

use reltab_core::error::Result;
use reltab_core::schema::AttrType;

use crate::group::GroupKey;
use crate::table::Table;

impl Table {
    /// Full-row key with string codes expressed in `target`'s context. A
    /// string unknown to `target` gets code -1, which matches nothing there.
    /// `skip` is the type-local index of the int column left out of the key
    /// (the permanent-id column).
    fn full_row_key(&self, row: usize, target: &Table, skip: Option<usize>) -> Result<GroupKey> {
        let mut ints: Vec<i64> = self
            .int_cols
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, c)| c[row])
            .collect();
        if self.context.same_as(&target.context) {
            ints.extend(self.str_cols.iter().map(|c| i64::from(c[row].get())));
        } else {
            let pool = self.context.read();
            for c in &self.str_cols {
                let s = pool.resolve(c[row])?;
                ints.push(target.context.lookup(s).map_or(-1, |code| i64::from(code.get())));
            }
        }
        Ok(GroupKey {
            ints,
            flts: self.flt_cols.iter().map(|c| c[row]).collect(),
        })
    }

    /// Id column excluded when comparing rows of `self` and `other`. Either
    /// side tracking ids is enough; the schemas are equal, so the index is
    /// the same in both.
    fn shared_id_index(&self, other: &Table) -> Option<usize> {
        self.id_col_index().or_else(|| {
            other
                .id_col
                .as_deref()
                .and_then(|n| self.col_map.get(n))
                .filter(|c| c.kind == AttrType::Int)
                .map(|c| c.index)
        })
    }

    fn key_set(&self, target: &Table, skip: Option<usize>) -> Result<HashSet<GroupKey>> {
        self.row_ids()
            .into_iter()
            .map(|r| self.full_row_key(r, target, skip))
            .collect()
    }

    /// Rows of `self` (logical order) that have a full-row match in `other`.
    pub fn get_colliding_rows(&self, other: &Table) -> Result<Vec<usize>> {
        self.check_compatible(other)?;
        let skip = self.shared_id_index(other);
        let theirs = other.key_set(self, skip)?;
        let mut out = Vec::new();
        for r in self.row_ids() {
            if theirs.contains(&self.full_row_key(r, self, skip)?) {
                out.push(r);
            }
        }
        Ok(out)
    }

    /// Append `other` and renumber permanent ids.
    pub fn union_all_in_place(&mut self, other: &Table) -> Result<()> {
        self.concat_table(other)
    }

    /// Rows of both tables, duplicates kept.
    pub fn union_all(&self, other: &Table, name: &str) -> Result<Table> {
        self.check_compatible(other)?;
        let mut out = self.empty_like(name);
        out.add_table(self)?;
        out.add_table(other)?;
        out.reindex()?;
        Ok(out)
    }

    /// Rows of both tables without full-row duplicates; the first occurrence
    /// is kept.
    pub fn union(&self, other: &Table, name: &str) -> Result<Table> {
        let skip = self.shared_id_index(other);
        let mut out = self.union_all(other, name)?;
        let mut seen = HashSet::new();
        let mut keep = vec![false; out.num_rows()];
        for r in out.row_ids() {
            keep[r] = seen.insert(out.full_row_key(r, &out, skip)?);
        }
        out.retain_where(|r| keep[r]);
        out.defrag();
        out.reindex()?;
        Ok(out)
    }

    /// Rows of `self` that also occur in `other`.
    pub fn intersection(&self, other: &Table, name: &str) -> Result<Table> {
        let rows = self.get_colliding_rows(other)?;
        let mut out = Table::from_row_ids(self, name, &rows)?;
        out.reindex()?;
        Ok(out)
    }

    /// Rows of `self` that do not occur in `other`.
    pub fn minus(&self, other: &Table, name: &str) -> Result<Table> {
        let hits: HashSet<usize> = self.get_colliding_rows(other)?.into_iter().collect();
        let rows: Vec<usize> = self.row_ids().into_iter().filter(|r| !hits.contains(r)).collect();
        let mut out = Table::from_row_ids(self, name, &rows)?;
        out.reindex()?;
        Ok(out)
    }
}
