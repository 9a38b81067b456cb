//! Hash grouping by composite keys.
//!
//! A `GroupKey` carries the integer-like components (ints and interned
//! string codes) and the float components of a row's group-by values. Rows
//! with equal keys share a group; group ids are dense and follow either
//! first-seen logical order or a stable blake3 hash order.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use reltab_core::error::Result;
use reltab_core::hash::{canonical_bits, hash_key};
use reltab_core::id::{GroupId, StrCode};
use reltab_core::schema::{AttrType, Schema};

use crate::table::{ColumnRef, Table};

#[derive(Debug, Clone, Default)]
pub struct GroupKey {
    pub ints: Vec<i64>,
    pub flts: Vec<f64>,
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.ints == other.ints
            && self.flts.len() == other.flts.len()
            && self
                .flts
                .iter()
                .zip(&other.flts)
                .all(|(a, b)| canonical_bits(*a) == canonical_bits(*b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ints.hash(state);
        for f in &self.flts {
            canonical_bits(*f).hash(state);
        }
    }
}

/// Float bucket key compared by bit pattern, `-0.0 == 0.0`.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        canonical_bits(self.0) == canonical_bits(other.0)
    }
}

impl Eq for FloatKey {}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_bits(self.0).hash(state);
    }
}

/// Result of grouping: group id -> key, key -> member rows (logical order).
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    keys: Vec<GroupKey>,
    rows: HashMap<GroupKey, Vec<usize>>,
}

impl Grouping {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, id: GroupId) -> Option<&GroupKey> {
        self.keys.get(id.get() as usize)
    }

    pub fn rows_of_key(&self, key: &GroupKey) -> Option<&[usize]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn members(&self, id: GroupId) -> &[usize] {
        self.key(id)
            .and_then(|k| self.rows_of_key(k))
            .unwrap_or_default()
    }

    /// Groups in id order.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &GroupKey, &[usize])> + '_ {
        self.keys.iter().enumerate().map(move |(id, key)| {
            let rows = self.rows.get(key).map(Vec::as_slice).unwrap_or_default();
            (GroupId::new(id as u64), key, rows)
        })
    }

    /// Physical row to group id, sized to `num_rows` slots.
    pub(crate) fn ids_by_row(&self, num_rows: usize) -> Vec<Option<GroupId>> {
        let mut out = vec![None; num_rows];
        for (id, _, rows) in self.iter() {
            for &r in rows {
                out[r] = Some(id);
            }
        }
        out
    }
}

type CacheKey = (Vec<ColumnRef>, bool);

/// Memoized groupings keyed by (resolved group-by columns, ordered flag), so
/// a label and the column it names share one entry.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupCache {
    entries: HashMap<CacheKey, Grouping>,
}

impl GroupCache {
    pub(crate) fn get(&self, cols: &[ColumnRef], ordered: bool) -> Option<&Grouping> {
        let key: CacheKey = (cols.to_vec(), ordered);
        self.entries.get(&key)
    }

    pub(crate) fn insert(&mut self, cols: &[ColumnRef], ordered: bool, grouping: Grouping) {
        self.entries.insert((cols.to_vec(), ordered), grouping);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn invalidate_column(&mut self, col: ColumnRef) {
        self.entries.retain(|(cols, _), _| !cols.contains(&col));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Table {
    pub(crate) fn group_key(&self, keys: &[ColumnRef], row: usize) -> GroupKey {
        let mut key = GroupKey::default();
        for c in keys {
            match c.kind {
                AttrType::Int => key.ints.push(self.int_cols[c.index][row]),
                AttrType::Str => key.ints.push(i64::from(self.str_cols[c.index][row].get())),
                AttrType::Flt => key.flts.push(self.flt_cols[c.index][row]),
            }
        }
        key
    }

    /// Group the valid rows without touching the cache.
    pub fn grouping(&self, cols: &[&str], ordered: bool) -> Result<Grouping> {
        let keys = self.group_refs(cols)?;
        Ok(self.grouping_of(&keys, ordered))
    }

    fn group_refs(&self, cols: &[&str]) -> Result<Vec<ColumnRef>> {
        cols.iter().map(|c| self.col_ref(c)).collect()
    }

    fn grouping_of(&self, keys: &[ColumnRef], ordered: bool) -> Grouping {
        let mut seen: Vec<GroupKey> = Vec::new();
        let mut rows: HashMap<GroupKey, Vec<usize>> = HashMap::new();
        for row in self.row_ids() {
            let key = self.group_key(keys, row);
            match rows.get_mut(&key) {
                Some(members) => members.push(row),
                None => {
                    seen.push(key.clone());
                    rows.insert(key, vec![row]);
                }
            }
        }
        if !ordered {
            // First-seen position breaks hash collisions.
            let mut by_hash: Vec<(u64, usize)> = seen
                .iter()
                .enumerate()
                .map(|(i, k)| (hash_key(&k.ints, &k.flts), i))
                .collect();
            by_hash.sort_unstable();
            seen = by_hash.into_iter().map(|(_, i)| seen[i].clone()).collect();
        }
        Grouping { keys: seen, rows }
    }

    /// Group the valid rows, reusing a cached result for the same columns.
    pub fn group_rows(&mut self, cols: &[&str], ordered: bool) -> Result<Grouping> {
        let keys = self.group_refs(cols)?;
        if let Some(hit) = self.group_cache.get(&keys, ordered) {
            return Ok(hit.clone());
        }
        let grouping = self.grouping_of(&keys, ordered);
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.name, cols = ?cols, groups = grouping.len(), "group");
        self.group_cache.insert(&keys, ordered, grouping.clone());
        Ok(grouping)
    }

    pub fn group_cache_len(&self) -> usize {
        self.group_cache.len()
    }

    /// Write each row's group id into integer column `group_col`.
    pub fn group(&mut self, cols: &[&str], group_col: &str, ordered: bool) -> Result<()> {
        let grouping = self.group_rows(cols, ordered)?;
        let ids = grouping.ids_by_row(self.num_rows());
        let values: Vec<i64> = self
            .row_ids()
            .into_iter()
            .map(|r| ids[r].map_or(-1, GroupId::as_i64))
            .collect();
        self.store_int_col(group_col, &values)
    }

    fn scoped_rows(&self, index_set: &[usize], all: bool) -> Vec<usize> {
        if all {
            self.row_ids()
        } else {
            index_set
                .iter()
                .copied()
                .filter(|r| self.is_row_valid(*r))
                .collect()
        }
    }

    /// Bucket rows by one integer column. With `all` every valid row is
    /// bucketed, otherwise only the valid rows of `index_set`.
    pub fn group_by_int_col(
        &self,
        col: &str,
        index_set: &[usize],
        all: bool,
    ) -> Result<HashMap<i64, Vec<usize>>> {
        let c = self.col_ref_of_kind(col, AttrType::Int)?;
        let mut out: HashMap<i64, Vec<usize>> = HashMap::new();
        for r in self.scoped_rows(index_set, all) {
            out.entry(self.int_cols[c.index][r]).or_default().push(r);
        }
        Ok(out)
    }

    pub fn group_by_flt_col(
        &self,
        col: &str,
        index_set: &[usize],
        all: bool,
    ) -> Result<HashMap<FloatKey, Vec<usize>>> {
        let c = self.col_ref_of_kind(col, AttrType::Flt)?;
        let mut out: HashMap<FloatKey, Vec<usize>> = HashMap::new();
        for r in self.scoped_rows(index_set, all) {
            out.entry(FloatKey(self.flt_cols[c.index][r])).or_default().push(r);
        }
        Ok(out)
    }

    pub fn group_by_str_col(
        &self,
        col: &str,
        index_set: &[usize],
        all: bool,
    ) -> Result<HashMap<StrCode, Vec<usize>>> {
        let c = self.col_ref_of_kind(col, AttrType::Str)?;
        let mut out: HashMap<StrCode, Vec<usize>> = HashMap::new();
        for r in self.scoped_rows(index_set, all) {
            out.entry(self.str_cols[c.index][r]).or_default().push(r);
        }
        Ok(out)
    }

    /// Keep the first row of each distinct value of `col`.
    pub fn unique(&mut self, col: &str) -> Result<()> {
        self.unique_cols(&[col], true)
    }

    /// Keep the first row (logical order) of each distinct key over `cols`.
    pub fn unique_cols(&mut self, cols: &[&str], ordered: bool) -> Result<()> {
        let grouping = self.group_rows(cols, ordered)?;
        let mut keep = vec![false; self.num_rows()];
        for (_, _, rows) in grouping.iter() {
            if let Some(&first) = rows.first() {
                keep[first] = true;
            }
        }
        #[cfg(feature = "tracing")]
        let before = self.valid_rows;
        self.retain_where(|r| keep[r]);
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.name, before, after = self.valid_rows, "unique");
        Ok(())
    }

    /// Per-row frequency of the row's value in `col`, stored in `count_col`.
    pub fn count(&mut self, count_col: &str, col: &str) -> Result<()> {
        let grouping = self.group_rows(&[col], true)?;
        let mut sizes = vec![0i64; self.num_rows()];
        for (_, _, rows) in grouping.iter() {
            for &r in rows {
                sizes[r] = rows.len() as i64;
            }
        }
        let values: Vec<i64> = self.row_ids().into_iter().map(|r| sizes[r]).collect();
        self.store_int_col(count_col, &values)
    }

    /// Two-column table of the distinct values of `col` (first-seen order)
    /// and how often each occurs, in column `Count`.
    pub fn frequency_table(&self, col: &str, name: &str) -> Result<Table> {
        let c = self.col_ref(col)?;
        let grouping = self.grouping(&[col], true)?;
        let schema = Schema::try_from_pairs([(col, c.kind), ("Count", AttrType::Int)])?;
        let mut out = Table::with_config(name, schema, &self.context, self.config.clone())?;
        for (_, _, rows) in grouping.iter() {
            let (first, n) = (rows[0], rows.len() as i64);
            match c.kind {
                AttrType::Int => {
                    out.push_row_parts(&[self.int_cols[c.index][first], n], &[], &[]);
                }
                AttrType::Flt => {
                    out.push_row_parts(&[n], &[self.flt_cols[c.index][first]], &[]);
                }
                AttrType::Str => {
                    out.push_row_parts(&[n], &[], &[self.str_cols[c.index][first]]);
                }
            }
        }
        Ok(out)
    }

    /// One independent table per group, named `<name>_<group id>`.
    pub fn splice_by_group(&mut self, cols: &[&str], ordered: bool) -> Result<Vec<Table>> {
        let grouping = self.group_rows(cols, ordered)?;
        grouping
            .iter()
            .map(|(id, _, rows)| {
                Table::from_row_ids(self, format!("{}_{}", self.name, id.get()), rows)
            })
            .collect()
    }
}
