//! Storage and row lifecycle.
//!
//! Column data lives in three sets of dense arrays, one per attribute kind,
//! addressed by a type-local column index. The type-local index of a column
//! is always its rank among same-kind columns in schema order, so two tables
//! with equal schemas have identical column layouts.
//!
//! Logical row order is a singly-linked chain over physical slots: `next[r]`
//! points at the following logical row, ends the chain, or marks `r` as
//! removed. Removal only unlinks; the stale column data stays in place until
//! an explicit `defrag`.

use std::collections::HashMap;

use reltab_core::config::TableConfig;
use reltab_core::context::Context;
use reltab_core::error::{Error, Result};
use reltab_core::id::StrCode;
use reltab_core::schema::{AttrType, Field, Schema};
use reltab_core::types::{RowBuffer, Value};

use crate::graph::GraphHints;
use crate::group::GroupCache;

/// Entry of the logical-order chain for one physical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Next(usize),
    End,
    Removed,
}

impl Link {
    pub(crate) fn from_index(next: Option<usize>) -> Self {
        match next {
            Some(r) => Link::Next(r),
            None => Link::End,
        }
    }

    pub(crate) fn as_index(self) -> Option<usize> {
        match self {
            Link::Next(r) => Some(r),
            Link::End | Link::Removed => None,
        }
    }
}

/// Where a named column lives: its kind and type-local index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub kind: AttrType,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) name: String,
    pub(crate) context: Context,
    pub(crate) config: TableConfig,
    pub(crate) schema: Schema,
    pub(crate) int_cols: Vec<Vec<i64>>,
    pub(crate) flt_cols: Vec<Vec<f64>>,
    pub(crate) str_cols: Vec<Vec<StrCode>>,
    /// Column names (schema names plus labels) to storage location.
    pub(crate) col_map: HashMap<String, ColumnRef>,
    pub(crate) next: Vec<Link>,
    pub(crate) first_valid: Option<usize>,
    pub(crate) last_valid: Option<usize>,
    pub(crate) valid_rows: usize,
    pub(crate) capacity: usize,
    pub(crate) id_col: Option<String>,
    pub(crate) row_id_map: HashMap<i64, usize>,
    pub(crate) group_cache: GroupCache,
    pub(crate) graph: GraphHints,
}

/// Translates string codes of one context into another, interning on miss.
pub(crate) struct CodeMapper {
    src: Context,
    dst: Context,
    same: bool,
    cache: HashMap<StrCode, StrCode>,
}

impl CodeMapper {
    /// Holds its own handles so the destination table can be mutated while
    /// the mapper is alive.
    pub(crate) fn new(src: &Context, dst: &Context) -> Self {
        Self {
            src: src.clone(),
            dst: dst.clone(),
            same: src.same_as(dst),
            cache: HashMap::new(),
        }
    }

    pub(crate) fn map(&mut self, code: StrCode) -> Result<StrCode> {
        if self.same {
            return Ok(code);
        }
        if let Some(mapped) = self.cache.get(&code) {
            return Ok(*mapped);
        }
        let s = self.src.resolve(code)?;
        let mapped = self.dst.intern(&s)?;
        self.cache.insert(code, mapped);
        Ok(mapped)
    }
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Schema, context: &Context) -> Result<Self> {
        Self::with_config(name, schema, context, TableConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        schema: Schema,
        context: &Context,
        config: TableConfig,
    ) -> Result<Self> {
        schema.validate()?;
        config.validate()?;
        let mut table = Self::from_validated(name.into(), schema, context.clone(), config);
        let reserve = table.config.initial_capacity;
        if reserve > 0 {
            table.reserve_rows(reserve);
        }
        Ok(table)
    }

    pub(crate) fn from_validated(
        name: String,
        schema: Schema,
        context: Context,
        config: TableConfig,
    ) -> Self {
        let mut table = Self {
            name,
            context,
            config,
            schema: Schema::default(),
            int_cols: Vec::new(),
            flt_cols: Vec::new(),
            str_cols: Vec::new(),
            col_map: HashMap::new(),
            next: Vec::new(),
            first_valid: None,
            last_valid: None,
            valid_rows: 0,
            capacity: 0,
            id_col: None,
            row_id_map: HashMap::new(),
            group_cache: GroupCache::default(),
            graph: GraphHints::default(),
        };
        for field in schema.fields {
            table.push_column_storage(field, 0);
        }
        table
    }

    /// An empty table with this table's schema, context, config and graph
    /// hints.
    pub(crate) fn empty_like(&self, name: impl Into<String>) -> Self {
        let mut out = Self::from_validated(
            name.into(),
            self.schema.clone(),
            self.context.clone(),
            self.config.clone(),
        );
        out.graph = self.graph.clone();
        out.id_col = self.id_col.clone();
        out
    }

    /// Two-column table `(key_col: Int, val_col: Int)` from key/value pairs.
    /// With `str_keys` the keys are string codes of `context` and the key
    /// column is String-typed.
    pub fn from_int_pairs<I>(
        name: impl Into<String>,
        pairs: I,
        key_col: &str,
        val_col: &str,
        context: &Context,
        str_keys: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut table = Self::pair_table(name, key_col, val_col, AttrType::Int, context, str_keys)?;
        for (k, v) in pairs {
            if str_keys {
                let code = table.checked_code(k)?;
                table.push_row_parts(&[v], &[], &[code]);
            } else {
                table.push_row_parts(&[k, v], &[], &[]);
            }
        }
        Ok(table)
    }

    /// Two-column table `(key_col: Int, val_col: Float)` from key/value pairs.
    pub fn from_flt_pairs<I>(
        name: impl Into<String>,
        pairs: I,
        key_col: &str,
        val_col: &str,
        context: &Context,
        str_keys: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        let mut table = Self::pair_table(name, key_col, val_col, AttrType::Flt, context, str_keys)?;
        for (k, v) in pairs {
            if str_keys {
                let code = table.checked_code(k)?;
                table.push_row_parts(&[], &[v], &[code]);
            } else {
                table.push_row_parts(&[k], &[v], &[]);
            }
        }
        Ok(table)
    }

    /// `from_int_pairs` followed by `init_ids`.
    pub fn table_from_int_pairs<I>(
        name: impl Into<String>,
        pairs: I,
        key_col: &str,
        val_col: &str,
        context: &Context,
        str_keys: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut table = Self::from_int_pairs(name, pairs, key_col, val_col, context, str_keys)?;
        table.init_ids()?;
        Ok(table)
    }

    /// `from_flt_pairs` followed by `init_ids`.
    pub fn table_from_flt_pairs<I>(
        name: impl Into<String>,
        pairs: I,
        key_col: &str,
        val_col: &str,
        context: &Context,
        str_keys: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        let mut table = Self::from_flt_pairs(name, pairs, key_col, val_col, context, str_keys)?;
        table.init_ids()?;
        Ok(table)
    }

    fn pair_table(
        name: impl Into<String>,
        key_col: &str,
        val_col: &str,
        val_kind: AttrType,
        context: &Context,
        str_keys: bool,
    ) -> Result<Self> {
        let key_kind = if str_keys { AttrType::Str } else { AttrType::Int };
        let schema = Schema::try_from_pairs([(key_col, key_kind), (val_col, val_kind)])?;
        Self::new(name, schema, context)
    }

    fn checked_code(&self, raw: i64) -> Result<StrCode> {
        let code = u32::try_from(raw)
            .map(StrCode::new)
            .map_err(|_| Error::Schema(format!("{raw} is not a string code")))?;
        self.context.resolve(code)?;
        Ok(code)
    }

    /// Copy of the given rows, in the given order, as a fresh compact table.
    pub fn from_row_ids(src: &Table, name: impl Into<String>, row_ids: &[usize]) -> Result<Self> {
        for &row in row_ids {
            src.check_row(row)?;
        }
        let mut out = src.empty_like(name);
        out.reserve_rows(row_ids.len());
        for &row in row_ids {
            out.push_physical_copy(src, row);
        }
        out.rebuild_id_map();
        Ok(out)
    }

    /// Full copy under a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut out = self.clone();
        out.name = name.into();
        out
    }

    fn push_column_storage(&mut self, field: Field, fill_rows: usize) -> ColumnRef {
        let cref = match field.kind {
            AttrType::Int => {
                self.int_cols.push(vec![0; fill_rows]);
                ColumnRef {
                    kind: AttrType::Int,
                    index: self.int_cols.len() - 1,
                }
            }
            AttrType::Flt => {
                self.flt_cols.push(vec![0.0; fill_rows]);
                ColumnRef {
                    kind: AttrType::Flt,
                    index: self.flt_cols.len() - 1,
                }
            }
            AttrType::Str => {
                // Filled with the code of "" by `add_col`.
                self.str_cols.push(vec![StrCode::new(0); fill_rows]);
                ColumnRef {
                    kind: AttrType::Str,
                    index: self.str_cols.len() - 1,
                }
            }
        };
        self.col_map.insert(field.name.clone(), cref);
        self.schema.fields.push(field);
        cref
    }

    /* ----- basic getters ----- */

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// All physical slots ever allocated, valid or removed.
    pub fn num_rows(&self) -> usize {
        self.next.len()
    }

    pub fn num_valid_rows(&self) -> usize {
        self.valid_rows
    }

    pub fn first_valid_row(&self) -> Option<usize> {
        self.first_valid
    }

    pub fn last_valid_row(&self) -> Option<usize> {
        self.last_valid
    }

    pub fn is_row_valid(&self, row: usize) -> bool {
        matches!(self.next.get(row), Some(Link::Next(_)) | Some(Link::End))
    }

    pub fn is_attr(&self, name: &str) -> bool {
        self.col_map.contains_key(name)
    }

    pub fn col_ref(&self, name: &str) -> Result<ColumnRef> {
        self.col_map
            .get(name)
            .copied()
            .ok_or_else(|| Error::unknown_column(name))
    }

    pub fn col_type(&self, name: &str) -> Result<AttrType> {
        Ok(self.col_ref(name)?.kind)
    }

    /// Type-local index of `name`, if it exists.
    pub fn col_idx(&self, name: &str) -> Option<usize> {
        self.col_map.get(name).map(|c| c.index)
    }

    pub(crate) fn col_ref_of_kind(&self, name: &str, kind: AttrType) -> Result<ColumnRef> {
        let cref = self.col_ref(name)?;
        if cref.kind != kind {
            return Err(Error::Schema(format!(
                "{name}: expected {kind} column, found {}",
                cref.kind
            )));
        }
        Ok(cref)
    }

    pub(crate) fn check_row(&self, row: usize) -> Result<()> {
        if self.is_row_valid(row) {
            Ok(())
        } else {
            Err(Error::InvalidRow(row))
        }
    }

    pub(crate) fn next_of(&self, row: usize) -> Option<usize> {
        self.next.get(row).and_then(|l| l.as_index())
    }

    /// Valid physical rows in logical order.
    pub fn row_ids(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.valid_rows);
        let mut cur = self.first_valid;
        while let Some(row) = cur {
            out.push(row);
            cur = self.next_of(row);
        }
        out
    }

    /* ----- typed value access ----- */

    pub fn int_val(&self, name: &str, row: usize) -> Result<i64> {
        let c = self.col_ref_of_kind(name, AttrType::Int)?;
        self.check_row(row)?;
        Ok(self.int_cols[c.index][row])
    }

    pub fn flt_val(&self, name: &str, row: usize) -> Result<f64> {
        let c = self.col_ref_of_kind(name, AttrType::Flt)?;
        self.check_row(row)?;
        Ok(self.flt_cols[c.index][row])
    }

    pub fn str_val(&self, name: &str, row: usize) -> Result<String> {
        let code = self.str_code(name, row)?;
        self.context.resolve(code)
    }

    pub fn str_code(&self, name: &str, row: usize) -> Result<StrCode> {
        let c = self.col_ref_of_kind(name, AttrType::Str)?;
        self.check_row(row)?;
        Ok(self.str_cols[c.index][row])
    }

    pub(crate) fn value_at(&self, c: ColumnRef, row: usize) -> Result<Value> {
        Ok(match c.kind {
            AttrType::Int => Value::Int(self.int_cols[c.index][row]),
            AttrType::Flt => Value::Flt(self.flt_cols[c.index][row]),
            AttrType::Str => Value::Str(self.context.resolve(self.str_cols[c.index][row])?),
        })
    }

    /// One row's values in schema order.
    pub fn row_values(&self, row: usize) -> Result<Vec<Value>> {
        self.check_row(row)?;
        self.schema
            .fields
            .iter()
            .map(|f| self.value_at(self.col_ref(&f.name)?, row))
            .collect()
    }

    /* ----- appending ----- */

    pub(crate) fn reserve_rows(&mut self, extra: usize) {
        let needed = self.next.len() + extra;
        if needed <= self.capacity {
            return;
        }
        let target = self.config.grown_capacity(self.capacity, needed);
        let add = target - self.next.len();
        for c in &mut self.int_cols {
            c.reserve_exact(add);
        }
        for c in &mut self.flt_cols {
            c.reserve_exact(add);
        }
        for c in &mut self.str_cols {
            c.reserve_exact(add);
        }
        self.next.reserve_exact(add);
        self.capacity = target;
    }

    /// Append one row whose values are already split by kind in type-local
    /// order. Callers guarantee the shape.
    pub(crate) fn push_row_parts(&mut self, ints: &[i64], flts: &[f64], strs: &[StrCode]) -> usize {
        debug_assert_eq!(ints.len(), self.int_cols.len());
        debug_assert_eq!(flts.len(), self.flt_cols.len());
        debug_assert_eq!(strs.len(), self.str_cols.len());
        self.reserve_rows(1);
        for (col, v) in self.int_cols.iter_mut().zip(ints) {
            col.push(*v);
        }
        for (col, v) in self.flt_cols.iter_mut().zip(flts) {
            col.push(*v);
        }
        for (col, v) in self.str_cols.iter_mut().zip(strs) {
            col.push(*v);
        }
        self.link_new_row()
    }

    /// Copy physical row `row` of a table with the same layout and context.
    pub(crate) fn push_physical_copy(&mut self, src: &Table, row: usize) -> usize {
        self.reserve_rows(1);
        for (dst, s) in self.int_cols.iter_mut().zip(&src.int_cols) {
            dst.push(s[row]);
        }
        for (dst, s) in self.flt_cols.iter_mut().zip(&src.flt_cols) {
            dst.push(s[row]);
        }
        for (dst, s) in self.str_cols.iter_mut().zip(&src.str_cols) {
            dst.push(s[row]);
        }
        self.link_new_row()
    }

    /// Copy a row of a table with the same layout, re-interning strings when
    /// the contexts differ.
    pub(crate) fn push_mapped_copy(
        &mut self,
        src: &Table,
        row: usize,
        mapper: &mut CodeMapper,
    ) -> Result<usize> {
        let ints: Vec<i64> = src.int_cols.iter().map(|c| c[row]).collect();
        let flts: Vec<f64> = src.flt_cols.iter().map(|c| c[row]).collect();
        let strs = src
            .str_cols
            .iter()
            .map(|c| mapper.map(c[row]))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.push_row_parts(&ints, &flts, &strs))
    }

    /// Link the freshly pushed last physical slot at the end of the chain.
    fn link_new_row(&mut self) -> usize {
        let row = self.next.len();
        self.next.push(Link::End);
        match self.last_valid {
            Some(last) => self.next[last] = Link::Next(row),
            None => self.first_valid = Some(row),
        }
        self.last_valid = Some(row);
        self.valid_rows += 1;
        if let Some(id_idx) = self.id_col_index() {
            self.row_id_map.insert(self.int_cols[id_idx][row], row);
        }
        self.group_cache.clear();
        row
    }

    /// Append a row given per-kind values in type-local order.
    pub fn add_row(&mut self, row: &RowBuffer) -> Result<usize> {
        if row.ints.len() != self.int_cols.len()
            || row.flts.len() != self.flt_cols.len()
            || row.strs.len() != self.str_cols.len()
        {
            return Err(Error::Schema(format!(
                "row shape ({}, {}, {}) does not match table ({}, {}, {})",
                row.ints.len(),
                row.flts.len(),
                row.strs.len(),
                self.int_cols.len(),
                self.flt_cols.len(),
                self.str_cols.len()
            )));
        }
        let codes = row
            .strs
            .iter()
            .map(|s| self.context.intern(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.push_row_parts(&row.ints, &row.flts, &codes))
    }

    /// Append a row given values in schema order. Kinds must match exactly.
    pub fn add_row_values(&mut self, values: &[Value]) -> Result<usize> {
        if values.len() != self.schema.len() {
            return Err(Error::Schema(format!(
                "expected {} values, got {}",
                self.schema.len(),
                values.len()
            )));
        }
        let mut buf = RowBuffer::new();
        for (field, value) in self.schema.fields.iter().zip(values) {
            match (field.kind, value) {
                (AttrType::Int, Value::Int(v)) => {
                    buf.add_int(*v);
                }
                (AttrType::Flt, Value::Flt(v)) => {
                    buf.add_flt(*v);
                }
                (AttrType::Str, Value::Str(v)) => {
                    buf.add_str(v.as_str());
                }
                (kind, v) => {
                    return Err(Error::Schema(format!(
                        "{}: expected {kind} value, got {}",
                        field.name,
                        v.kind()
                    )))
                }
            }
        }
        self.add_row(&buf)
    }

    /// Append every valid row of `other` (same schema). Duplicates are kept.
    pub fn add_table(&mut self, other: &Table) -> Result<()> {
        self.check_compatible(other)?;
        let rows = other.row_ids();
        self.reserve_rows(rows.len());
        let mut mapper = CodeMapper::new(&other.context, &self.context);
        for row in rows {
            self.push_mapped_copy(other, row, &mut mapper)?;
        }
        Ok(())
    }

    /// Append all rows of `other`, then recompute permanent ids.
    pub fn concat_table(&mut self, other: &Table) -> Result<()> {
        self.add_table(other)?;
        self.reindex()
    }

    pub(crate) fn check_compatible(&self, other: &Table) -> Result<()> {
        if !self.schema.is_compatible(&other.schema) {
            return Err(Error::Schema(format!(
                "schemas of {} and {} differ",
                self.name, other.name
            )));
        }
        Ok(())
    }

    /* ----- logical removal ----- */

    fn mark_removed(&mut self, row: usize) {
        if let Some(id_idx) = self.id_col_index() {
            let id = self.int_cols[id_idx][row];
            if self.row_id_map.get(&id) == Some(&row) {
                self.row_id_map.remove(&id);
            }
        }
        self.next[row] = Link::Removed;
        self.valid_rows -= 1;
    }

    /// Unlink the row following `pred` (`None` = the first row) and return
    /// its physical index.
    pub(crate) fn unlink_after(&mut self, pred: Option<usize>) -> Result<usize> {
        let target = match pred {
            None => self
                .first_valid
                .ok_or_else(|| Error::IteratorState("table has no rows to remove".into()))?,
            Some(p) => match self.next.get(p) {
                Some(Link::Next(t)) => *t,
                Some(Link::End) => {
                    return Err(Error::IteratorState(format!("no row after {p}")))
                }
                Some(Link::Removed) | None => {
                    return Err(Error::IteratorState(format!("cursor row {p} is not valid")))
                }
            },
        };
        let after = self.next[target];
        match pred {
            None => self.first_valid = after.as_index(),
            Some(p) => self.next[p] = after,
        }
        if self.last_valid == Some(target) {
            self.last_valid = pred;
        }
        self.mark_removed(target);
        self.group_cache.clear();
        Ok(target)
    }

    /// Logically remove one row. Locating the predecessor is O(n).
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        self.check_row(row)?;
        let mut pred = None;
        let mut cur = self.first_valid;
        while let Some(r) = cur {
            if r == row {
                self.unlink_after(pred)?;
                return Ok(());
            }
            pred = Some(r);
            cur = self.next_of(r);
        }
        Err(Error::Invariant(format!("valid row {row} is not on the chain")))
    }

    pub fn remove_first_row(&mut self) -> Result<()> {
        self.unlink_after(None).map(|_| ())
    }

    /// Remove a set of rows in one pass. Every index must be valid; nothing
    /// is removed otherwise.
    pub fn remove_rows(&mut self, rows: &[usize]) -> Result<()> {
        let mut drop = vec![false; self.next.len()];
        for &row in rows {
            self.check_row(row)?;
            drop[row] = true;
        }
        self.retain_where(|r| !drop[r]);
        Ok(())
    }

    /// Remove every row whose physical index is not in `keep` (sorted
    /// ascending).
    pub fn keep_sorted_rows(&mut self, keep: &[usize]) {
        self.retain_where(|r| keep.binary_search(&r).is_ok());
    }

    /// Keep only the first `n` rows in logical order.
    pub fn select_first_n_rows(&mut self, n: usize) {
        let mut seen = 0usize;
        self.retain_where(|_| {
            seen += 1;
            seen <= n
        });
    }

    /// Single pass over the chain unlinking rows for which `keep` is false.
    /// `keep` is called once per valid row, in logical order.
    pub(crate) fn retain_where<F: FnMut(usize) -> bool>(&mut self, mut keep: F) {
        let before = self.valid_rows;
        let mut pred: Option<usize> = None;
        let mut cur = self.first_valid;
        while let Some(row) = cur {
            let after = self.next_of(row);
            if keep(row) {
                pred = Some(row);
            } else {
                match pred {
                    None => self.first_valid = after,
                    Some(p) => self.next[p] = Link::from_index(after),
                }
                if self.last_valid == Some(row) {
                    self.last_valid = pred;
                }
                self.mark_removed(row);
            }
            cur = after;
        }
        if self.valid_rows != before {
            self.group_cache.clear();
        }
    }

    /// Relink the chain to visit `order` (a permutation of the valid rows).
    pub(crate) fn relink(&mut self, order: &[usize]) {
        for pair in order.windows(2) {
            self.next[pair[0]] = Link::Next(pair[1]);
        }
        if let Some(&last) = order.last() {
            self.next[last] = Link::End;
        }
        self.first_valid = order.first().copied();
        self.last_valid = order.last().copied();
        self.group_cache.clear();
    }

    /// Rebuild storage keeping only valid rows, in logical order. Physical
    /// indices are renumbered `0..valid_rows`.
    pub fn defrag(&mut self) {
        let rows = self.row_ids();
        let n = rows.len();
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.name, slots = self.next.len(), valid = n, "defrag");
        self.int_cols = self
            .int_cols
            .iter()
            .map(|c| rows.iter().map(|&r| c[r]).collect())
            .collect();
        self.flt_cols = self
            .flt_cols
            .iter()
            .map(|c| rows.iter().map(|&r| c[r]).collect())
            .collect();
        self.str_cols = self
            .str_cols
            .iter()
            .map(|c| rows.iter().map(|&r| c[r]).collect())
            .collect();
        self.next = (0..n)
            .map(|i| if i + 1 < n { Link::Next(i + 1) } else { Link::End })
            .collect();
        self.first_valid = if n > 0 { Some(0) } else { None };
        self.last_valid = n.checked_sub(1);
        self.valid_rows = n;
        self.capacity = n;
        self.rebuild_id_map();
        self.group_cache.clear();
    }

    /* ----- columns ----- */

    fn add_col(&mut self, name: &str, kind: AttrType) -> Result<ColumnRef> {
        if self.col_map.contains_key(name) {
            return Err(Error::Schema(format!("{name}: duplicate column name")));
        }
        let fill = self.next.len();
        let empty = if kind == AttrType::Str {
            Some(self.context.intern("")?)
        } else {
            None
        };
        let cref = self.push_column_storage(Field::new(name, kind), fill);
        if let Some(code) = empty {
            self.str_cols[cref.index].iter_mut().for_each(|c| *c = code);
        }
        let cap = self.capacity.saturating_sub(fill);
        match kind {
            AttrType::Int => self.int_cols[cref.index].reserve_exact(cap),
            AttrType::Flt => self.flt_cols[cref.index].reserve_exact(cap),
            AttrType::Str => self.str_cols[cref.index].reserve_exact(cap),
        }
        Ok(cref)
    }

    /// Add an integer column filled with 0.
    pub fn add_int_col(&mut self, name: &str) -> Result<()> {
        self.add_col(name, AttrType::Int).map(|_| ())
    }

    /// Add a float column filled with 0.0.
    pub fn add_flt_col(&mut self, name: &str) -> Result<()> {
        self.add_col(name, AttrType::Flt).map(|_| ())
    }

    /// Add a string column filled with "".
    pub fn add_str_col(&mut self, name: &str) -> Result<()> {
        self.add_col(name, AttrType::Str).map(|_| ())
    }

    /// Existing column of `kind` named `name`, or a new one.
    fn col_for_store(&mut self, name: &str, kind: AttrType, len: usize) -> Result<ColumnRef> {
        if len != self.valid_rows {
            return Err(Error::Schema(format!(
                "{name}: {len} values for {} valid rows",
                self.valid_rows
            )));
        }
        match self.col_map.get(name) {
            Some(c) if c.kind == kind => Ok(*c),
            Some(c) => Err(Error::Schema(format!(
                "{name}: cannot store {kind} values into {} column",
                c.kind
            ))),
            None => self.add_col(name, kind),
        }
    }

    fn scatter<T: Copy>(&self, column: &mut [T], values: &[T]) {
        for (row, v) in self.row_ids().into_iter().zip(values) {
            column[row] = *v;
        }
    }

    /// Write `values` (one per valid row, logical order) into an integer
    /// column, creating it if needed.
    pub fn store_int_col(&mut self, name: &str, values: &[i64]) -> Result<()> {
        let c = self.col_for_store(name, AttrType::Int, values.len())?;
        let mut column = std::mem::take(&mut self.int_cols[c.index]);
        self.scatter(&mut column, values);
        self.int_cols[c.index] = column;
        self.after_column_store(name);
        Ok(())
    }

    pub fn store_flt_col(&mut self, name: &str, values: &[f64]) -> Result<()> {
        let c = self.col_for_store(name, AttrType::Flt, values.len())?;
        let mut column = std::mem::take(&mut self.flt_cols[c.index]);
        self.scatter(&mut column, values);
        self.flt_cols[c.index] = column;
        self.after_column_store(name);
        Ok(())
    }

    pub fn store_str_col<S: AsRef<str>>(&mut self, name: &str, values: &[S]) -> Result<()> {
        if values.len() != self.valid_rows {
            return Err(Error::Schema(format!(
                "{name}: {} values for {} valid rows",
                values.len(),
                self.valid_rows
            )));
        }
        let codes = values
            .iter()
            .map(|s| self.context.intern(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.store_str_codes(name, &codes)
    }

    pub(crate) fn store_str_codes(&mut self, name: &str, codes: &[StrCode]) -> Result<()> {
        let c = self.col_for_store(name, AttrType::Str, codes.len())?;
        let mut column = std::mem::take(&mut self.str_cols[c.index]);
        self.scatter(&mut column, codes);
        self.str_cols[c.index] = column;
        self.after_column_store(name);
        Ok(())
    }

    /// Store a column of values that all share one kind.
    pub(crate) fn store_values(&mut self, name: &str, kind: AttrType, values: Vec<Value>) -> Result<()> {
        match kind {
            AttrType::Int => {
                let v: Vec<i64> = values.iter().filter_map(Value::as_int).collect();
                self.store_checked_len(name, values.len(), v.len())?;
                self.store_int_col(name, &v)
            }
            AttrType::Flt => {
                let v: Vec<f64> = values.iter().filter_map(Value::as_flt).collect();
                self.store_checked_len(name, values.len(), v.len())?;
                self.store_flt_col(name, &v)
            }
            AttrType::Str => {
                let v: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
                self.store_checked_len(name, values.len(), v.len())?;
                self.store_str_col(name, &v)
            }
        }
    }

    fn store_checked_len(&self, name: &str, expected: usize, got: usize) -> Result<()> {
        if expected != got {
            return Err(Error::Invariant(format!("{name}: mixed value kinds in column result")));
        }
        Ok(())
    }

    fn after_column_store(&mut self, name: &str) {
        if let Some(c) = self.col_map.get(name).copied() {
            self.group_cache.invalidate_column(c);
        }
        if self.id_col.as_deref() == Some(name) {
            self.rebuild_id_map();
        }
    }

    /// Values of an integer column in logical order.
    pub fn read_int_col(&self, name: &str) -> Result<Vec<i64>> {
        let c = self.col_ref_of_kind(name, AttrType::Int)?;
        Ok(self.row_ids().into_iter().map(|r| self.int_cols[c.index][r]).collect())
    }

    pub fn read_flt_col(&self, name: &str) -> Result<Vec<f64>> {
        let c = self.col_ref_of_kind(name, AttrType::Flt)?;
        Ok(self.row_ids().into_iter().map(|r| self.flt_cols[c.index][r]).collect())
    }

    pub fn read_str_col(&self, name: &str) -> Result<Vec<String>> {
        let c = self.col_ref_of_kind(name, AttrType::Str)?;
        let pool = self.context.read();
        self.row_ids()
            .into_iter()
            .map(|r| pool.resolve(self.str_cols[c.index][r]).map(str::to_owned))
            .collect()
    }

    /// Rename a column. Labels pointing at it keep working.
    pub fn rename(&mut self, column: &str, new_name: &str) -> Result<()> {
        let idx = self
            .schema
            .index_of(column)
            .ok_or_else(|| Error::unknown_column(column))?;
        if self.col_map.contains_key(new_name) {
            return Err(Error::Schema(format!("{new_name}: duplicate column name")));
        }
        let cref = self.col_ref(column)?;
        self.col_map.remove(column);
        self.col_map.insert(new_name.to_owned(), cref);
        self.schema.fields[idx].name = new_name.to_owned();
        if self.id_col.as_deref() == Some(column) {
            self.id_col = Some(new_name.to_owned());
        }
        self.graph.rename_column(column, new_name);
        self.group_cache.clear();
        Ok(())
    }

    /// Make `label` an additional name for `column`.
    pub fn add_label(&mut self, column: &str, label: &str) -> Result<()> {
        let cref = self.col_ref(column)?;
        if self.col_map.contains_key(label) {
            return Err(Error::Schema(format!("{label}: duplicate column name")));
        }
        self.col_map.insert(label.to_owned(), cref);
        Ok(())
    }

    /* ----- permanent ids ----- */

    pub(crate) fn id_col_index(&self) -> Option<usize> {
        self.id_col
            .as_deref()
            .and_then(|n| self.col_map.get(n))
            .filter(|c| c.kind == AttrType::Int)
            .map(|c| c.index)
    }

    pub(crate) fn rebuild_id_map(&mut self) {
        self.row_id_map.clear();
        if let Some(idx) = self.id_col_index() {
            let mut cur = self.first_valid;
            while let Some(row) = cur {
                self.row_id_map.insert(self.int_cols[idx][row], row);
                cur = self.next_of(row);
            }
        }
    }

    /// Number valid rows `0..n` in logical order into integer column `name`
    /// and track it as the permanent id column.
    pub fn add_id_column(&mut self, name: &str) -> Result<()> {
        let ids: Vec<i64> = (0..self.valid_rows as i64).collect();
        self.store_int_col(name, &ids)?;
        self.id_col = Some(name.to_owned());
        self.rebuild_id_map();
        Ok(())
    }

    /// Assign permanent ids using the configured id column name.
    pub fn init_ids(&mut self) -> Result<()> {
        let name = self.config.id_col_name.clone();
        self.add_id_column(&name)
    }

    /// Renumber permanent ids, if this table has them.
    pub fn reindex(&mut self) -> Result<()> {
        match self.id_col.clone() {
            Some(name) => self.add_id_column(&name),
            None => Ok(()),
        }
    }

    pub fn id_col_name(&self) -> Option<&str> {
        self.id_col.as_deref()
    }

    /// Permanent id to physical row.
    pub fn row_id_map(&self) -> &HashMap<i64, usize> {
        &self.row_id_map
    }

    pub fn physical_row_of(&self, id: i64) -> Option<usize> {
        self.row_id_map.get(&id).copied()
    }

    /* ----- raw parts for persistence ----- */

    /// Compacted snapshot of the table: valid rows only, in logical order.
    pub fn to_parts(&self) -> TableParts {
        let rows = self.row_ids();
        let pick = |c: &Vec<i64>| rows.iter().map(|&r| c[r]).collect::<Vec<_>>();
        let id_map = match self.id_col_index() {
            Some(idx) => rows
                .iter()
                .enumerate()
                .map(|(pos, &r)| (self.int_cols[idx][r], pos))
                .collect(),
            None => Vec::new(),
        };
        TableParts {
            name: self.name.clone(),
            schema: self.schema.clone(),
            rows: rows.len(),
            int_cols: self.int_cols.iter().map(pick).collect(),
            flt_cols: self
                .flt_cols
                .iter()
                .map(|c| rows.iter().map(|&r| c[r]).collect())
                .collect(),
            str_cols: self
                .str_cols
                .iter()
                .map(|c| rows.iter().map(|&r| c[r]).collect())
                .collect(),
            id_col: self.id_col.clone(),
            id_map,
        }
    }

    /// Rebuild a table from a compacted snapshot. Every string code must
    /// resolve in `context`.
    pub fn from_parts(parts: TableParts, context: &Context) -> Result<Self> {
        parts.schema.validate()?;
        let TableParts {
            name,
            schema,
            rows: n,
            int_cols,
            flt_cols,
            str_cols,
            id_col,
            id_map,
        } = parts;
        if int_cols.len() != schema.count_of(AttrType::Int)
            || flt_cols.len() != schema.count_of(AttrType::Flt)
            || str_cols.len() != schema.count_of(AttrType::Str)
        {
            return Err(Error::Io("column count does not match schema".into()));
        }
        let lengths_ok = int_cols.iter().all(|c| c.len() == n)
            && flt_cols.iter().all(|c| c.len() == n)
            && str_cols.iter().all(|c| c.len() == n);
        if !lengths_ok {
            return Err(Error::Io(format!("column lengths do not match {n} rows")));
        }
        {
            let pool = context.read();
            if let Some(bad) = str_cols.iter().flatten().find(|c| pool.get(**c).is_none()) {
                return Err(Error::Io(format!("{bad} does not resolve in context")));
            }
        }
        let mut table = Self::from_validated(name, schema, context.clone(), TableConfig::default());
        table.int_cols = int_cols;
        table.flt_cols = flt_cols;
        table.str_cols = str_cols;
        table.next = (0..n)
            .map(|i| if i + 1 < n { Link::Next(i + 1) } else { Link::End })
            .collect();
        table.first_valid = if n > 0 { Some(0) } else { None };
        table.last_valid = n.checked_sub(1);
        table.valid_rows = n;
        table.capacity = n;
        if let Some(id) = id_col {
            table.col_ref_of_kind(&id, AttrType::Int).map_err(|e| Error::Io(e.to_string()))?;
            table.id_col = Some(id);
            for (id, pos) in id_map {
                if pos >= n {
                    return Err(Error::Io(format!("id {id} maps past the last row")));
                }
                table.row_id_map.insert(id, pos);
            }
        }
        Ok(table)
    }
}

/// Compacted, owned representation of a table used by persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct TableParts {
    pub name: String,
    pub schema: Schema,
    /// Row count; authoritative even when the schema has no columns.
    pub rows: usize,
    pub int_cols: Vec<Vec<i64>>,
    pub flt_cols: Vec<Vec<f64>>,
    pub str_cols: Vec<Vec<StrCode>>,
    pub id_col: Option<String>,
    /// Permanent id to compacted row position.
    pub id_map: Vec<(i64, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::types::Value;

    fn ab_table() -> Table {
        let ctx = Context::new();
        let schema = Schema::try_from_pairs([("A", AttrType::Int), ("B", AttrType::Str)]).unwrap();
        let mut t = Table::new("t", schema, &ctx).unwrap();
        for (a, b) in [(1, "x"), (2, "y"), (3, "z"), (4, "w")] {
            t.add_row_values(&[Value::Int(a), Value::from(b)]).unwrap();
        }
        t
    }

    #[test]
    fn append_links_rows_in_order() {
        let t = ab_table();
        assert_eq!(t.num_rows(), 4);
        assert_eq!(t.num_valid_rows(), 4);
        assert_eq!(t.row_ids(), vec![0, 1, 2, 3]);
        assert_eq!(t.str_val("B", 2).unwrap(), "z");
    }

    #[test]
    fn remove_middle_and_endpoints() {
        let mut t = ab_table();
        t.remove_row(1).unwrap();
        t.remove_row(0).unwrap();
        t.remove_row(3).unwrap();
        assert_eq!(t.row_ids(), vec![2]);
        assert_eq!(t.first_valid_row(), Some(2));
        assert_eq!(t.last_valid_row(), Some(2));
        assert_eq!(t.num_valid_rows(), 1);
        assert_eq!(t.num_rows(), 4);
    }

    #[test]
    fn removing_twice_is_reported_without_damage() {
        let mut t = ab_table();
        t.remove_row(2).unwrap();
        assert!(matches!(t.remove_row(2), Err(Error::InvalidRow(2))));
        assert!(matches!(t.remove_row(99), Err(Error::InvalidRow(99))));
        assert_eq!(t.row_ids(), vec![0, 1, 3]);
    }

    #[test]
    fn append_after_removing_everything() {
        let mut t = ab_table();
        t.remove_rows(&[0, 1, 2, 3]).unwrap();
        assert_eq!(t.first_valid_row(), None);
        let row = t.add_row_values(&[Value::Int(9), Value::from("q")]).unwrap();
        assert_eq!(row, 4);
        assert_eq!(t.row_ids(), vec![4]);
    }

    #[test]
    fn defrag_compacts_in_logical_order() {
        let mut t = ab_table();
        t.remove_row(1).unwrap();
        t.relink(&[3, 2, 0]);
        t.defrag();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.read_int_col("A").unwrap(), vec![4, 3, 1]);
        assert_eq!(t.row_ids(), vec![0, 1, 2]);
    }

    #[test]
    fn row_shape_and_kind_are_checked() {
        let mut t = ab_table();
        let mut row = RowBuffer::new();
        row.add_int(1);
        assert!(matches!(t.add_row(&row), Err(Error::Schema(_))));
        let err = t.add_row_values(&[Value::Flt(1.0), Value::from("a")]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(t.num_valid_rows(), 4);
    }

    #[test]
    fn store_and_read_columns_follow_logical_order() {
        let mut t = ab_table();
        t.remove_row(0).unwrap();
        t.store_flt_col("F", &[0.5, 1.5, 2.5]).unwrap();
        assert_eq!(t.read_flt_col("F").unwrap(), vec![0.5, 1.5, 2.5]);
        assert!(t.store_flt_col("F", &[1.0]).is_err());
        assert!(t.store_int_col("B", &[1, 2, 3]).is_err());
    }

    #[test]
    fn ids_follow_defrag() {
        let mut t = ab_table();
        t.init_ids().unwrap();
        t.remove_row(0).unwrap();
        assert_eq!(t.physical_row_of(0), None);
        assert_eq!(t.physical_row_of(2), Some(2));
        t.defrag();
        assert_eq!(t.physical_row_of(2), Some(1));
        t.reindex().unwrap();
        assert_eq!(t.read_int_col("_id").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn rename_and_labels() {
        let mut t = ab_table();
        t.add_label("A", "alias").unwrap();
        t.rename("A", "Z").unwrap();
        assert_eq!(t.int_val("alias", 0).unwrap(), 1);
        assert_eq!(t.int_val("Z", 0).unwrap(), 1);
        assert!(t.int_val("A", 0).is_err());
        assert!(t.rename("Z", "B").is_err());
    }

    #[test]
    fn pair_constructors() {
        let ctx = Context::new();
        let t = Table::table_from_flt_pairs("pr", [(1, 0.5), (2, 0.25)], "NodeId", "Rank", &ctx, false)
            .unwrap();
        assert_eq!(t.read_flt_col("Rank").unwrap(), vec![0.5, 0.25]);
        assert_eq!(t.id_col_name(), Some("_id"));

        let code = ctx.intern("k").unwrap();
        let s = Table::from_int_pairs("s", [(code.get() as i64, 7)], "K", "V", &ctx, true).unwrap();
        assert_eq!(s.str_val("K", 0).unwrap(), "k");
        assert!(Table::from_int_pairs("bad", [(99, 1)], "K", "V", &ctx, true).is_err());
    }

    #[test]
    fn parts_round_trip_drops_removed_slots() {
        let mut t = ab_table();
        t.remove_row(1).unwrap();
        let parts = t.to_parts();
        assert_eq!(parts.int_cols[0], vec![1, 3, 4]);
        let back = Table::from_parts(parts, t.context()).unwrap();
        assert_eq!(back.read_str_col("B").unwrap(), vec!["x", "z", "w"]);
        assert_eq!(back.num_rows(), 3);
    }

    #[test]
    fn parts_row_count_must_match_columns() {
        let mut parts = ab_table().to_parts();
        assert_eq!(parts.rows, 4);
        parts.rows = 5;
        assert!(matches!(Table::from_parts(parts, &Context::new()), Err(Error::Io(_))));
    }

    #[test]
    fn add_table_remaps_strings_into_own_context() {
        let src = ab_table();
        let ctx = Context::new();
        ctx.intern("unrelated").unwrap();
        let mut dst = Table::new("dst", src.schema().clone(), &ctx).unwrap();
        dst.add_row_values(&[Value::Int(0), Value::from("z")]).unwrap();
        dst.add_table(&src).unwrap();
        dst.add_table(&src).unwrap();
        assert_eq!(dst.num_valid_rows(), 9);
        assert_eq!(dst.read_str_col("B").unwrap()[..5], ["z", "x", "y", "z", "w"]);
        assert_eq!(ctx.lookup("z"), Some(dst.str_cols[0][0]));
        assert_eq!(dst.str_cols[0][3], dst.str_cols[0][0]);
        assert_eq!(ctx.len(), 5);
    }

    #[test]
    fn capacity_grows_in_batches() {
        let ctx = Context::new();
        let schema = Schema::try_from_pairs([("A", AttrType::Int)]).unwrap();
        let mut t = Table::new("t", schema, &ctx).unwrap();
        t.add_row_values(&[Value::Int(1)]).unwrap();
        assert_eq!(t.capacity, 64);
        for i in 0..64 {
            t.add_row_values(&[Value::Int(i)]).unwrap();
        }
        assert_eq!(t.capacity, 128);
    }
}
