//! Equality join and the "next k rows" pairing built on the same row
//! concatenation.
//!
//! Output columns are every column of the left table prefixed `1.` followed
//! by every column of the right table prefixed `2.`. Rows come out in
//! left-major order: left rows in logical order, and for each the matching
//! right rows in logical order.

use std::collections::HashMap;

use reltab_core::error::{Error, Result};
use reltab_core::schema::{AttrType, Field, Schema};

use crate::group::GroupKey;
use crate::table::{CodeMapper, ColumnRef, Table};

fn pair_schema(left: &Schema, right: &Schema, extra: Option<&str>) -> Result<Schema> {
    let mut fields: Vec<Field> = left
        .fields
        .iter()
        .map(|f| Field::new(format!("1.{}", f.name), f.kind))
        .chain(
            right
                .fields
                .iter()
                .map(|f| Field::new(format!("2.{}", f.name), f.kind)),
        )
        .collect();
    if let Some(name) = extra {
        fields.push(Field::new(name, AttrType::Int));
    }
    let schema = Schema::new(fields);
    schema.validate()?;
    Ok(schema)
}

/// Append `left[l] ++ right[r] (++ extra)` to `out`.
fn push_pair(
    out: &mut Table,
    left: &Table,
    l: usize,
    right: &Table,
    r: usize,
    mapper: &mut CodeMapper,
    extra: Option<i64>,
) -> Result<()> {
    let ints: Vec<i64> = left
        .int_cols
        .iter()
        .map(|c| c[l])
        .chain(right.int_cols.iter().map(|c| c[r]))
        .chain(extra)
        .collect();
    let flts: Vec<f64> = left
        .flt_cols
        .iter()
        .map(|c| c[l])
        .chain(right.flt_cols.iter().map(|c| c[r]))
        .collect();
    let mut strs = Vec::with_capacity(left.str_cols.len() + right.str_cols.len());
    strs.extend(left.str_cols.iter().map(|c| c[l]));
    for c in &right.str_cols {
        strs.push(mapper.map(c[r])?);
    }
    out.push_row_parts(&ints, &flts, &strs);
    Ok(())
}

impl Table {
    /// Join key of `row` on column `c`, with string codes expressed in
    /// `target`'s context. `None` when the string is unknown there, which
    /// means it cannot match.
    fn join_key(&self, c: ColumnRef, row: usize, target: &Table) -> Result<Option<GroupKey>> {
        if c.kind == AttrType::Str && !self.context.same_as(&target.context) {
            let s = self.context.resolve(self.str_cols[c.index][row])?;
            return Ok(target.context.lookup(&s).map(|code| GroupKey {
                ints: vec![i64::from(code.get())],
                flts: Vec::new(),
            }));
        }
        Ok(Some(self.group_key(&[c], row)))
    }

    /// Equality join of `self.col1` with `other.col2`.
    pub fn join(&self, col1: &str, other: &Table, col2: &str) -> Result<Table> {
        let c1 = self.col_ref(col1)?;
        let c2 = other.col_ref(col2)?;
        if c1.kind != c2.kind {
            return Err(Error::Schema(format!(
                "cannot join {} column {col1} with {} column {col2}",
                c1.kind, c2.kind
            )));
        }
        let schema = pair_schema(&self.schema, &other.schema, None)?;
        let mut out = Table::with_config(
            format!("{}_{}", self.name, other.name),
            schema,
            &self.context,
            self.config.clone(),
        )?;

        let left_rows = self.row_ids();
        let right_rows = other.row_ids();
        // (left position, right position) pairs.
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        if right_rows.len() <= left_rows.len() {
            let mut index: HashMap<GroupKey, Vec<usize>> = HashMap::new();
            for (pos, &r) in right_rows.iter().enumerate() {
                if let Some(key) = other.join_key(c2, r, self)? {
                    index.entry(key).or_default().push(pos);
                }
            }
            for (lpos, &l) in left_rows.iter().enumerate() {
                if let Some(hits) = index.get(&self.group_key(&[c1], l)) {
                    pairs.extend(hits.iter().map(|&rpos| (lpos, rpos)));
                }
            }
        } else {
            let mut index: HashMap<GroupKey, Vec<usize>> = HashMap::new();
            for (pos, &l) in left_rows.iter().enumerate() {
                index.entry(self.group_key(&[c1], l)).or_default().push(pos);
            }
            for (rpos, &r) in right_rows.iter().enumerate() {
                if let Some(key) = other.join_key(c2, r, self)? {
                    if let Some(hits) = index.get(&key) {
                        pairs.extend(hits.iter().map(|&lpos| (lpos, rpos)));
                    }
                }
            }
            pairs.sort_unstable();
        }

        let mut mapper = CodeMapper::new(&other.context, &self.context);
        for (lpos, rpos) in pairs {
            push_pair(&mut out, self, left_rows[lpos], other, right_rows[rpos], &mut mapper, None)?;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            left = %self.name,
            right = %other.name,
            rows = out.valid_rows,
            "join"
        );
        Ok(out)
    }

    pub fn self_join(&self, col: &str) -> Result<Table> {
        self.join(col, self, col)
    }

    /// Pair every row with each of the next `k` rows of its group when the
    /// group is ordered by `order_col` ascending. Groups follow first-seen
    /// order of `group_by`; without `group_by` the whole table is one group.
    /// With `rank_col` the distance (1..=k) is stored in that column.
    pub fn is_next_k(
        &self,
        order_col: &str,
        k: usize,
        group_by: Option<&str>,
        rank_col: Option<&str>,
    ) -> Result<Table> {
        self.col_ref(order_col)?;
        let schema = pair_schema(&self.schema, &self.schema, rank_col)?;
        let mut out = Table::with_config(
            format!("{}_next{}", self.name, k),
            schema,
            &self.context,
            self.config.clone(),
        )?;
        let groups: Vec<Vec<usize>> = match group_by {
            Some(col) => self
                .grouping(&[col], true)?
                .iter()
                .map(|(_, _, rows)| rows.to_vec())
                .collect(),
            None => vec![self.row_ids()],
        };
        let mut mapper = CodeMapper::new(&self.context, &self.context);
        for mut rows in groups {
            self.sort_rows(&mut rows, &[order_col], true)?;
            for (i, &a) in rows.iter().enumerate() {
                for (d, &b) in rows.iter().skip(i + 1).take(k).enumerate() {
                    let rank = rank_col.map(|_| d as i64 + 1);
                    push_pair(&mut out, self, a, self, b, &mut mapper, rank)?;
                }
            }
        }
        Ok(out)
    }
}
