//! Projection onto a subset of columns.

use std::collections::{HashMap, HashSet};

use reltab_core::error::{Error, Result};
use reltab_core::schema::{AttrType, Field, Schema};

use crate::table::{ColumnRef, Table};

impl Table {
    /// New table holding only `cols`, in the given order, with all valid
    /// rows in logical order.
    pub fn project(&self, cols: &[&str], name: &str) -> Result<Table> {
        let refs = cols
            .iter()
            .map(|c| self.col_ref(c))
            .collect::<Result<Vec<_>>>()?;
        let schema = Schema::new(
            cols.iter()
                .zip(&refs)
                .map(|(c, r)| Field::new(*c, r.kind))
                .collect(),
        );
        let mut out = Table::with_config(name, schema, &self.context, self.config.clone())?;
        let rows = self.row_ids();
        out.reserve_rows(rows.len());
        let (mut ints, mut flts, mut strs) = (Vec::new(), Vec::new(), Vec::new());
        for row in rows {
            ints.clear();
            flts.clear();
            strs.clear();
            for c in &refs {
                match c.kind {
                    AttrType::Int => ints.push(self.int_cols[c.index][row]),
                    AttrType::Flt => flts.push(self.flt_cols[c.index][row]),
                    AttrType::Str => strs.push(self.str_cols[c.index][row]),
                }
            }
            out.push_row_parts(&ints, &flts, &strs);
        }
        if let Some(id) = self.id_col.as_deref().filter(|id| cols.contains(id)) {
            out.id_col = Some(id.to_owned());
            out.rebuild_id_map();
        }
        Ok(out)
    }

    /// Drop every column not named in `cols`. Kept columns stay in schema
    /// order and are renumbered; labels are dropped.
    pub fn project_in_place(&mut self, cols: &[&str]) -> Result<()> {
        let mut wanted: HashSet<String> = HashSet::new();
        for c in cols {
            let idx = self
                .schema
                .index_of(c)
                .ok_or_else(|| Error::unknown_column(c))?;
            wanted.insert(self.schema.fields[idx].name.clone());
        }
        let plan = self
            .schema
            .fields
            .iter()
            .filter(|f| wanted.contains(&f.name))
            .map(|f| Ok((f.clone(), self.col_ref(&f.name)?)))
            .collect::<Result<Vec<_>>>()?;
        let mut fields = Vec::new();
        let (mut ints, mut flts, mut strs) = (Vec::new(), Vec::new(), Vec::new());
        let mut col_map = HashMap::new();
        for (field, old) in plan {
            let index = match old.kind {
                AttrType::Int => {
                    ints.push(std::mem::take(&mut self.int_cols[old.index]));
                    ints.len() - 1
                }
                AttrType::Flt => {
                    flts.push(std::mem::take(&mut self.flt_cols[old.index]));
                    flts.len() - 1
                }
                AttrType::Str => {
                    strs.push(std::mem::take(&mut self.str_cols[old.index]));
                    strs.len() - 1
                }
            };
            col_map.insert(field.name.clone(), ColumnRef { kind: old.kind, index });
            fields.push(field);
        }
        self.schema.fields = fields;
        self.int_cols = ints;
        self.flt_cols = flts;
        self.str_cols = strs;
        self.col_map = col_map;
        if self.id_col.as_ref().is_some_and(|id| !wanted.contains(id)) {
            self.id_col = None;
        }
        self.rebuild_id_map();
        self.graph.retain_columns(&wanted);
        self.group_cache.clear();
        Ok(())
    }
}
