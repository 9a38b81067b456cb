//! Policy-driven reductions, across the rows of a group or across the
//! columns of a row.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use reltab_core::error::{Error, Result};
use reltab_core::schema::AttrType;
use reltab_core::types::Value;

use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggrPolicy {
    Min,
    Max,
    First,
    Last,
    Mean,
    Median,
    Sum,
    Count,
}

impl AggrPolicy {
    /// Kind of the reduced value for input of kind `input`.
    pub fn result_kind(self, input: AttrType) -> Result<AttrType> {
        match (self, input) {
            (AggrPolicy::Count, _) => Ok(AttrType::Int),
            (AggrPolicy::Mean, AttrType::Str) | (AggrPolicy::Sum, AttrType::Str) => Err(
                Error::Schema(format!("{self:?} is not defined for string columns")),
            ),
            (AggrPolicy::Mean, _) => Ok(AttrType::Flt),
            (_, kind) => Ok(kind),
        }
    }
}

/// Element type a policy can reduce.
pub trait Aggregatable: Clone + Into<Value> {
    fn agg_cmp(&self, other: &Self) -> Ordering;
    fn agg_sum(values: &[Self]) -> Result<Self>;
    fn agg_f64(&self) -> Option<f64>;
}

impl Aggregatable for i64 {
    fn agg_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn agg_sum(values: &[Self]) -> Result<Self> {
        values.iter().try_fold(0i64, |acc, v| {
            acc.checked_add(*v)
                .ok_or_else(|| Error::Arithmetic("integer sum overflows".into()))
        })
    }

    fn agg_f64(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl Aggregatable for f64 {
    fn agg_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn agg_sum(values: &[Self]) -> Result<Self> {
        Ok(values.iter().sum())
    }

    fn agg_f64(&self) -> Option<f64> {
        Some(*self)
    }
}

impl Aggregatable for String {
    fn agg_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn agg_sum(_values: &[Self]) -> Result<Self> {
        Err(Error::Schema("cannot sum string values".into()))
    }

    fn agg_f64(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reduced<T> {
    Value(T),
    Mean(f64),
    Count(i64),
}

impl<T: Into<Value>> Reduced<T> {
    pub fn into_value(self) -> Value {
        match self {
            Reduced::Value(v) => v.into(),
            Reduced::Mean(m) => Value::Flt(m),
            Reduced::Count(n) => Value::Int(n),
        }
    }
}

/// Reduce `values` under `policy`. Only `Count` accepts an empty slice.
pub fn aggregate_vector<T: Aggregatable>(values: &[T], policy: AggrPolicy) -> Result<Reduced<T>> {
    if policy == AggrPolicy::Count {
        return Ok(Reduced::Count(values.len() as i64));
    }
    if values.is_empty() {
        return Err(Error::EmptyGroup(format!("{policy:?} over no values")));
    }
    let pick = |want: Ordering| {
        values
            .iter()
            .skip(1)
            .fold(&values[0], |best, v| if v.agg_cmp(best) == want { v } else { best })
            .clone()
    };
    Ok(match policy {
        AggrPolicy::Min => Reduced::Value(pick(Ordering::Less)),
        AggrPolicy::Max => Reduced::Value(pick(Ordering::Greater)),
        AggrPolicy::First => Reduced::Value(values[0].clone()),
        AggrPolicy::Last => Reduced::Value(values[values.len() - 1].clone()),
        AggrPolicy::Sum => Reduced::Value(T::agg_sum(values)?),
        AggrPolicy::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.agg_cmp(b));
            Reduced::Value(sorted[(sorted.len() - 1) / 2].clone())
        }
        AggrPolicy::Mean => {
            let mut sum = 0.0;
            for v in values {
                sum += v
                    .agg_f64()
                    .ok_or_else(|| Error::Schema("mean needs numeric values".into()))?;
            }
            Reduced::Mean(sum / values.len() as f64)
        }
        AggrPolicy::Count => Reduced::Count(values.len() as i64),
    })
}

impl Table {
    /// Reduce `rows`' values of column `col` (kind `kind`, type-local `index`).
    fn reduce_rows(&self, kind: AttrType, index: usize, rows: &[usize], policy: AggrPolicy) -> Result<Value> {
        Ok(match kind {
            AttrType::Int => {
                let v: Vec<i64> = rows.iter().map(|&r| self.int_cols[index][r]).collect();
                aggregate_vector(&v, policy)?.into_value()
            }
            AttrType::Flt => {
                let v: Vec<f64> = rows.iter().map(|&r| self.flt_cols[index][r]).collect();
                aggregate_vector(&v, policy)?.into_value()
            }
            AttrType::Str => {
                let pool = self.context.read();
                let v = rows
                    .iter()
                    .map(|&r| pool.resolve(self.str_cols[index][r]).map(str::to_owned))
                    .collect::<Result<Vec<String>>>()?;
                aggregate_vector(&v, policy)?.into_value()
            }
        })
    }

    /// Group by `group_by`, reduce `val_col` within each group and write the
    /// group's scalar into `res_col` on every member row.
    pub fn aggregate(
        &mut self,
        group_by: &[&str],
        policy: AggrPolicy,
        val_col: &str,
        res_col: &str,
        ordered: bool,
    ) -> Result<()> {
        let src = self.col_ref(val_col)?;
        let out_kind = policy.result_kind(src.kind)?;
        let grouping = self.group_rows(group_by, ordered)?;
        let mut per_row: Vec<Option<Value>> = vec![None; self.num_rows()];
        for (_, _, rows) in grouping.iter() {
            let scalar = self.reduce_rows(src.kind, src.index, rows, policy)?;
            for &r in rows {
                per_row[r] = Some(scalar.clone());
            }
        }
        let values = self
            .row_ids()
            .into_iter()
            .map(|r| {
                per_row[r]
                    .take()
                    .ok_or_else(|| Error::Invariant(format!("row {r} is in no group")))
            })
            .collect::<Result<Vec<_>>>()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.name, ?policy, groups = grouping.len(), res_col, "aggregate");
        self.store_values(res_col, out_kind, values)
    }

    /// Reduce across `cols` (all of one kind) row by row into `res_col`.
    pub fn aggregate_cols(&mut self, cols: &[&str], policy: AggrPolicy, res_col: &str) -> Result<()> {
        let refs = cols
            .iter()
            .map(|c| self.col_ref(c))
            .collect::<Result<Vec<_>>>()?;
        let kind = match refs.first() {
            Some(c) => c.kind,
            None => return Err(Error::Schema("aggregate_cols needs at least one column".into())),
        };
        if let Some(bad) = refs.iter().position(|c| c.kind != kind) {
            return Err(Error::Schema(format!(
                "{}: expected {kind} column, found {}",
                cols[bad], refs[bad].kind
            )));
        }
        let out_kind = policy.result_kind(kind)?;
        let mut values = Vec::with_capacity(self.valid_rows);
        for row in self.row_ids() {
            let reduced = match kind {
                AttrType::Int => {
                    let v: Vec<i64> = refs.iter().map(|c| self.int_cols[c.index][row]).collect();
                    aggregate_vector(&v, policy)?.into_value()
                }
                AttrType::Flt => {
                    let v: Vec<f64> = refs.iter().map(|c| self.flt_cols[c.index][row]).collect();
                    aggregate_vector(&v, policy)?.into_value()
                }
                AttrType::Str => {
                    let v = refs
                        .iter()
                        .map(|c| self.context.resolve(self.str_cols[c.index][row]))
                        .collect::<Result<Vec<String>>>()?;
                    aggregate_vector(&v, policy)?.into_value()
                }
            };
            values.push(reduced);
        }
        self.store_values(res_col, out_kind, values)
    }
}
