//! Element-wise column arithmetic and string concatenation.
//!
//! Operands pair up row by row in logical order. Results are computed in
//! full before anything is stored, so an error (division by zero, overflow,
//! kind mismatch) leaves both tables unchanged. A missing result name means
//! the first operand column is overwritten.

use serde::{Deserialize, Serialize};

use reltab_core::error::{Error, Result};
use reltab_core::id::StrCode;
use reltab_core::schema::AttrType;

use crate::table::{ColumnRef, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
}

impl ArithOp {
    pub fn apply_int(self, a: i64, b: i64) -> Result<i64> {
        let overflow = || Error::Arithmetic(format!("{a} {self:?} {b} overflows"));
        match self {
            ArithOp::Add => a.checked_add(b).ok_or_else(overflow),
            ArithOp::Sub => a.checked_sub(b).ok_or_else(overflow),
            ArithOp::Mul => a.checked_mul(b).ok_or_else(overflow),
            ArithOp::Div | ArithOp::Mod if b == 0 => {
                Err(Error::Arithmetic(format!("{self:?} by zero")))
            }
            ArithOp::Div => a.checked_div(b).ok_or_else(overflow),
            ArithOp::Mod => a.checked_rem(b).ok_or_else(overflow),
            ArithOp::Min => Ok(a.min(b)),
            ArithOp::Max => Ok(a.max(b)),
        }
    }

    pub fn apply_flt(self, a: f64, b: f64) -> Result<f64> {
        match self {
            ArithOp::Add => Ok(a + b),
            ArithOp::Sub => Ok(a - b),
            ArithOp::Mul => Ok(a * b),
            ArithOp::Div | ArithOp::Mod if b == 0.0 => {
                Err(Error::Arithmetic(format!("{self:?} by zero")))
            }
            ArithOp::Div => Ok(a / b),
            ArithOp::Mod => Ok(a % b),
            ArithOp::Min => Ok(a.min(b)),
            ArithOp::Max => Ok(a.max(b)),
        }
    }
}

enum Computed {
    Int(Vec<i64>),
    Flt(Vec<f64>),
    Str(Vec<String>),
}

impl Computed {
    fn store(self, table: &mut Table, name: &str) -> Result<()> {
        match self {
            Computed::Int(v) => table.store_int_col(name, &v),
            Computed::Flt(v) => table.store_flt_col(name, &v),
            Computed::Str(v) => table.store_str_col(name, &v),
        }
    }
}

fn pair_rows(left: &Table, right: &Table) -> Result<Vec<(usize, usize)>> {
    if left.num_valid_rows() != right.num_valid_rows() {
        return Err(Error::Schema(format!(
            "{} has {} rows, {} has {}",
            left.name(),
            left.num_valid_rows(),
            right.name(),
            right.num_valid_rows()
        )));
    }
    Ok(left.row_ids().into_iter().zip(right.row_ids()).collect())
}

fn binary_numeric(
    left: &Table,
    c1: ColumnRef,
    right: &Table,
    c2: ColumnRef,
    rows: &[(usize, usize)],
    op: ArithOp,
) -> Result<Computed> {
    match (c1.kind, c2.kind) {
        (AttrType::Int, AttrType::Int) => rows
            .iter()
            .map(|&(a, b)| op.apply_int(left.int_cols[c1.index][a], right.int_cols[c2.index][b]))
            .collect::<Result<Vec<_>>>()
            .map(Computed::Int),
        (AttrType::Flt, AttrType::Flt) => rows
            .iter()
            .map(|&(a, b)| op.apply_flt(left.flt_cols[c1.index][a], right.flt_cols[c2.index][b]))
            .collect::<Result<Vec<_>>>()
            .map(Computed::Flt),
        (k1, k2) => Err(Error::Schema(format!(
            "arithmetic needs two int or two float columns, got {k1} and {k2}"
        ))),
    }
}

fn binary_concat(
    left: &Table,
    c1: ColumnRef,
    right: &Table,
    c2: ColumnRef,
    rows: &[(usize, usize)],
) -> Result<Computed> {
    if c1.kind != AttrType::Str || c2.kind != AttrType::Str {
        return Err(Error::Schema(format!(
            "concatenation needs string columns, got {} and {}",
            c1.kind, c2.kind
        )));
    }
    // One pool guard at a time; both sides may share a context.
    let xs = resolve_all(left, rows.iter().map(|&(a, _)| left.str_cols[c1.index][a]))?;
    let ys = resolve_all(right, rows.iter().map(|&(_, b)| right.str_cols[c2.index][b]))?;
    Ok(Computed::Str(
        xs.into_iter().zip(ys).map(|(x, y)| x + &y).collect(),
    ))
}

fn resolve_all(table: &Table, codes: impl Iterator<Item = StrCode>) -> Result<Vec<String>> {
    let pool = table.context.read();
    codes.map(|c| pool.resolve(c).map(str::to_owned)).collect()
}

impl Table {
    fn same_table_rows(&self) -> Vec<(usize, usize)> {
        self.row_ids().into_iter().map(|r| (r, r)).collect()
    }

    /// `res = attr1 op attr2` on this table's columns.
    pub fn col_op(&mut self, attr1: &str, attr2: &str, res: Option<&str>, op: ArithOp) -> Result<()> {
        let (c1, c2) = (self.col_ref(attr1)?, self.col_ref(attr2)?);
        let out = binary_numeric(self, c1, self, c2, &self.same_table_rows(), op)?;
        out.store(self, res.unwrap_or(attr1))
    }

    /// `res = self.attr1 op other.attr2`, pairing rows by logical position.
    /// The result goes to `self` when `add_to_first`, otherwise to `other`
    /// (defaulting to `attr2` there).
    pub fn col_op_with(
        &mut self,
        attr1: &str,
        other: &mut Table,
        attr2: &str,
        res: Option<&str>,
        op: ArithOp,
        add_to_first: bool,
    ) -> Result<()> {
        let (c1, c2) = (self.col_ref(attr1)?, other.col_ref(attr2)?);
        let rows = pair_rows(self, other)?;
        let out = binary_numeric(self, c1, other, c2, &rows, op)?;
        if add_to_first {
            out.store(self, res.unwrap_or(attr1))
        } else {
            out.store(other, res.unwrap_or(attr2))
        }
    }

    /// `res = attr1 op num`. Integer columns use `num` truncated to an
    /// integer unless `float_cast`, which produces a float result instead.
    pub fn col_op_scalar(
        &mut self,
        attr1: &str,
        num: f64,
        res: Option<&str>,
        op: ArithOp,
        float_cast: bool,
    ) -> Result<()> {
        let c = self.col_ref(attr1)?;
        let rows = self.row_ids();
        let out = match (c.kind, float_cast) {
            (AttrType::Int, false) => {
                let k = num as i64;
                rows.iter()
                    .map(|&r| op.apply_int(self.int_cols[c.index][r], k))
                    .collect::<Result<Vec<_>>>()
                    .map(Computed::Int)?
            }
            (AttrType::Int, true) => rows
                .iter()
                .map(|&r| op.apply_flt(self.int_cols[c.index][r] as f64, num))
                .collect::<Result<Vec<_>>>()
                .map(Computed::Flt)?,
            (AttrType::Flt, _) => rows
                .iter()
                .map(|&r| op.apply_flt(self.flt_cols[c.index][r], num))
                .collect::<Result<Vec<_>>>()
                .map(Computed::Flt)?,
            (AttrType::Str, _) => {
                return Err(Error::Schema(format!("{attr1}: arithmetic on string column")))
            }
        };
        out.store(self, res.unwrap_or(attr1))
    }

    /// `res = attr1 ++ attr2` on this table's string columns.
    pub fn col_concat(&mut self, attr1: &str, attr2: &str, res: Option<&str>) -> Result<()> {
        let (c1, c2) = (self.col_ref(attr1)?, self.col_ref(attr2)?);
        let out = binary_concat(self, c1, self, c2, &self.same_table_rows())?;
        out.store(self, res.unwrap_or(attr1))
    }

    pub fn col_concat_with(
        &mut self,
        attr1: &str,
        other: &mut Table,
        attr2: &str,
        res: Option<&str>,
        add_to_first: bool,
    ) -> Result<()> {
        let (c1, c2) = (self.col_ref(attr1)?, other.col_ref(attr2)?);
        let rows = pair_rows(self, other)?;
        let out = binary_concat(self, c1, other, c2, &rows)?;
        if add_to_first {
            out.store(self, res.unwrap_or(attr1))
        } else {
            out.store(other, res.unwrap_or(attr2))
        }
    }

    /// `res = attr1 ++ val`.
    pub fn col_concat_const(&mut self, attr1: &str, val: &str, res: Option<&str>) -> Result<()> {
        let values: Vec<String> = self
            .read_str_col(attr1)?
            .into_iter()
            .map(|s| s + val)
            .collect();
        self.store_str_col(res.unwrap_or(attr1), &values)
    }
}
