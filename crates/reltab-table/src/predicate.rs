//! Row predicates: atomic comparisons composed with logical connectives.
//!
//! A `Predicate` names columns; `bind` resolves it against one table,
//! checking that compared kinds agree (there is no coercion), and the bound
//! form is evaluated per physical row.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use reltab_core::context::StringPool;
use reltab_core::error::{Error, Result};
use reltab_core::schema::AttrType;
use reltab_core::types::Value;

use crate::table::{ColumnRef, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Lte,
    Eq,
    Neq,
    Gte,
    Gt,
    /// Left string occurs inside the right one.
    Substr,
    /// Left string contains the right one.
    Superstr,
}

impl CompareOp {
    fn holds(self, ord: Option<Ordering>) -> bool {
        match (self, ord) {
            (CompareOp::Neq, None) => true,
            (_, None) => false,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Lte, Some(o)) => o != Ordering::Greater,
            (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompareOp::Neq, Some(o)) => o != Ordering::Equal,
            (CompareOp::Gte, Some(o)) => o != Ordering::Less,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Substr, _) | (CompareOp::Superstr, _) => false,
        }
    }

    fn is_containment(self) -> bool {
        matches!(self, CompareOp::Substr | CompareOp::Superstr)
    }

    fn holds_str(self, a: &str, b: &str) -> bool {
        match self {
            CompareOp::Substr => b.contains(a),
            CompareOp::Superstr => a.contains(b),
            _ => self.holds(Some(a.cmp(b))),
        }
    }
}

impl FromStr for CompareOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Lte,
            "==" | "=" => CompareOp::Eq,
            "!=" => CompareOp::Neq,
            ">=" => CompareOp::Gte,
            ">" => CompareOp::Gt,
            "substr" => CompareOp::Substr,
            "superstr" => CompareOp::Superstr,
            other => return Err(Error::Schema(format!("unknown comparison operator {other:?}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Col(String),
    Lit(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub lhs: String,
    pub op: CompareOp,
    pub rhs: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Const(bool),
    Atom(Atom),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// `col op literal`
    pub fn lit(col: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Atom(Atom {
            lhs: col.to_owned(),
            op,
            rhs: Operand::Lit(value.into()),
        })
    }

    /// `col1 op col2`
    pub fn cols(col1: &str, op: CompareOp, col2: &str) -> Self {
        Predicate::Atom(Atom {
            lhs: col1.to_owned(),
            op,
            rhs: Operand::Col(col2.to_owned()),
        })
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Parse `col OP literal`. Quoted literals are strings, literals with a
    /// `.` or exponent are floats, other numbers are integers and anything
    /// else is taken as a bare string. Runs of whitespace separate the three
    /// parts; the literal keeps its inner spacing.
    pub fn parse_simple(expr: &str) -> Result<Self> {
        let malformed = || Error::Schema(format!("expected `column op literal`, got {expr:?}"));
        let (col, rest) = expr.trim().split_once(char::is_whitespace).ok_or_else(malformed)?;
        let (op, raw) = rest.trim_start().split_once(char::is_whitespace).ok_or_else(malformed)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(malformed());
        }
        let op: CompareOp = op.parse()?;
        let value = if raw.len() >= 2
            && ((raw.starts_with('"') && raw.ends_with('"'))
                || (raw.starts_with('\'') && raw.ends_with('\'')))
        {
            Value::from(&raw[1..raw.len() - 1])
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Flt(f)
        } else {
            Value::from(raw)
        };
        Ok(Predicate::lit(col, op, value))
    }

    pub(crate) fn bind(&self, table: &Table) -> Result<BoundPredicate> {
        Ok(match self {
            Predicate::Const(b) => BoundPredicate::Const(*b),
            Predicate::Atom(atom) => BoundPredicate::Atom(BoundAtom::bind(atom, table)?),
            Predicate::And(a, b) => {
                BoundPredicate::And(Box::new(a.bind(table)?), Box::new(b.bind(table)?))
            }
            Predicate::Or(a, b) => {
                BoundPredicate::Or(Box::new(a.bind(table)?), Box::new(b.bind(table)?))
            }
            Predicate::Not(a) => BoundPredicate::Not(Box::new(a.bind(table)?)),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) enum BoundOperand {
    Col(ColumnRef),
    Int(i64),
    Flt(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub(crate) struct BoundAtom {
    lhs: ColumnRef,
    op: CompareOp,
    rhs: BoundOperand,
}

impl BoundAtom {
    pub(crate) fn bind(atom: &Atom, table: &Table) -> Result<Self> {
        let lhs = table.col_ref(&atom.lhs)?;
        let (rhs, rhs_kind) = match &atom.rhs {
            Operand::Col(name) => {
                let c = table.col_ref(name)?;
                (BoundOperand::Col(c), c.kind)
            }
            Operand::Lit(Value::Int(v)) => (BoundOperand::Int(*v), AttrType::Int),
            Operand::Lit(Value::Flt(v)) => (BoundOperand::Flt(*v), AttrType::Flt),
            Operand::Lit(Value::Str(v)) => (BoundOperand::Str(v.clone()), AttrType::Str),
        };
        if lhs.kind != rhs_kind {
            return Err(Error::Schema(format!(
                "{}: cannot compare {} column with {rhs_kind}",
                atom.lhs, lhs.kind
            )));
        }
        if atom.op.is_containment() && lhs.kind != AttrType::Str {
            return Err(Error::Schema(format!(
                "{}: {:?} needs string operands",
                atom.lhs, atom.op
            )));
        }
        Ok(Self {
            lhs,
            op: atom.op,
            rhs,
        })
    }

    pub(crate) fn eval(&self, table: &Table, pool: &StringPool, row: usize) -> bool {
        let l = self.lhs.index;
        match (self.lhs.kind, &self.rhs) {
            (AttrType::Int, BoundOperand::Int(v)) => {
                self.op.holds(Some(table.int_cols[l][row].cmp(v)))
            }
            (AttrType::Int, BoundOperand::Col(c)) => {
                self.op.holds(Some(table.int_cols[l][row].cmp(&table.int_cols[c.index][row])))
            }
            (AttrType::Flt, BoundOperand::Flt(v)) => {
                self.op.holds(table.flt_cols[l][row].partial_cmp(v))
            }
            (AttrType::Flt, BoundOperand::Col(c)) => self
                .op
                .holds(table.flt_cols[l][row].partial_cmp(&table.flt_cols[c.index][row])),
            (AttrType::Str, BoundOperand::Str(v)) => {
                let a = pool.get(table.str_cols[l][row]).unwrap_or_default();
                self.op.holds_str(a, v)
            }
            (AttrType::Str, BoundOperand::Col(c)) => {
                let (ca, cb) = (table.str_cols[l][row], table.str_cols[c.index][row]);
                if ca == cb && !self.op.is_containment() {
                    return self.op.holds(Some(Ordering::Equal));
                }
                let a = pool.get(ca).unwrap_or_default();
                let b = pool.get(cb).unwrap_or_default();
                self.op.holds_str(a, b)
            }
            // Kinds are checked in `bind`.
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum BoundPredicate {
    Const(bool),
    Atom(BoundAtom),
    And(Box<BoundPredicate>, Box<BoundPredicate>),
    Or(Box<BoundPredicate>, Box<BoundPredicate>),
    Not(Box<BoundPredicate>),
}

impl BoundPredicate {
    pub(crate) fn eval(&self, table: &Table, pool: &StringPool, row: usize) -> bool {
        match self {
            BoundPredicate::Const(b) => *b,
            BoundPredicate::Atom(a) => a.eval(table, pool, row),
            BoundPredicate::And(a, b) => a.eval(table, pool, row) && b.eval(table, pool, row),
            BoundPredicate::Or(a, b) => a.eval(table, pool, row) || b.eval(table, pool, row),
            BoundPredicate::Not(a) => !a.eval(table, pool, row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_literals() {
        assert_eq!(
            Predicate::parse_simple("A > 1").unwrap(),
            Predicate::lit("A", CompareOp::Gt, 1i64)
        );
        assert_eq!(
            Predicate::parse_simple("W <= 2.5").unwrap(),
            Predicate::lit("W", CompareOp::Lte, 2.5)
        );
        assert_eq!(
            Predicate::parse_simple("Name == 'a b'").unwrap(),
            Predicate::lit("Name", CompareOp::Eq, "a b")
        );
        assert!(Predicate::parse_simple("A >").is_err());
        assert!(Predicate::parse_simple("A ~ 1").is_err());
    }

    #[test]
    fn parse_simple_tolerates_extra_spacing() {
        assert_eq!(
            Predicate::parse_simple("  A  >\t1 ").unwrap(),
            Predicate::lit("A", CompareOp::Gt, 1i64)
        );
        assert_eq!(
            Predicate::parse_simple("Name   ==   'a  b'").unwrap(),
            Predicate::lit("Name", CompareOp::Eq, "a  b")
        );
        assert!(Predicate::parse_simple("A  >   ").is_err());
    }

    #[test]
    fn nan_only_satisfies_neq() {
        assert!(CompareOp::Neq.holds(None));
        assert!(!CompareOp::Eq.holds(None));
        assert!(!CompareOp::Lt.holds(None));
    }

    #[test]
    fn containment() {
        assert!(CompareOp::Substr.holds_str("ell", "hello"));
        assert!(!CompareOp::Substr.holds_str("hello", "ell"));
        assert!(CompareOp::Superstr.holds_str("hello", "ell"));
        assert!(CompareOp::Lt.holds_str("abc", "abd"));
    }
}
