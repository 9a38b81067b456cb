//! Scalar values and the row buffer used for batch inserts.
//!
//! Tables do not materialize rows; a row is a physical index into the column
//! arrays. `Value` exists for schema-ordered access and export formatting,
//! `RowBuffer` for appending one row's typed values.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::AttrType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Flt(f64),
    Str(String),
}

impl Value {
    pub fn kind(&self) -> AttrType {
        match self {
            Value::Int(_) => AttrType::Int,
            Value::Flt(_) => AttrType::Flt,
            Value::Str(_) => AttrType::Str,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flt(&self) -> Option<f64> {
        match self {
            Value::Flt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Flt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Export formatting: integers and strings verbatim, floats with six decimals.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Flt(v) => write!(f, "{v:.6}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// Compare two values of the same kind. Floats use IEEE total order so NaN
/// sorts last; mixed kinds order by kind tag.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Flt(x), Value::Flt(y)) => x.total_cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ => (a.kind() as u8).cmp(&(b.kind() as u8)),
    }
}

/// One row's values split by kind, each in type-local column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowBuffer {
    pub ints: Vec<i64>,
    pub flts: Vec<f64>,
    pub strs: Vec<String>,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_int(&mut self, v: i64) -> &mut Self {
        self.ints.push(v);
        self
    }

    pub fn add_flt(&mut self, v: f64) -> &mut Self {
        self.flts.push(v);
        self
    }

    pub fn add_str(&mut self, v: impl Into<String>) -> &mut Self {
        self.strs.push(v.into());
        self
    }

    pub fn len(&self) -> usize {
        self.ints.len() + self.flts.len() + self.strs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
