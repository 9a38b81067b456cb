//! Logical schema types. Pure data.
//!
//! A schema is an ordered list of `(name, kind)` pairs. Order is presentation
//! order only; tables store each kind in its own dense column set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The three stored attribute kinds. There is no coercion between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttrType {
    Int = 0,
    Flt = 1,
    Str = 2,
}

impl AttrType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(AttrType::Int),
            1 => Ok(AttrType::Flt),
            2 => Ok(AttrType::Str),
            other => Err(Error::Io(format!("unknown attribute kind tag {other}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttrType::Int => "int",
            AttrType::Flt => "float",
            AttrType::Str => "string",
        }
    }
}

impl std::fmt::Display for AttrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: AttrType,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: AttrType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Build a schema from `(name, kind)` pairs, rejecting duplicate names.
    pub fn try_from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, AttrType)>,
        S: Into<String>,
    {
        let schema = Self::new(
            pairs
                .into_iter()
                .map(|(name, kind)| Field::new(name, kind))
                .collect(),
        );
        schema.validate()?;
        Ok(schema)
    }

    /// Column names must be unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(Error::Schema(format!("{}: duplicate column name", f.name)));
            }
        }
        Ok(())
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of columns of the given kind.
    pub fn count_of(&self, kind: AttrType) -> usize {
        self.fields.iter().filter(|f| f.kind == kind).count()
    }

    /// Same names and kinds in the same order.
    pub fn is_compatible(&self, other: &Schema) -> bool {
        self == other
    }
}
