//! Strongly-typed identifiers used across the engine.
//!
//! Physical row indices stay plain `usize` (they index the column arrays
//! directly); everything else that is an identifier gets a newtype.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(v: $repr) -> Self {
                Self(v)
            }
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Interned string code, dense from 0 in first-intern order.
new_id!(StrCode, u32);
// Group id assigned by grouping, dense from 0.
new_id!(GroupId, u64);

impl StrCode {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl GroupId {
    /// Group ids are stored in integer columns.
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }
}
