//! reltab: an embedded columnar table engine with logical row removal.
//!
//! This package ties the workspace together for integration tests and
//! benches. Applications can depend on it instead of the member crates.

pub use reltab_core as core;
pub use reltab_io as io;
pub use reltab_table as table;

pub mod prelude {
    pub use reltab_core::prelude::*;
    pub use reltab_io::{Codec, SaveOptions};
    pub use reltab_table::{AggrPolicy, CompareOp, Predicate, Table};
}
