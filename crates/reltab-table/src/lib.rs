//! reltab-table: the columnar `Table`.
//!
//! Rows live in parallel typed column arrays; logical order is a chain of
//! next-links over physical slots so that removal is O(1) and compaction is
//! explicit. On top of that sit the two cursor protocols, the hybrid sort,
//! hash grouping with policy-driven aggregation, predicate selection, the
//! equality join, set algebra, projection and column arithmetic.

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod arith;
pub mod buckets;
pub mod graph;
pub mod group;
pub mod iter;
pub mod join;
pub mod predicate;
pub mod project;
pub mod select;
pub mod seq;
pub mod setops;
pub mod sort;
pub mod table;

pub use aggregate::AggrPolicy;
pub use arith::ArithOp;
pub use graph::GraphHints;
pub use group::{GroupKey, Grouping};
pub use iter::{RemoveCursor, RowCursor, Rows};
pub use predicate::{CompareOp, Predicate};
pub use seq::TableSeqIter;
pub use table::{ColumnRef, Table, TableParts};
