#![forbid(unsafe_code)]
//! reltab-core: shared vocabulary for the table engine.
//!
//! Everything here is pure data: attribute kinds and schemas, scalar values,
//! the string-interning `Context`, configuration and stable hashing. Storage,
//! iteration and the relational algorithms live in `reltab-table`; binary
//! persistence lives in `reltab-io`.

pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod types;
