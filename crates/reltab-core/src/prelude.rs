//! Convenient re-exports for downstream crates.

pub use crate::config::TableConfig;
pub use crate::context::{Context, StringPool};
pub use crate::error::{Error, Result};
pub use crate::id::{GroupId, StrCode};
pub use crate::schema::{AttrType, Field, Schema};
pub use crate::types::{RowBuffer, Value};
