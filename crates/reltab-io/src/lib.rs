#![forbid(unsafe_code)]
//! reltab-io: binary persistence for tables and their string contexts.
//!
//! A saved table holds string codes, not strings, so its context must be
//! saved too and loaded first. Each is written as one checksummed segment
//! (see [`segment`]); the payload can be compressed with any codec enabled
//! at build time.
//!
//! Every public function reports failures as `reltab_core::error::Error::Io`.
//! A failed load never returns a partially built table.

pub mod codec;
pub mod context;
pub mod error;
pub mod fs;
pub mod segment;
pub mod table;
pub mod wire;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use reltab_core::context::Context;
use reltab_core::error::Result;
use reltab_table::Table;

pub use codec::Codec;
pub use fs::{load_context_from_path, load_table_from_path, save_context_to_path, save_table_to_path};
use segment::SegmentKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    pub codec: Codec,
}

impl SaveOptions {
    pub fn with_codec(codec: Codec) -> Self {
        Self { codec }
    }
}

/// Write `table` (valid rows only, in logical order). Returns bytes written.
pub fn save_table<W: Write>(table: &Table, out: &mut W, opts: &SaveOptions) -> Result<u64> {
    let payload = table::encode_table(table);
    let written = segment::write_segment(out, SegmentKind::Table, opts.codec, &payload)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        table = table.name(),
        rows = table.num_valid_rows(),
        payload = payload.len(),
        written,
        codec = ?opts.codec,
        "saved table"
    );
    Ok(written)
}

/// Read one table whose string codes refer to `context`.
pub fn load_table<R: Read>(input: &mut R, context: &Context) -> Result<Table> {
    let payload = segment::read_segment(input, SegmentKind::Table)?;
    let table = table::decode_table(&payload, context)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(table = table.name(), rows = table.num_rows(), "loaded table");
    Ok(table)
}

pub fn save_context<W: Write>(context: &Context, out: &mut W, opts: &SaveOptions) -> Result<u64> {
    let payload = context::encode_context(context);
    let written = segment::write_segment(out, SegmentKind::Context, opts.codec, &payload)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(strings = context.len(), written, "saved context");
    Ok(written)
}

pub fn load_context<R: Read>(input: &mut R) -> Result<Context> {
    let payload = segment::read_segment(input, SegmentKind::Context)?;
    let context = context::decode_context(&payload)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(strings = context.len(), "loaded context");
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::error::Error;
    use reltab_core::schema::{AttrType, Schema};
    use reltab_core::types::Value;

    fn people(ctx: &Context) -> Table {
        let schema = Schema::try_from_pairs([("Name", AttrType::Str), ("Age", AttrType::Int)]).unwrap();
        let mut t = Table::new("people", schema, ctx).unwrap();
        for (n, a) in [("ann", 31), ("bob", 25), ("cy", 40)] {
            t.add_row_values(&[Value::from(n), Value::Int(a)]).unwrap();
        }
        t
    }

    #[test]
    fn context_then_table_in_one_stream() {
        let ctx = Context::new();
        let t = people(&ctx);
        let mut buf = Vec::new();
        save_context(&ctx, &mut buf, &SaveOptions::default()).unwrap();
        save_table(&t, &mut buf, &SaveOptions::default()).unwrap();

        let mut input = buf.as_slice();
        let ctx2 = load_context(&mut input).unwrap();
        let t2 = load_table(&mut input, &ctx2).unwrap();
        assert!(input.is_empty());
        assert_eq!(t2.read_str_col("Name").unwrap(), vec!["ann", "bob", "cy"]);
        assert_eq!(t2.read_int_col("Age").unwrap(), vec![31, 25, 40]);
    }

    #[test]
    fn corruption_surfaces_as_io_error() {
        let ctx = Context::new();
        let mut buf = Vec::new();
        save_table(&people(&ctx), &mut buf, &SaveOptions::default()).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0x55;
        assert!(matches!(load_table(&mut buf.as_slice(), &ctx), Err(Error::Io(_))));
    }

    #[test]
    fn unavailable_codec_fails_on_save() {
        let ctx = Context::new();
        let mut buf = Vec::new();
        for codec in [Codec::Zstd, Codec::Lz4] {
            let res = save_table(&people(&ctx), &mut buf, &SaveOptions::with_codec(codec));
            assert_eq!(res.is_ok(), codec.is_available());
        }
    }

    #[test]
    fn path_helpers_create_parents() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let t = people(&ctx);
        let ctx_path = dir.path().join("nested/ctx.bin");
        let tab_path = dir.path().join("nested/people.bin");
        save_context_to_path(&ctx, &ctx_path, &SaveOptions::default()).unwrap();
        save_table_to_path(&t, &tab_path, &SaveOptions::default()).unwrap();

        let ctx2 = load_context_from_path(&ctx_path).unwrap();
        let t2 = load_table_from_path(&tab_path, &ctx2).unwrap();
        assert_eq!(t2.schema(), t.schema());
        assert!(load_table_from_path(dir.path().join("missing.bin"), &ctx2).is_err());
    }
}
