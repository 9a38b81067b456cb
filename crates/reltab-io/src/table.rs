//! Table payload encoding.
//!
//! Tables are written compacted: only valid rows, in logical order, so the
//! stored chain is always `0 -> 1 -> ... -> n-1`. The lifecycle counters are
//! still written and checked on load so a foreign writer that emits a
//! non-compacted payload is rejected instead of misread.

use reltab_core::context::Context;
use reltab_core::id::StrCode;
use reltab_core::schema::{AttrType, Field, Schema};
use reltab_table::{Table, TableParts};

use crate::error::{Error, Result};
use crate::wire::{Decoder, Encoder};

const NO_ROW: u64 = u64::MAX;

/// Row limit for a table without columns, whose payload cannot vouch for it.
const MAX_COLUMNLESS_ROWS: usize = 1 << 24;

pub fn encode_table(table: &Table) -> Vec<u8> {
    let parts = table.to_parts();
    let n = table.num_valid_rows();

    let mut enc = Encoder::new();
    enc.str(&parts.name).u32(parts.schema.len() as u32);
    for f in &parts.schema.fields {
        enc.str(&f.name).u8(f.kind as u8);
    }
    let (first, last) = match n {
        0 => (NO_ROW, NO_ROW),
        n => (0, n as u64 - 1),
    };
    enc.u64(n as u64).u64(n as u64).u64(first).u64(last);

    for col in &parts.int_cols {
        col.iter().for_each(|v| {
            enc.i64(*v);
        });
    }
    for col in &parts.flt_cols {
        col.iter().for_each(|v| {
            enc.f64(*v);
        });
    }
    for col in &parts.str_cols {
        col.iter().for_each(|c| {
            enc.u32(c.get());
        });
    }

    match &parts.id_col {
        Some(id) => {
            enc.u8(1).str(id).u64(parts.id_map.len() as u64);
            for (id, pos) in &parts.id_map {
                enc.i64(*id).u64(*pos as u64);
            }
        }
        None => {
            enc.u8(0);
        }
    }
    enc.into_bytes()
}

fn decode_schema(dec: &mut Decoder<'_>) -> Result<Schema> {
    let n = dec.u32()? as usize;
    let mut fields = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        let name = dec.str()?;
        let kind = AttrType::from_u8(dec.u8()?)?;
        fields.push(Field::new(name, kind));
    }
    Ok(Schema::new(fields))
}

fn decode_lifecycle(dec: &mut Decoder<'_>) -> Result<usize> {
    let (rows, valid, first, last) = (dec.u64()?, dec.u64()?, dec.u64()?, dec.u64()?);
    let sequential = match rows {
        0 => first == NO_ROW && last == NO_ROW,
        n => first == 0 && last == n - 1,
    };
    if rows != valid || !sequential {
        return Err(Error::Storage(format!(
            "table is not compacted: rows={rows} valid={valid} first={first} last={last}"
        )));
    }
    usize::try_from(rows).map_err(|_| Error::Storage(format!("row count {rows} too large")))
}

fn decode_cols<T>(
    dec: &mut Decoder<'_>,
    count: usize,
    rows: usize,
    mut read: impl FnMut(&mut Decoder<'_>) -> Result<T>,
) -> Result<Vec<Vec<T>>> {
    (0..count)
        .map(|_| (0..rows).map(|_| read(dec)).collect::<Result<Vec<T>>>())
        .collect()
}

pub fn decode_table(payload: &[u8], context: &Context) -> Result<Table> {
    let mut dec = Decoder::new(payload);
    let name = dec.str()?;
    let schema = decode_schema(&mut dec)?;
    let rows = decode_lifecycle(&mut dec)?;

    // Each cell takes at least four bytes; reject counts the payload cannot hold.
    if rows.saturating_mul(schema.len()).saturating_mul(4) > payload.len() - dec.position() {
        return Err(Error::Storage(format!(
            "{rows} rows x {} columns exceed the payload",
            schema.len()
        )));
    }
    if schema.is_empty() && rows > MAX_COLUMNLESS_ROWS {
        return Err(Error::Storage(format!("{rows} rows in a table without columns")));
    }
    let int_cols = decode_cols(&mut dec, schema.count_of(AttrType::Int), rows, |d| d.i64())?;
    let flt_cols = decode_cols(&mut dec, schema.count_of(AttrType::Flt), rows, |d| d.f64())?;
    let str_cols = decode_cols(&mut dec, schema.count_of(AttrType::Str), rows, |d| {
        d.u32().map(StrCode::new)
    })?;

    let (id_col, id_map) = match dec.u8()? {
        0 => (None, Vec::new()),
        1 => {
            let id = dec.str()?;
            let n = dec.count(16)?;
            let map = (0..n)
                .map(|_| Ok((dec.i64()?, dec.u64()? as usize)))
                .collect::<Result<Vec<_>>>()?;
            (Some(id), map)
        }
        other => return Err(Error::Storage(format!("bad id-column flag {other}"))),
    };
    dec.finish()?;

    let parts = TableParts { name, schema, rows, int_cols, flt_cols, str_cols, id_col, id_map };
    Ok(Table::from_parts(parts, context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::types::{RowBuffer, Value};

    fn sample(ctx: &Context) -> Table {
        let schema = Schema::try_from_pairs([
            ("K", AttrType::Int),
            ("W", AttrType::Flt),
            ("S", AttrType::Str),
        ])
        .unwrap();
        let mut t = Table::new("sample", schema, ctx).unwrap();
        for (k, w, s) in [(3, 0.5, "c"), (1, -2.0, "a"), (2, 1e9, "b")] {
            t.add_row_values(&[Value::Int(k), Value::Flt(w), Value::from(s)]).unwrap();
        }
        t
    }

    #[test]
    fn payload_roundtrip_after_removal() {
        let ctx = Context::new();
        let mut t = sample(&ctx);
        t.init_ids().unwrap();
        t.remove_row(1).unwrap();
        let back = decode_table(&encode_table(&t), &ctx).unwrap();
        assert_eq!(back.name(), "sample");
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.read_int_col("K").unwrap(), vec![3, 2]);
        assert_eq!(back.read_str_col("S").unwrap(), vec!["c", "b"]);
        assert_eq!(back.physical_row_of(2), Some(1));
        assert_eq!(back.physical_row_of(1), None);
    }

    #[test]
    fn empty_table() {
        let ctx = Context::new();
        let mut t = sample(&ctx);
        t.remove_rows(&[0, 1, 2]).unwrap();
        let back = decode_table(&encode_table(&t), &ctx).unwrap();
        assert_eq!(back.num_valid_rows(), 0);
        assert_eq!(back.first_valid_row(), None);
        assert_eq!(back.schema(), t.schema());
    }

    #[test]
    fn columnless_table_keeps_its_rows() {
        let ctx = Context::new();
        let mut t = Table::new("bare", Schema::default(), &ctx).unwrap();
        for _ in 0..3 {
            t.add_row(&RowBuffer::new()).unwrap();
        }
        let back = decode_table(&encode_table(&t), &ctx).unwrap();
        assert_eq!(back.num_valid_rows(), 3);
        assert_eq!(back.row_ids(), vec![0, 1, 2]);
        assert!(back.schema().is_empty());
    }

    #[test]
    fn foreign_context_code_is_rejected() {
        let ctx = Context::new();
        let bytes = encode_table(&sample(&ctx));
        let small = Context::from_strings(vec!["a".into()]).unwrap();
        assert!(matches!(decode_table(&bytes, &small), Err(Error::Core(_))));
    }

    #[test]
    fn every_truncation_fails() {
        let ctx = Context::new();
        let bytes = encode_table(&sample(&ctx));
        for cut in 0..bytes.len() {
            assert!(decode_table(&bytes[..cut], &ctx).is_err(), "cut at {cut}");
        }
    }
}
