//! Save/load round trips through streams and files.

mod test_data_gen;

use proptest::prelude::*;
use reltab_core::context::Context;
use reltab_core::error::Error;
use reltab_io::{Codec, SaveOptions};
use test_data_gen::{ab_table, generate_people, snapshot, Lcg};

fn roundtrip_stream(t: &reltab_table::Table, ctx: &Context, opts: &SaveOptions) -> reltab_table::Table {
    let mut buf = Vec::new();
    reltab_io::save_context(ctx, &mut buf, opts).expect("Failed to save context");
    reltab_io::save_table(t, &mut buf, opts).expect("Failed to save table");
    let mut input = buf.as_slice();
    let ctx2 = reltab_io::load_context(&mut input).expect("Failed to load context");
    reltab_io::load_table(&mut input, &ctx2).expect("Failed to load table")
}

#[test]
fn test_roundtrip_after_removal_and_defrag() {
    let ctx = Context::new();
    let mut t = generate_people(&ctx, 400, 6, 17);
    t.init_ids().unwrap();
    let mut rng = Lcg::new(5);
    for _ in 0..150 {
        let live = t.row_ids();
        t.remove_row(live[rng.below(live.len() as u64) as usize]).unwrap();
    }
    t.order(&["Group", "Score"], None, false, true).unwrap();
    let removed_view = snapshot(&t);

    let back = roundtrip_stream(&t, &ctx, &SaveOptions::default());
    assert_eq!(back.schema(), t.schema());
    assert_eq!(snapshot(&back), removed_view);
    assert_eq!(back.id_col_name(), Some("_id"));

    t.defrag();
    let back = roundtrip_stream(&t, &ctx, &SaveOptions::default());
    assert_eq!(snapshot(&back), removed_view);
    for (pos, id) in back.read_int_col("_id").unwrap().into_iter().enumerate() {
        assert_eq!(back.physical_row_of(id), Some(pos));
    }
}

#[test]
fn test_roundtrip_with_enabled_codecs() {
    let ctx = Context::new();
    let t = generate_people(&ctx, 250, 3, 8);
    for codec in [Codec::None, Codec::Zstd, Codec::Lz4] {
        if !codec.is_available() {
            continue;
        }
        let back = roundtrip_stream(&t, &ctx, &SaveOptions::with_codec(codec));
        assert_eq!(snapshot(&back), snapshot(&t), "codec {codec:?}");
    }
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let ctx = Context::new();
    let t = ab_table(&ctx, &[(1, "x"), (2, "y")]);
    let ctx_path = dir.path().join("ctx.rtab");
    let t_path = dir.path().join("tables/ab.rtab");
    reltab_io::save_context_to_path(&ctx, &ctx_path, &SaveOptions::default()).unwrap();
    reltab_io::save_table_to_path(&t, &t_path, &SaveOptions::default()).unwrap();

    let ctx2 = reltab_io::load_context_from_path(&ctx_path).unwrap();
    let back = reltab_io::load_table_from_path(&t_path, &ctx2).unwrap();
    assert_eq!(snapshot(&back), snapshot(&t));
}

#[test]
fn test_table_needs_its_context() {
    let ctx = Context::new();
    let t = ab_table(&ctx, &[(1, "x"), (2, "y"), (3, "z")]);
    let mut buf = Vec::new();
    reltab_io::save_table(&t, &mut buf, &SaveOptions::default()).unwrap();
    let empty = Context::new();
    assert!(matches!(reltab_io::load_table(&mut buf.as_slice(), &empty), Err(Error::Io(_))));
}

#[test]
fn test_context_segment_is_not_a_table() {
    let ctx = Context::new();
    ctx.intern("x").unwrap();
    let mut buf = Vec::new();
    reltab_io::save_context(&ctx, &mut buf, &SaveOptions::default()).unwrap();
    assert!(matches!(reltab_io::load_table(&mut buf.as_slice(), &ctx), Err(Error::Io(_))));
}

proptest! {
    #[test]
    fn prop_single_byte_corruption_is_detected(pos in any::<prop::sample::Index>(), flip in 1u8..=255) {
        let ctx = Context::new();
        let t = ab_table(&ctx, &[(1, "x"), (2, "y"), (3, "z")]);
        let mut buf = Vec::new();
        reltab_io::save_table(&t, &mut buf, &SaveOptions::default()).unwrap();
        let at = pos.index(buf.len());
        buf[at] ^= flip;
        prop_assert!(reltab_io::load_table(&mut buf.as_slice(), &ctx).is_err());
    }

    #[test]
    fn prop_roundtrip_preserves_values(values in prop::collection::vec((any::<i64>(), "[a-c]{0,3}"), 0..30)) {
        let ctx = Context::new();
        let rows: Vec<(i64, &str)> = values.iter().map(|(a, b)| (*a, b.as_str())).collect();
        let t = ab_table(&ctx, &rows);
        let back = roundtrip_stream(&t, &ctx, &SaveOptions::default());
        prop_assert_eq!(snapshot(&back), snapshot(&t));
    }
}
