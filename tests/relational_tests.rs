//! Selection, grouping, aggregation, joins and set algebra across tables.

mod test_data_gen;

use std::collections::HashMap;

use proptest::prelude::*;
use reltab_core::context::Context;
use reltab_core::error::Error;
use reltab_core::types::Value;
use reltab_table::{AggrPolicy, CompareOp, Predicate};
use test_data_gen::{ab_table, generate_people, keyed_table, snapshot};

#[test]
fn test_unique_keeps_first_occurrence_in_order() {
    let ctx = Context::new();
    let mut t = ab_table(&ctx, &[(1, "x"), (2, "y"), (1, "x")]);
    t.unique_cols(&["A", "B"], true).unwrap();
    assert_eq!(
        snapshot(&t),
        vec![
            vec![Value::Int(1), Value::from("x")],
            vec![Value::Int(2), Value::from("y")],
        ]
    );
}

#[test]
fn test_unique_is_idempotent() {
    let ctx = Context::new();
    let mut t = generate_people(&ctx, 300, 7, 3);
    t.unique_cols(&["Group", "Name"], false).unwrap();
    let once = snapshot(&t);
    t.unique_cols(&["Group", "Name"], false).unwrap();
    assert_eq!(snapshot(&t), once);
}

#[test]
fn test_select_with_removal() {
    let ctx = Context::new();
    let mut t = ab_table(&ctx, &[(1, "x"), (2, "y"), (3, "z")]);
    let hits = t.select(&Predicate::lit("A", CompareOp::Gt, 1i64), true).unwrap();
    assert_eq!(hits, vec![1, 2]);
    assert_eq!(
        snapshot(&t),
        vec![
            vec![Value::Int(2), Value::from("y")],
            vec![Value::Int(3), Value::from("z")],
        ]
    );
}

#[test]
fn test_select_kind_mismatch_leaves_table_alone() {
    let ctx = Context::new();
    let mut t = ab_table(&ctx, &[(1, "x"), (2, "y")]);
    let bad = Predicate::lit("B", CompareOp::Gt, 1i64);
    assert!(matches!(t.select(&bad, true), Err(Error::Schema(_))));
    assert_eq!(t.num_valid_rows(), 2);
}

#[test]
fn test_count_aggregate_sums_to_row_count() {
    let ctx = Context::new();
    let mut t = generate_people(&ctx, 500, 9, 21);
    t.remove_rows(&[0, 10, 20, 30]).unwrap();
    let valid = t.num_valid_rows();

    let grouping = t.group_rows(&["Group"], true).unwrap();
    t.aggregate(&["Group"], AggrPolicy::Count, "Score", "N", true).unwrap();

    let mut total = 0;
    for (_, _, rows) in grouping.iter() {
        let n = t.int_val("N", rows[0]).unwrap();
        assert_eq!(n as usize, rows.len());
        assert!(rows.iter().all(|&r| t.int_val("N", r).unwrap() == n));
        total += rows.len();
    }
    assert_eq!(total, valid);
}

#[test]
fn test_mean_and_median_per_group() {
    let ctx = Context::new();
    let mut t = ab_table(&ctx, &[(1, "g"), (5, "g"), (3, "g"), (10, "h")]);
    t.aggregate(&["B"], AggrPolicy::Mean, "A", "Mean", true).unwrap();
    t.aggregate(&["B"], AggrPolicy::Median, "A", "Median", true).unwrap();
    assert_eq!(t.read_flt_col("Mean").unwrap(), vec![3.0, 3.0, 3.0, 10.0]);
    assert_eq!(t.read_int_col("Median").unwrap(), vec![3, 3, 3, 10]);
}

#[test]
fn test_group_column_and_frequency_table() {
    let ctx = Context::new();
    let mut t = ab_table(&ctx, &[(1, "b"), (2, "a"), (3, "b")]);
    t.group(&["B"], "G", true).unwrap();
    let g = t.read_int_col("G").unwrap();
    assert_eq!(g[0], g[2]);
    assert_ne!(g[0], g[1]);

    let freq = t.frequency_table("B", "freq").unwrap();
    let counts: HashMap<String, i64> = freq
        .read_str_col("B")
        .unwrap()
        .into_iter()
        .zip(freq.read_int_col("Count").unwrap())
        .collect();
    assert_eq!(counts["b"], 2);
    assert_eq!(counts["a"], 1);
}

#[test]
fn test_join_across_contexts() {
    let left_ctx = Context::new();
    let right_ctx = Context::new();
    right_ctx.intern("padding").unwrap();
    let left = ab_table(&left_ctx, &[(1, "x"), (2, "y")]);
    let right = ab_table(&right_ctx, &[(9, "y"), (8, "x"), (7, "x")]);
    let j = left.join("B", &right, "B").unwrap();
    assert_eq!(j.num_valid_rows(), 3);
    assert_eq!(j.read_int_col("1.A").unwrap(), vec![1, 1, 2]);
    assert_eq!(j.read_int_col("2.A").unwrap(), vec![8, 7, 9]);
    assert_eq!(j.read_str_col("1.B").unwrap(), j.read_str_col("2.B").unwrap());
}

#[test]
fn test_union_family_counts() {
    let ctx = Context::new();
    let a = ab_table(&ctx, &[(1, "x"), (2, "y"), (2, "y")]);
    let b = ab_table(&ctx, &[(2, "y"), (3, "z")]);

    let all = a.union_all(&b, "all").unwrap();
    assert_eq!(all.num_valid_rows(), 5);
    let u = a.union(&b, "u").unwrap();
    assert_eq!(u.read_int_col("A").unwrap(), vec![1, 2, 3]);
    assert!(u.num_valid_rows() <= all.num_valid_rows());

    assert_eq!(a.intersection(&b, "i").unwrap().read_int_col("A").unwrap(), vec![2, 2]);
    assert_eq!(a.minus(&b, "m").unwrap().read_int_col("A").unwrap(), vec![1]);
}

#[test]
fn test_set_ops_reject_incompatible_schemas() {
    let ctx = Context::new();
    let a = ab_table(&ctx, &[(1, "x")]);
    let b = keyed_table(&ctx, "k", &[1]);
    assert!(matches!(a.union_all(&b, "u"), Err(Error::Schema(_))));
}

#[test]
fn test_project_then_union_with_ids() {
    let ctx = Context::new();
    let mut a = generate_people(&ctx, 20, 3, 5);
    a.init_ids().unwrap();
    let p = a.project(&["Group", "_id"], "p").unwrap();
    let u = p.union(&p, "u").unwrap();
    // Ids are ignored by full-row equality, so only distinct groups remain.
    let distinct: std::collections::HashSet<i64> = p.read_int_col("Group").unwrap().into_iter().collect();
    assert_eq!(u.num_valid_rows(), distinct.len());
    assert_eq!(u.read_int_col("_id").unwrap(), (0..distinct.len() as i64).collect::<Vec<_>>());
}

proptest! {
    #[test]
    fn prop_join_cardinality(
        left in prop::collection::vec(0i64..6, 0..40),
        right in prop::collection::vec(0i64..6, 0..40),
    ) {
        let ctx = Context::new();
        let a = keyed_table(&ctx, "a", &left);
        let b = keyed_table(&ctx, "b", &right);
        let j = a.join("K", &b, "K").unwrap();

        let mut sizes: HashMap<i64, (usize, usize)> = HashMap::new();
        for k in &left {
            sizes.entry(*k).or_default().0 += 1;
        }
        for k in &right {
            sizes.entry(*k).or_default().1 += 1;
        }
        let expected: usize = sizes.values().map(|(x, y)| x * y).sum();
        prop_assert_eq!(j.num_valid_rows(), expected);
        prop_assert_eq!(j.read_int_col("1.K").unwrap(), j.read_int_col("2.K").unwrap());
    }

    #[test]
    fn prop_union_bounded_by_union_all(
        left in prop::collection::vec(0i64..5, 0..20),
        right in prop::collection::vec(0i64..5, 0..20),
    ) {
        let ctx = Context::new();
        let a = keyed_table(&ctx, "a", &left).project(&["K"], "a").unwrap();
        let b = keyed_table(&ctx, "b", &right).project(&["K"], "b").unwrap();
        let all = a.union_all(&b, "all").unwrap();
        let u = a.union(&b, "u").unwrap();
        let distinct: std::collections::HashSet<i64> = left.iter().chain(&right).copied().collect();
        prop_assert_eq!(all.num_valid_rows(), left.len() + right.len());
        prop_assert_eq!(u.num_valid_rows(), distinct.len());
    }
}
