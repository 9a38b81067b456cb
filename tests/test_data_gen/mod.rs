//! Shared table generators for the integration tests.
#![allow(dead_code)]

use reltab_core::context::Context;
use reltab_core::schema::{AttrType, Schema};
use reltab_core::types::Value;
use reltab_table::Table;

/// Small deterministic generator so failures reproduce without a seed file.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 11
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

/// `[(A:int), (B:string)]` filled with `rows`.
pub fn ab_table(ctx: &Context, rows: &[(i64, &str)]) -> Table {
    let schema = Schema::try_from_pairs([("A", AttrType::Int), ("B", AttrType::Str)])
        .expect("Failed to build schema");
    let mut t = Table::new("ab", schema, ctx).expect("Failed to create table");
    for &(a, b) in rows {
        t.add_row_values(&[Value::Int(a), Value::from(b)])
            .expect("Failed to add row");
    }
    t
}

/// `[(K:int), (V:string)]` with one row per key, `V` = "v{position}".
pub fn keyed_table(ctx: &Context, name: &str, keys: &[i64]) -> Table {
    let schema = Schema::try_from_pairs([("K", AttrType::Int), ("V", AttrType::Str)])
        .expect("Failed to build schema");
    let mut t = Table::new(name, schema, ctx).expect("Failed to create table");
    for (i, &k) in keys.iter().enumerate() {
        t.add_row_values(&[Value::Int(k), Value::from(format!("v{i}"))])
            .expect("Failed to add row");
    }
    t
}

/// `[(Id:int), (Name:string), (Group:int), (Score:float)]` with `n`
/// pseudo-random rows; `Group` takes `groups` distinct values.
pub fn generate_people(ctx: &Context, n: usize, groups: i64, seed: u64) -> Table {
    let schema = Schema::try_from_pairs([
        ("Id", AttrType::Int),
        ("Name", AttrType::Str),
        ("Group", AttrType::Int),
        ("Score", AttrType::Flt),
    ])
    .expect("Failed to build schema");
    let mut rng = Lcg::new(seed);
    let mut t = Table::new("people", schema, ctx).expect("Failed to create table");
    for i in 0..n {
        let name = format!("name-{}", rng.below(n as u64 / 2 + 1));
        let group = rng.below(groups as u64) as i64;
        let score = rng.below(10_000) as f64 / 100.0;
        t.add_row_values(&[
            Value::Int(i as i64),
            Value::from(name),
            Value::Int(group),
            Value::Flt(score),
        ])
        .expect("Failed to add row");
    }
    t
}

/// Every valid row's values, in logical order.
pub fn snapshot(t: &Table) -> Vec<Vec<Value>> {
    t.row_ids()
        .into_iter()
        .map(|r| t.row_values(r).expect("Failed to read row"))
        .collect()
}

/// Number of rows a read cursor visits from first to last.
pub fn cursor_walk_len(t: &Table) -> usize {
    let mut cursor = t.cursor();
    let mut n = 0;
    while !cursor.is_end() {
        n += 1;
        cursor.advance().expect("Failed to advance");
    }
    n
}
