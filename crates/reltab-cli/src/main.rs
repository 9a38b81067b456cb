//! reltab CLI: inspect and re-encode saved tables.

use clap::{Parser, Subcommand};
use reltab_core::context::Context;
use reltab_io::{Codec, SaveOptions};
use reltab_table::{Predicate, Table};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "reltab")]
#[command(about = "Inspect and re-encode saved reltab tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a saved table's schema, row counts and leading rows
    Inspect {
        /// Context the table's string codes refer to
        #[arg(short, long)]
        context: PathBuf,

        /// Saved table
        #[arg(short, long)]
        table: PathBuf,

        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        rows: usize,

        /// Print name, schema and counts as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Only show rows matching `column OP literal`, e.g. "Age >= 30"
        #[arg(long)]
        filter: Option<String>,
    },

    /// Re-encode a saved table, e.g. to switch its compression codec.
    /// Saved tables are always compacted, so the rows are written as loaded.
    Recode {
        #[arg(short, long)]
        context: PathBuf,

        #[arg(short, long)]
        table: PathBuf,

        /// Output path
        #[arg(short, long)]
        out: PathBuf,

        /// none, zstd or lz4 (the latter two need their cargo feature)
        #[arg(long, default_value = "none")]
        codec: Codec,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            context,
            table,
            rows,
            json,
            filter,
        } => {
            if let Err(e) = inspect(&context, &table, rows, json, filter.as_deref()) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Recode {
            context,
            table,
            out,
            codec,
        } => match recode(&context, &table, &out, codec) {
            Ok(written) => println!("✓ Wrote {} bytes to {}", written, out.display()),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn load(context_path: &Path, table_path: &Path) -> Result<Table, Box<dyn std::error::Error>> {
    let ctx: Context = reltab_io::load_context_from_path(context_path)?;
    Ok(reltab_io::load_table_from_path(table_path, &ctx)?)
}

fn inspect(
    context_path: &Path,
    table_path: &Path,
    rows: usize,
    json: bool,
    filter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut table = load(context_path, table_path)?;
    if let Some(expr) = filter {
        let pred = Predicate::parse_simple(expr)?;
        table.select(&pred, true)?;
    }

    if json {
        let summary = serde_json::json!({
            "name": table.name(),
            "schema": table.schema(),
            "rows": table.num_valid_rows(),
            "id_col": table.id_col_name(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Table: {}", table.name());
    println!("Rows:  {}", table.num_valid_rows());
    if let Some(id) = table.id_col_name() {
        println!("Ids:   {}", id);
    }
    println!();
    for line in render_rows(&table, rows)? {
        println!("{}", line);
    }
    Ok(())
}

/// Header line of `name:kind` pairs followed by up to `limit` rows, all
/// tab-separated.
fn render_rows(table: &Table, limit: usize) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let header = table
        .schema()
        .fields
        .iter()
        .map(|f| format!("{}:{}", f.name, f.kind))
        .collect::<Vec<_>>()
        .join("\t");
    let mut lines = vec![header];
    for row in table.row_ids().into_iter().take(limit) {
        let values = table.row_values(row)?;
        lines.push(
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\t"),
        );
    }
    Ok(lines)
}

fn recode(
    context_path: &Path,
    table_path: &Path,
    out: &Path,
    codec: Codec,
) -> Result<u64, Box<dyn std::error::Error>> {
    let table = load(context_path, table_path)?;
    Ok(reltab_io::save_table_to_path(&table, out, &SaveOptions::with_codec(codec))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltab_core::schema::{AttrType, Schema};
    use reltab_core::types::Value;

    fn scores(ctx: &Context) -> Table {
        let schema = Schema::try_from_pairs([("Who", AttrType::Str), ("Score", AttrType::Flt)]).unwrap();
        let mut t = Table::new("scores", schema, ctx).unwrap();
        for (w, s) in [("ann", 1.5), ("bob", 2.0), ("cy", 0.25)] {
            t.add_row_values(&[Value::from(w), Value::Flt(s)]).unwrap();
        }
        t
    }

    #[test]
    fn renders_header_and_limited_rows() {
        let ctx = Context::new();
        let mut t = scores(&ctx);
        t.remove_row(0).unwrap();
        let lines = render_rows(&t, 1).unwrap();
        assert_eq!(lines, vec!["Who:string\tScore:float".to_string(), "bob\t2.000000".to_string()]);
    }

    #[test]
    fn recode_rewrites_saved_table() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let mut t = scores(&ctx);
        t.remove_row(1).unwrap();
        let (cp, tp, out) = (dir.path().join("ctx.bin"), dir.path().join("t.bin"), dir.path().join("out.bin"));
        reltab_io::save_context_to_path(&ctx, &cp, &SaveOptions::default()).unwrap();
        reltab_io::save_table_to_path(&t, &tp, &SaveOptions::default()).unwrap();

        let written = recode(&cp, &tp, &out, Codec::None).unwrap();
        assert_eq!(written, std::fs::metadata(&out).unwrap().len());
        let back = load(&cp, &out).unwrap();
        assert_eq!(back.read_str_col("Who").unwrap(), vec!["ann", "cy"]);
        // Same codec, same bytes: the saved table was already compact.
        assert_eq!(std::fs::read(&tp).unwrap(), std::fs::read(&out).unwrap());
    }
}
