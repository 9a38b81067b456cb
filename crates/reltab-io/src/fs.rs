//! Path-based wrappers around the stream functions.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use reltab_core::context::Context;
use reltab_core::error::{Error, Result};
use reltab_table::Table;

use crate::SaveOptions;

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::Io(format!("mkparent {}: {e}", parent.display())))?;
    }
    let f = File::create(path).map_err(|e| Error::Io(format!("create {}: {e}", path.display())))?;
    Ok(BufWriter::new(f))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let f = File::open(path).map_err(|e| Error::Io(format!("open {}: {e}", path.display())))?;
    Ok(BufReader::new(f))
}

pub fn save_table_to_path(table: &Table, path: impl AsRef<Path>, opts: &SaveOptions) -> Result<u64> {
    crate::save_table(table, &mut create(path.as_ref())?, opts)
}

pub fn load_table_from_path(path: impl AsRef<Path>, context: &Context) -> Result<Table> {
    crate::load_table(&mut open(path.as_ref())?, context)
}

pub fn save_context_to_path(context: &Context, path: impl AsRef<Path>, opts: &SaveOptions) -> Result<u64> {
    crate::save_context(context, &mut create(path.as_ref())?, opts)
}

pub fn load_context_from_path(path: impl AsRef<Path>) -> Result<Context> {
    crate::load_context(&mut open(path.as_ref())?)
}
