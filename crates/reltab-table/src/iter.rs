//! The two cursor protocols over logical order.
//!
//! `RowCursor` is read-only and borrows the table shared, so the borrow
//! checker rules out structural mutation while one is live. `RemoveCursor`
//! borrows mutably and looks one row ahead: it reads the *next* row's values
//! and can unlink that row in O(1) using its own position as predecessor.

use reltab_core::error::{Error, Result};
use reltab_core::id::StrCode;
use reltab_core::schema::AttrType;

use crate::table::{CodeMapper, Table};

#[derive(Debug, Clone, Copy)]
pub struct RowCursor<'a> {
    table: &'a Table,
    row: Option<usize>,
}

impl<'a> RowCursor<'a> {
    pub(crate) fn new(table: &'a Table, row: Option<usize>) -> Self {
        Self { table, row }
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Physical index of the current row; `None` once past the end.
    pub fn row_idx(&self) -> Option<usize> {
        self.row
    }

    pub fn is_end(&self) -> bool {
        self.row.is_none()
    }

    fn current(&self) -> Result<usize> {
        self.row
            .ok_or_else(|| Error::IteratorState("cursor is past the last row".into()))
    }

    /// Move to the next row in logical order.
    pub fn advance(&mut self) -> Result<()> {
        let row = self.current()?;
        self.row = self.table.next_of(row);
        Ok(())
    }

    pub fn int_at(&self, col_idx: usize) -> Result<i64> {
        let row = self.current()?;
        column(&self.table.int_cols, col_idx, AttrType::Int).map(|c| c[row])
    }

    pub fn flt_at(&self, col_idx: usize) -> Result<f64> {
        let row = self.current()?;
        column(&self.table.flt_cols, col_idx, AttrType::Flt).map(|c| c[row])
    }

    pub fn str_code_at(&self, col_idx: usize) -> Result<StrCode> {
        let row = self.current()?;
        column(&self.table.str_cols, col_idx, AttrType::Str).map(|c| c[row])
    }

    pub fn str_at(&self, col_idx: usize) -> Result<String> {
        self.table.context.resolve(self.str_code_at(col_idx)?)
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.table.int_val(name, self.current()?)
    }

    pub fn flt(&self, name: &str) -> Result<f64> {
        self.table.flt_val(name, self.current()?)
    }

    pub fn str(&self, name: &str) -> Result<String> {
        self.table.str_val(name, self.current()?)
    }
}

/// Cursors are equal when they point at the same physical row of the same
/// table.
impl PartialEq for RowCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.table, other.table) && self.row == other.row
    }
}

impl Eq for RowCursor<'_> {}

fn column<T>(cols: &[Vec<T>], idx: usize, kind: AttrType) -> Result<&Vec<T>> {
    cols.get(idx)
        .ok_or_else(|| Error::Schema(format!("no {kind} column at index {idx}")))
}

/// Iterator adapter yielding a cursor per valid row.
pub struct Rows<'a> {
    table: &'a Table,
    next: Option<usize>,
}

impl<'a> Iterator for Rows<'a> {
    type Item = RowCursor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.next?;
        self.next = self.table.next_of(row);
        Some(RowCursor::new(self.table, Some(row)))
    }
}

pub struct RemoveCursor<'a> {
    table: &'a mut Table,
    current: Option<usize>,
    start: bool,
}

impl<'a> RemoveCursor<'a> {
    /// True while positioned before the first row.
    pub fn is_start(&self) -> bool {
        self.start
    }

    /// Physical index of the current row; `None` at the start position.
    pub fn row_idx(&self) -> Option<usize> {
        if self.start {
            None
        } else {
            self.current
        }
    }

    /// Physical index of the row that `advance` or `remove_next` would act on.
    pub fn next_row_idx(&self) -> Option<usize> {
        if self.start {
            self.table.first_valid
        } else {
            self.current.and_then(|r| self.table.next_of(r))
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_row_idx().is_some()
    }

    fn next_row(&self) -> Result<usize> {
        self.next_row_idx()
            .ok_or_else(|| Error::IteratorState("no row after the cursor".into()))
    }

    pub fn next_int_at(&self, col_idx: usize) -> Result<i64> {
        let row = self.next_row()?;
        column(&self.table.int_cols, col_idx, AttrType::Int).map(|c| c[row])
    }

    pub fn next_flt_at(&self, col_idx: usize) -> Result<f64> {
        let row = self.next_row()?;
        column(&self.table.flt_cols, col_idx, AttrType::Flt).map(|c| c[row])
    }

    pub fn next_str_at(&self, col_idx: usize) -> Result<String> {
        let row = self.next_row()?;
        let code = column(&self.table.str_cols, col_idx, AttrType::Str).map(|c| c[row])?;
        self.table.context.resolve(code)
    }

    pub fn next_int(&self, name: &str) -> Result<i64> {
        self.table.int_val(name, self.next_row()?)
    }

    pub fn next_flt(&self, name: &str) -> Result<f64> {
        self.table.flt_val(name, self.next_row()?)
    }

    pub fn next_str(&self, name: &str) -> Result<String> {
        self.table.str_val(name, self.next_row()?)
    }

    /// Unlink the row after the cursor. The cursor keeps its position.
    pub fn remove_next(&mut self) -> Result<usize> {
        let pred = if self.start { None } else { self.current };
        if !self.start && pred.is_none() {
            return Err(Error::IteratorState("cursor is exhausted".into()));
        }
        self.table.unlink_after(pred)
    }

    /// Step onto the next row.
    pub fn advance(&mut self) -> Result<()> {
        let next = self.next_row()?;
        self.current = Some(next);
        self.start = false;
        Ok(())
    }
}

impl Table {
    /// Read cursor on the first valid row.
    pub fn cursor(&self) -> RowCursor<'_> {
        RowCursor::new(self, self.first_valid)
    }

    /// Read cursor on an arbitrary valid row.
    pub fn cursor_at(&self, row: usize) -> Result<RowCursor<'_>> {
        self.check_row(row)?;
        Ok(RowCursor::new(self, Some(row)))
    }

    pub fn rows(&self) -> Rows<'_> {
        Rows {
            table: self,
            next: self.first_valid,
        }
    }

    /// Remove-capable cursor positioned before the first row.
    pub fn remove_cursor(&mut self) -> RemoveCursor<'_> {
        RemoveCursor {
            table: self,
            current: None,
            start: true,
        }
    }

    /// Append a copy of the cursor's row. The source table must share this
    /// table's schema.
    pub fn add_row_from(&mut self, cursor: &RowCursor<'_>) -> Result<usize> {
        let src = cursor.table();
        self.check_compatible(src)?;
        let row = cursor.current()?;
        let mut mapper = CodeMapper::new(&src.context, &self.context);
        self.push_mapped_copy(src, row, &mut mapper)
    }
}
