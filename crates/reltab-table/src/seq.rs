//! Iteration over a sequence of tables, e.g. the output of
//! `splice_by_group` or one table per time window.

use crate::table::Table;

#[derive(Debug, Clone)]
pub struct TableSeqIter<'a> {
    tables: &'a [Table],
    pos: usize,
}

impl<'a> TableSeqIter<'a> {
    pub fn new(tables: &'a [Table]) -> Self {
        Self { tables, pos: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.tables.len()
    }

    /// Index of the table the next call to `next` returns.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for TableSeqIter<'a> {
    type Item = &'a Table;

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.tables.get(self.pos)?;
        self.pos += 1;
        Some(t)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.tables.len() - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for TableSeqIter<'_> {}
