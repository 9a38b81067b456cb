//! Shared string pool.
//!
//! A `Context` is a bijection between strings and dense `StrCode`s. Tables
//! never store string data, only codes resolved against the context they were
//! created with. Cloning a `Context` clones the handle; all clones see the
//! same pool.
//!
//! The pool sits behind an `RwLock` so handles can cross threads, but
//! interning is first-come: two threads interning into one context get codes
//! in whatever order they win the lock. Callers that need reproducible codes
//! across a parallel run should pre-populate the pool or coordinate
//! externally.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::id::StrCode;

/// The interning table itself.
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    strings: Vec<String>,
    codes: HashMap<String, StrCode>,
}

impl StringPool {
    /// Idempotent insert-or-lookup.
    pub fn intern(&mut self, s: &str) -> Result<StrCode> {
        if let Some(code) = self.codes.get(s) {
            return Ok(*code);
        }
        let next = u32::try_from(self.strings.len())
            .map_err(|_| Error::Invariant("string pool exhausted u32 code space".into()))?;
        let code = StrCode::new(next);
        self.strings.push(s.to_owned());
        self.codes.insert(s.to_owned(), code);
        Ok(code)
    }

    pub fn lookup(&self, s: &str) -> Option<StrCode> {
        self.codes.get(s).copied()
    }

    pub fn get(&self, code: StrCode) -> Option<&str> {
        self.strings.get(code.index()).map(String::as_str)
    }

    /// Resolve a code that a table stored; a miss means the table and the
    /// pool disagree.
    pub fn resolve(&self, code: StrCode) -> Result<&str> {
        self.get(code)
            .ok_or_else(|| Error::Invariant(format!("{code} not present in context")))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Strings in code order.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    pool: Arc<RwLock<StringPool>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a context whose codes are the positions in `strings`.
    pub fn from_strings(strings: Vec<String>) -> Result<Self> {
        let mut pool = StringPool::default();
        for s in &strings {
            if pool.lookup(s).is_some() {
                return Err(Error::Io(format!("duplicate string in context: {s:?}")));
            }
            pool.intern(s)?;
        }
        Ok(Self {
            pool: Arc::new(RwLock::new(pool)),
        })
    }

    pub fn intern(&self, s: &str) -> Result<StrCode> {
        self.write().intern(s)
    }

    pub fn lookup(&self, s: &str) -> Option<StrCode> {
        self.read().lookup(s)
    }

    pub fn resolve(&self, code: StrCode) -> Result<String> {
        self.read().resolve(code).map(str::to_owned)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// True when both handles share one pool (codes are interchangeable).
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }

    /// Hold the pool for a batch of lookups (sorting, formatting).
    pub fn read(&self) -> RwLockReadGuard<'_, StringPool> {
        // A poisoned lock only means another thread panicked mid-intern; the
        // pool is append-only so the data is still consistent.
        self.pool.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, StringPool> {
        self.pool.write().unwrap_or_else(|e| e.into_inner())
    }
}
