//! Table configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Rows reserved up front in every column when a table is created.
    pub initial_capacity: usize,

    /// Capacity growth, in percent of the current capacity, once it is
    /// exhausted. 100 doubles the storage.
    pub growth_factor_pct: usize,

    /// Lower bound on a single growth step, in rows.
    pub min_growth_rows: usize,

    /// Ranges shorter than this are finished with insertion sort.
    pub insertion_sort_threshold: usize,

    /// Column created by `init_ids` to hold permanent row ids.
    pub id_col_name: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            growth_factor_pct: 100,
            min_growth_rows: 64,
            insertion_sort_threshold: 16,
            id_col_name: "_id".to_string(),
        }
    }
}

impl TableConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `RELTAB_INITIAL_CAPACITY`: rows reserved at creation
    /// - `RELTAB_GROWTH_FACTOR_PCT`: growth percentage
    /// - `RELTAB_MIN_GROWTH_ROWS`: minimum growth step
    /// - `RELTAB_INSERTION_SORT_THRESHOLD`: insertion sort cutoff
    /// - `RELTAB_ID_COL`: permanent id column name
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("RELTAB_INITIAL_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.initial_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("RELTAB_GROWTH_FACTOR_PCT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.growth_factor_pct = v;
            }
        }

        if let Ok(s) = std::env::var("RELTAB_MIN_GROWTH_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.min_growth_rows = v;
            }
        }

        if let Ok(s) = std::env::var("RELTAB_INSERTION_SORT_THRESHOLD") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.insertion_sort_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("RELTAB_ID_COL") {
            if !s.is_empty() {
                cfg.id_col_name = s;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.growth_factor_pct == 0 {
            return Err(Error::Config("growth_factor_pct must be > 0".into()));
        }
        if self.min_growth_rows == 0 {
            return Err(Error::Config("min_growth_rows must be > 0".into()));
        }
        if self.insertion_sort_threshold < 2 {
            return Err(Error::Config("insertion_sort_threshold must be >= 2".into()));
        }
        if self.id_col_name.is_empty() {
            return Err(Error::Config("id_col_name must not be empty".into()));
        }
        Ok(())
    }

    /// Capacity to grow to when `needed` rows must fit and `current` are
    /// allocated. Geometric growth keeps appends amortized O(1).
    pub fn grown_capacity(&self, current: usize, needed: usize) -> usize {
        let step = (current.saturating_mul(self.growth_factor_pct) / 100).max(self.min_growth_rows);
        current.saturating_add(step).max(needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TableConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_growth() {
        let cfg = TableConfig {
            growth_factor_pct: 0,
            ..TableConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn growth_is_geometric_with_floor() {
        let cfg = TableConfig::default();
        assert_eq!(cfg.grown_capacity(0, 1), 64);
        assert_eq!(cfg.grown_capacity(128, 129), 256);
        assert_eq!(cfg.grown_capacity(10, 500), 500);
    }

    #[test]
    fn serde_round_trip() {
        let cfg = TableConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
