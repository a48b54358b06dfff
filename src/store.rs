//! The row store interface (consumed, not implemented, by the core).
//!
//! spec.md section 4.2: the planner "MUST read rows only through the
//! aggregate interface the store exposes ... MUST NOT expose raw rows to
//! other components." This trait is that boundary: four aggregate
//! operations, no row iteration, no row type leaking into the rest of the
//! crate.

use std::collections::HashMap;

use crate::{
    error::StoreError,
    query::descriptor::{FilterSet, Predicate, Value},
};

/// Four aggregate operations over the protected dataset, each scoped by a
/// [`FilterSet`]. Results are unmodified plaintext aggregates — the core is
/// responsible for noising before any value crosses back out to a caller.
pub trait RowStore: Send + Sync {
    fn count(&self, filters: &FilterSet) -> Result<u64, StoreError>;
    fn sum(&self, column: &str, filters: &FilterSet) -> Result<f64, StoreError>;
    fn avg(&self, column: &str, filters: &FilterSet) -> Result<f64, StoreError>;
    fn values(&self, column: &str, filters: &FilterSet) -> Result<Vec<f64>, StoreError>;
}

/// In-memory reference implementation for tests and doctests, grounded in
/// the corpus's `HashMapEventStorage`/`HashMapFilterStorage` in-memory
/// defaults: every storage trait in this corpus ships a HashMap-backed
/// implementation alongside the trait.
#[derive(Debug, Default, Clone)]
pub struct VecRowStore {
    rows: Vec<HashMap<String, Value>>,
}

impl VecRowStore {
    pub fn new(rows: Vec<HashMap<String, Value>>) -> Self {
        Self { rows }
    }

    fn matching_rows(&self, filters: &FilterSet) -> impl Iterator<Item = &HashMap<String, Value>> {
        self.rows.iter().filter(move |row| Self::row_matches(row, filters))
    }

    fn row_matches(row: &HashMap<String, Value>, filters: &FilterSet) -> bool {
        filters.predicates.iter().all(|predicate| match predicate {
            Predicate::Eq { attribute, value } => row.get(attribute) == Some(value),
            Predicate::In { attribute, values } => {
                row.get(attribute).is_some_and(|v| values.contains(v))
            }
            Predicate::Ge { attribute, value } => {
                matches!(row.get(attribute), Some(Value::Number(n)) if *n >= *value)
            }
            Predicate::Le { attribute, value } => {
                matches!(row.get(attribute), Some(Value::Number(n)) if *n <= *value)
            }
        })
    }

    fn numeric_column(&self, column: &str, filters: &FilterSet) -> Result<Vec<f64>, StoreError> {
        self.matching_rows(filters)
            .filter_map(|row| row.get(column))
            .map(|value| match value {
                Value::Number(n) => Ok(*n),
                Value::Text(_) => Err(StoreError::Backend(format!(
                    "column {column} is not numeric"
                ))),
            })
            .collect()
    }
}

impl RowStore for VecRowStore {
    fn count(&self, filters: &FilterSet) -> Result<u64, StoreError> {
        Ok(self.matching_rows(filters).count() as u64)
    }

    fn sum(&self, column: &str, filters: &FilterSet) -> Result<f64, StoreError> {
        Ok(self.numeric_column(column, filters)?.iter().sum())
    }

    fn avg(&self, column: &str, filters: &FilterSet) -> Result<f64, StoreError> {
        let values = self.numeric_column(column, filters)?;
        if values.is_empty() {
            return Ok(0.0);
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn values(&self, column: &str, filters: &FilterSet) -> Result<Vec<f64>, StoreError> {
        self.numeric_column(column, filters)
    }
}
