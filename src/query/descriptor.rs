//! Query and filter types (component C2's input).

use serde::{Deserialize, Serialize};

use crate::config::ColumnDescriptor;

/// One attribute value a row can carry. Numeric values participate in
/// ordered predicates (`Ge`/`Le`); any value can participate in equality
/// predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
}

/// A single predicate over one row attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq { attribute: String, value: Value },
    In { attribute: String, values: Vec<Value> },
    Ge { attribute: String, value: f64 },
    Le { attribute: String, value: f64 },
}

impl Predicate {
    pub fn attribute(&self) -> &str {
        match self {
            Predicate::Eq { attribute, .. } => attribute,
            Predicate::In { attribute, .. } => attribute,
            Predicate::Ge { attribute, .. } => attribute,
            Predicate::Le { attribute, .. } => attribute,
        }
    }
}

/// An unordered set of predicates a row must satisfy. Filters reduce the
/// population an aggregate runs over; they don't change the declared
/// sensitivity (spec.md section 3: adding/removing one row still changes
/// the result by at most the per-row sensitivity, filtered or not).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub predicates: Vec<Predicate>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.attribute())
    }
}

/// Bounds override for one column in a single request, must stay within
/// the deployment's hard [`ColumnDescriptor`] bounds.
pub type BoundsOverride = ColumnDescriptor;

/// Tagged variant over the supported aggregates (spec.md section 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryDescriptor {
    Count,
    Sum {
        columns: Vec<String>,
    },
    Mean {
        columns: Vec<String>,
    },
    Median {
        column: String,
    },
    Histogram {
        column: String,
        num_bins: u32,
        min: f64,
        max: f64,
    },
    Variance {
        column: String,
    },
    Percentile {
        column: String,
        p: f64,
    },
    Max {
        column: String,
    },
}

impl QueryDescriptor {
    /// The columns this query needs true aggregates for, in the order the
    /// planner should split epsilon across them.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            QueryDescriptor::Count => vec![],
            QueryDescriptor::Sum { columns } | QueryDescriptor::Mean { columns } => {
                columns.iter().map(String::as_str).collect()
            }
            QueryDescriptor::Median { column }
            | QueryDescriptor::Histogram { column, .. }
            | QueryDescriptor::Variance { column }
            | QueryDescriptor::Percentile { column, .. }
            | QueryDescriptor::Max { column } => vec![column.as_str()],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryDescriptor::Count => "count",
            QueryDescriptor::Sum { .. } => "sum",
            QueryDescriptor::Mean { .. } => "mean",
            QueryDescriptor::Median { .. } => "median",
            QueryDescriptor::Histogram { .. } => "histogram",
            QueryDescriptor::Variance { .. } => "variance",
            QueryDescriptor::Percentile { .. } => "percentile",
            QueryDescriptor::Max { .. } => "max",
        }
    }
}

/// A full request to the gateway: a query plus its privacy parameter,
/// filters, and an optional per-request bounds override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub principal_id: String,
    pub query: QueryDescriptor,
    pub epsilon: f64,
    pub filters: FilterSet,
    pub bounds_override: Option<BoundsOverride>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_extracts_the_right_fields() {
        assert_eq!(QueryDescriptor::Count.columns(), Vec::<&str>::new());
        assert_eq!(
            QueryDescriptor::Sum { columns: vec!["age".into(), "cost".into()] }.columns(),
            vec!["age", "cost"]
        );
        assert_eq!(
            QueryDescriptor::Median { column: "age".into() }.columns(),
            vec!["age"]
        );
    }
}
