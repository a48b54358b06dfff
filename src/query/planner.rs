//! Component C2: turns a validated [`QueryDescriptor`] into a noised result
//! by splitting epsilon across the requested columns and dispatching each
//! split to the matching `mechanism::aggregates` function.
//!
//! The planner never touches the ledger. It receives an already-admitted
//! local epsilon budget (the gate reserves it first) and only ever reads
//! the dataset through a [`RowStore`]'s four aggregate methods.

use crate::{
    config::GatewayConfig,
    error::{GatewayError, MechanismError},
    mechanism::{aggregates, rng::NoiseSource, MechanismOutcome},
    query::descriptor::{FilterSet, QueryDescriptor},
    store::RowStore,
};

/// One column's worth of noised output, tagged with the column it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnResult {
    pub column: Option<String>,
    pub outcome: MechanismOutcome,
}

/// The planner's output: one [`ColumnResult`] per column the query touched
/// (zero or one for scalar queries, one per bin for histograms), plus the
/// population size the true statistics were computed over.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResult {
    pub columns: Vec<ColumnResult>,
    pub rows_matched: u64,
}

/// Looks up `column`'s hard deployment bound, then — if the caller supplied
/// an override — checks it falls within that hard bound before using it.
/// spec.md section 3: a bounds override must stay "within the column
/// descriptor's hard bounds"; it can narrow the range a mechanism is
/// calibrated against, never widen it past what the deployment allows.
fn resolve_bounds<'a>(
    config: &'a GatewayConfig,
    column: &str,
    override_bounds: Option<&'a crate::query::descriptor::BoundsOverride>,
) -> Result<&'a crate::config::ColumnDescriptor, GatewayError> {
    let hard = config
        .column(column)
        .ok_or_else(|| GatewayError::BadRequest(format!("unknown column: {column}")))?;
    match override_bounds {
        Some(bounds) if bounds.lower >= hard.lower && bounds.upper <= hard.upper => Ok(bounds),
        Some(bounds) => Err(GatewayError::BadRequest(format!(
            "bounds override [{}, {}] for column {column} exceeds its hard bounds [{}, {}]",
            bounds.lower, bounds.upper, hard.lower, hard.upper
        ))),
        None => Ok(hard),
    }
}

/// Schema-level validation (spec.md section 4.4 step 1): every column the
/// query touches must be known to the deployment, any bounds override must
/// stay within that column's hard bounds, every filter attribute must be
/// known to the deployment, and a requested histogram bin count must be in
/// range. Run by the gate *before* it reserves any epsilon, so a malformed
/// request never holds a reservation even briefly.
pub fn validate_shape(
    query: &QueryDescriptor,
    filters: &FilterSet,
    config: &GatewayConfig,
    bounds_override: Option<&crate::query::descriptor::BoundsOverride>,
) -> Result<(), GatewayError> {
    if let QueryDescriptor::Histogram { num_bins, .. } = query {
        if *num_bins < config.histogram_bins_min || *num_bins > config.histogram_bins_max {
            return Err(GatewayError::BadRequest(format!(
                "num_bins must be in [{}, {}]",
                config.histogram_bins_min, config.histogram_bins_max
            )));
        }
    }
    for column in query.columns() {
        resolve_bounds(config, column, bounds_override)?;
    }
    for predicate in &filters.predicates {
        let attribute = predicate.attribute();
        if !config.is_known_attribute(attribute) {
            return Err(GatewayError::BadRequest(format!(
                "filter references unknown attribute: {attribute}"
            )));
        }
    }
    Ok(())
}

/// Splits `epsilon` uniformly across `k` columns (spec.md section 4.2): a
/// query over `k` columns pays `epsilon / k` per column under sequential
/// composition, so the total spend across the whole query is `epsilon`.
fn split_epsilon(epsilon: f64, k: usize) -> f64 {
    epsilon / k.max(1) as f64
}

fn into_mechanism_err(err: MechanismError) -> GatewayError {
    err.into()
}

/// Executes `query` against `store`, scoped by `filters`, spending at most
/// `epsilon` total. Returns [`GatewayError::NoMatch`] if the filtered
/// population is empty — callers must not debit epsilon for that outcome
/// (spec.md section 4.2 edge cases).
pub fn execute(
    query: &QueryDescriptor,
    filters: &FilterSet,
    epsilon: f64,
    config: &GatewayConfig,
    bounds_override: Option<&crate::query::descriptor::BoundsOverride>,
    store: &dyn RowStore,
    source: &mut impl NoiseSource,
) -> Result<PlanResult, GatewayError> {
    let rows_matched = store.count(filters)?;
    if rows_matched == 0 {
        return Err(GatewayError::NoMatch);
    }

    match query {
        QueryDescriptor::Count => {
            let outcome = aggregates::noisy_count(rows_matched, epsilon, source)
                .map_err(into_mechanism_err)?;
            Ok(PlanResult {
                columns: vec![ColumnResult { column: None, outcome }],
                rows_matched,
            })
        }

        QueryDescriptor::Sum { columns } => {
            let per_column_epsilon = split_epsilon(epsilon, columns.len());
            let mut results = Vec::with_capacity(columns.len());
            for column in columns {
                let bounds = resolve_bounds(config, column, bounds_override)?;
                let values = store.values(column, filters)?;
                let outcome = aggregates::noisy_sum(&values, bounds, per_column_epsilon, source)
                    .map_err(into_mechanism_err)?;
                results.push(ColumnResult { column: Some(column.clone()), outcome });
            }
            Ok(PlanResult { columns: results, rows_matched })
        }

        QueryDescriptor::Mean { columns } => {
            let per_column_epsilon = split_epsilon(epsilon, columns.len());
            let mut results = Vec::with_capacity(columns.len());
            for column in columns {
                let bounds = resolve_bounds(config, column, bounds_override)?;
                let values = store.values(column, filters)?;
                let outcome = aggregates::noisy_mean(&values, bounds, per_column_epsilon, source)
                    .map_err(into_mechanism_err)?;
                results.push(ColumnResult { column: Some(column.clone()), outcome });
            }
            Ok(PlanResult { columns: results, rows_matched })
        }

        QueryDescriptor::Median { column } => {
            let bounds = resolve_bounds(config, column, bounds_override)?;
            let values = store.values(column, filters)?;
            let outcome = aggregates::noisy_median(
                &values,
                bounds,
                epsilon,
                config.exponential_candidates,
                source,
            )
            .map_err(into_mechanism_err)?;
            Ok(PlanResult {
                columns: vec![ColumnResult { column: Some(column.clone()), outcome }],
                rows_matched,
            })
        }

        QueryDescriptor::Histogram { column, num_bins, min, max } => {
            if *num_bins < config.histogram_bins_min || *num_bins > config.histogram_bins_max {
                return Err(GatewayError::BadRequest(format!(
                    "num_bins must be in [{}, {}]",
                    config.histogram_bins_min, config.histogram_bins_max
                )));
            }
            let values = store.values(column, filters)?;
            let bin_counts = bucket_into_bins(&values, *min, *max, *num_bins);
            let outcomes = aggregates::noisy_histogram(&bin_counts, epsilon, source)
                .map_err(into_mechanism_err)?;
            Ok(PlanResult {
                columns: outcomes
                    .into_iter()
                    .enumerate()
                    .map(|(i, outcome)| ColumnResult {
                        column: Some(format!("{column}[bin {i}]")),
                        outcome,
                    })
                    .collect(),
                rows_matched,
            })
        }

        QueryDescriptor::Variance { column } => {
            let bounds = resolve_bounds(config, column, bounds_override)?;
            let values = store.values(column, filters)?;
            let outcome = aggregates::noisy_variance(&values, bounds, epsilon, source)
                .map_err(into_mechanism_err)?;
            Ok(PlanResult {
                columns: vec![ColumnResult { column: Some(column.clone()), outcome }],
                rows_matched,
            })
        }

        QueryDescriptor::Percentile { column, p } => {
            let bounds = resolve_bounds(config, column, bounds_override)?;
            let values = store.values(column, filters)?;
            let outcome = aggregates::noisy_percentile(
                &values,
                *p,
                bounds,
                config.exponential_candidates,
                epsilon,
                source,
            )
            .map_err(into_mechanism_err)?;
            Ok(PlanResult {
                columns: vec![ColumnResult { column: Some(column.clone()), outcome }],
                rows_matched,
            })
        }

        QueryDescriptor::Max { column } => {
            let bounds = resolve_bounds(config, column, bounds_override)?;
            let values = store.values(column, filters)?;
            let outcome = aggregates::noisy_max(
                &values,
                bounds,
                config.exponential_candidates,
                epsilon,
                source,
            )
            .map_err(into_mechanism_err)?;
            Ok(PlanResult {
                columns: vec![ColumnResult { column: Some(column.clone()), outcome }],
                rows_matched,
            })
        }
    }
}

/// Buckets `values` into `num_bins` equal-width bins over `[min, max]`.
/// Values outside the range fall into the nearest edge bin — the bin
/// structure itself is public deployment configuration, not learned from
/// the data, so this never needs to consult the dataset for its edges.
fn bucket_into_bins(values: &[f64], min: f64, max: f64, num_bins: u32) -> Vec<u64> {
    let mut counts = vec![0u64; num_bins as usize];
    if !(min < max) || num_bins == 0 {
        return counts;
    }
    let width = (max - min) / num_bins as f64;
    for &v in values {
        let clipped = v.clamp(min, max);
        let mut idx = ((clipped - min) / width) as usize;
        if idx >= num_bins as usize {
            idx = num_bins as usize - 1;
        }
        counts[idx] += 1;
    }
    counts
}
