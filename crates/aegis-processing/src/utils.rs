//! Shared helpers for reading raw JSON records and polars columns.
//!
//! Used by the feature builder here and by the training crate, which reads
//! feature frames column by column.

use polars::prelude::*;
use serde_json::Value;

// =============================================================================
// JSON Value Utilities
// =============================================================================

/// Follow a chain of object keys. Missing keys and non-objects yield `None`.
///
/// # Example
///
/// ```rust
/// use aegis_processing::utils::lookup;
/// use serde_json::json;
///
/// let record = json!({"weight": {"height_cm": 170}});
/// assert_eq!(lookup(&record, &["weight", "height_cm"]), Some(&json!(170)));
/// assert_eq!(lookup(&record, &["weight", "weight_kg"]), None);
/// ```
pub fn lookup<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}

/// Read a JSON value as a number. Numeric strings are accepted; null,
/// booleans and anything else are missing.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_string(s),
        _ => None,
    }
}

/// Read a JSON scalar as a category label. Numbers and booleans are
/// rendered; null, empty strings and containers are missing.
pub fn value_as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Try to parse a string as a finite number after trimming.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Column Utilities
// =============================================================================

/// Check if a column exists in the frame.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Read a column as optional floats. Non-numeric strings and non-finite
/// values become `None`.
pub fn column_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series();
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Read a column as optional strings, rendering non-string values.
pub fn column_labels(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Median of the present values, `None` when there are none.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

// =============================================================================
// Tests
// =============================================================================
