//! Tabular feature building.
//!
//! Raw patient records (not validated) are flattened into one row each.
//! Nested lists are reduced to fixed-width columns: comorbidities to a
//! count, treatments to the first entry, genetic variants to one `var__`
//! presence column per distinct variant name.

use polars::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ResultExt};
use crate::utils::{lookup, value_as_f64, value_as_label};

/// Column names of the feature frame.
pub mod columns {
    pub const PATIENT_ID: &str = "patient_id";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const WEIGHT_KG: &str = "weight_kg";
    pub const HEIGHT_CM: &str = "height_cm";
    pub const BMI_CATEGORY: &str = "bmi_category";
    pub const ETHNICITY: &str = "ethnicity";
    pub const DISEASE_NAME: &str = "disease_name";
    pub const DISEASE_YEARS_AGO: &str = "disease_years_ago";
    pub const COMORBIDITY_COUNT: &str = "comorbidity_count";
    pub const TREATMENT_NAME: &str = "treatment_name";
    pub const DOSAGE_MG_PER_DAY: &str = "dosage_mg_per_day";
    pub const PERCENT_WEEK_ADMINISTERED: &str = "percent_week_administered";
    pub const BMI: &str = "bmi";

    /// Prefix of genetic-variant presence columns.
    pub const VARIANT_PREFIX: &str = "var__";

    /// Numeric model inputs.
    pub const NUMERIC: [&str; 6] = [
        AGE,
        WEIGHT_KG,
        HEIGHT_CM,
        DISEASE_YEARS_AGO,
        COMORBIDITY_COUNT,
        BMI,
    ];

    /// Categorical model inputs, not counting the `var__` columns.
    pub const CATEGORICAL: [&str; 4] = [GENDER, BMI_CATEGORY, ETHNICITY, DISEASE_NAME];
}

/// Name of the presence column for a variant.
pub fn variant_column(name: &str) -> String {
    format!("{}{}", columns::VARIANT_PREFIX, name)
}

/// Whether a column is a variant presence column.
pub fn is_variant_column(name: &str) -> bool {
    name.starts_with(columns::VARIANT_PREFIX)
}

/// One record reduced to scalar fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    pub patient_id: Option<String>,
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub bmi_category: Option<String>,
    pub ethnicity: Option<String>,
    pub disease_name: Option<String>,
    pub disease_years_ago: Option<f64>,
    pub comorbidity_count: i64,
    /// Number of treatment entries; only the first one is flattened.
    pub treatment_count: usize,
    pub treatment_name: Option<String>,
    pub dosage_mg_per_day: Option<f64>,
    pub percent_week_administered: Option<f64>,
    /// Distinct non-empty variant names in record order.
    pub variants: Vec<String>,
}

impl FlatRecord {
    /// weight_kg / (height_cm / 100)², when both are present and the
    /// height is positive.
    pub fn bmi(&self) -> Option<f64> {
        let (weight, height) = (self.weight_kg?, self.height_cm?);
        if height <= 0.0 {
            return None;
        }
        let meters = height / 100.0;
        Some(weight / (meters * meters)).filter(|bmi| bmi.is_finite())
    }

    pub fn has_variant(&self, name: &str) -> bool {
        self.variants.iter().any(|v| v == name)
    }
}

fn number_at(record: &Value, keys: &[&str]) -> Option<f64> {
    lookup(record, keys).and_then(value_as_f64)
}

fn label_at(record: &Value, keys: &[&str]) -> Option<String> {
    lookup(record, keys).and_then(value_as_label)
}

fn list_at<'v>(record: &'v Value, key: &str) -> &'v [Value] {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Flatten one raw record. Missing or mistyped fields become `None`.
pub fn flatten_record(record: &Value) -> FlatRecord {
    let treatments = list_at(record, "treatments");
    let first = treatments.first();

    let mut variants: Vec<String> = Vec::new();
    for variant in list_at(record, "genetic_variants") {
        if let Some(name) = label_at(variant, &["variant_name"])
            && !variants.contains(&name)
        {
            variants.push(name);
        }
    }

    FlatRecord {
        patient_id: label_at(record, &[columns::PATIENT_ID]),
        age: number_at(record, &["age"]),
        gender: label_at(record, &["gender", "category"]),
        weight_kg: number_at(record, &["weight", "weight_kg"]),
        height_cm: number_at(record, &["weight", "height_cm"]),
        bmi_category: label_at(record, &["weight", "bmi_category"]),
        ethnicity: label_at(record, &["ethnicity"]),
        disease_name: label_at(record, &["disease", "name"]),
        disease_years_ago: number_at(record, &["disease", "diagnosed_years_ago"]),
        comorbidity_count: list_at(record, "comorbidities").len() as i64,
        treatment_count: treatments.len(),
        treatment_name: first.and_then(|t| label_at(t, &["treatment_name"])),
        dosage_mg_per_day: first.and_then(|t| number_at(t, &["dosage_mg_per_day"])),
        percent_week_administered: first
            .and_then(|t| number_at(t, &["percent_week_administered"])),
        variants,
    }
}

/// Build the feature frame from raw records, one row per record.
///
/// Variant columns follow the order in which names are first seen. A
/// `patient_id` column is added only when some record carries an id.
pub fn build_feature_frame(records: &[Value]) -> Result<DataFrame> {
    let rows: Vec<FlatRecord> = records.iter().map(flatten_record).collect();

    let multi = rows.iter().filter(|r| r.treatment_count > 1).count();
    if multi > 0 {
        debug!(
            "{} records list several treatments; only the first is kept",
            multi
        );
    }

    // pass one: distinct variant names
    let mut variant_names: Vec<&str> = Vec::new();
    for row in &rows {
        for name in &row.variants {
            if !variant_names.contains(&name.as_str()) {
                variant_names.push(name);
            }
        }
    }

    // pass two: fixed columns
    let mut cols: Vec<Column> = Vec::new();
    if rows.iter().any(|r| r.patient_id.is_some()) {
        cols.push(string_column(columns::PATIENT_ID, &rows, |r| &r.patient_id));
    }
    cols.push(float_column(columns::AGE, &rows, |r| r.age));
    cols.push(string_column(columns::GENDER, &rows, |r| &r.gender));
    cols.push(float_column(columns::WEIGHT_KG, &rows, |r| r.weight_kg));
    cols.push(float_column(columns::HEIGHT_CM, &rows, |r| r.height_cm));
    cols.push(string_column(columns::BMI_CATEGORY, &rows, |r| &r.bmi_category));
    cols.push(string_column(columns::ETHNICITY, &rows, |r| &r.ethnicity));
    cols.push(string_column(columns::DISEASE_NAME, &rows, |r| &r.disease_name));
    cols.push(float_column(columns::DISEASE_YEARS_AGO, &rows, |r| r.disease_years_ago));
    cols.push(Column::new(
        columns::COMORBIDITY_COUNT.into(),
        rows.iter().map(|r| r.comorbidity_count).collect::<Vec<i64>>(),
    ));
    cols.push(string_column(columns::TREATMENT_NAME, &rows, |r| &r.treatment_name));
    cols.push(float_column(columns::DOSAGE_MG_PER_DAY, &rows, |r| r.dosage_mg_per_day));
    cols.push(float_column(columns::PERCENT_WEEK_ADMINISTERED, &rows, |r| {
        r.percent_week_administered
    }));
    for name in &variant_names {
        let flags: Vec<i32> = rows.iter().map(|r| i32::from(r.has_variant(name))).collect();
        cols.push(Column::new(variant_column(name).into(), flags));
    }
    cols.push(float_column(columns::BMI, &rows, FlatRecord::bmi));

    let df = DataFrame::new(cols).context("Failed to assemble feature frame")?;
    debug!(
        "Built feature frame: {} rows, {} columns ({} variant flags)",
        df.height(),
        df.width(),
        variant_names.len()
    );
    Ok(df)
}

fn float_column(
    name: &str,
    rows: &[FlatRecord],
    get: impl Fn(&FlatRecord) -> Option<f64>,
) -> Column {
    Column::new(name.into(), rows.iter().map(get).collect::<Vec<Option<f64>>>())
}

fn string_column(
    name: &str,
    rows: &[FlatRecord],
    get: impl Fn(&FlatRecord) -> &Option<String>,
) -> Column {
    let values: Vec<Option<&str>> = rows.iter().map(|r| get(r).as_deref()).collect();
    Column::new(name.into(), values)
}
