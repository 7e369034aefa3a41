//! Patient profile schema.
//!
//! A [`PatientProfile`] is built from parsed JSON by [`PatientProfile::from_value`],
//! which checks every constraint and reports all violations at once. Numbers
//! given as numeric strings are accepted, as are whole floats for integer
//! fields. Unknown keys are ignored.
//!
//! # Example
//!
//! ```rust
//! use aegis_processing::schema::PatientProfile;
//! use serde_json::json;
//!
//! let record = json!({
//!     "age": 54,
//!     "gender": {"category": "Female"},
//!     "weight": {"weight_kg": 70, "height_cm": 165, "bmi_category": "Healthy"},
//!     "ethnicity": "White",
//!     "disease": {"name": "Hypertension", "diagnosed_years_ago": 3, "prognosis": "Stable"},
//!     "comorbidities": [],
//!     "treatments": [],
//!     "genetic_variants": []
//! });
//! let profile = PatientProfile::from_value(&record).unwrap();
//! assert_eq!(profile.snap, 42);
//! ```

mod json_schema;
mod literals;
mod validate;

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ProcessingError, RecordError};

pub use json_schema::json_schema;
pub use literals::{
    BmiCategory, Ethnicity, GenderCategory, Indication, IntersexCondition, Literal, Prognosis,
};
pub use validate::{FieldViolation, ValidationErrors};

use validate::{Bound, Validator, child, indexed};

/// Default for `snap` when the key is missing.
pub const DEFAULT_SNAP: i64 = 42;

/// Exclusive bounds for `snap`.
pub const SNAP_RANGE: (i64, i64) = (30, 50);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gender {
    pub category: GenderCategory,
    pub intersex_condition: Option<IntersexCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weight {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub bmi_category: BmiCategory,
}

/// Primary disease. Comorbidities share the same shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disease {
    pub name: String,
    pub diagnosed_years_ago: f64,
    pub prognosis: Prognosis,
}

pub type Comorbidity = Disease;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Treatment {
    pub treatment_name: String,
    /// `None` when not supplied.
    pub dosage_mg_per_day: Option<f64>,
    /// `Some(0.0)` when the key is missing, `None` when it is explicitly null.
    pub percent_week_administered: Option<f64>,
    pub indication: Indication,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneticVariant {
    pub variant_name: Option<String>,
    pub associated_risks: Option<Vec<String>>,
}

/// A validated patient record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientProfile {
    pub age: i64,
    pub gender: Gender,
    pub weight: Weight,
    pub ethnicity: Ethnicity,
    pub disease: Disease,
    pub comorbidities: Vec<Comorbidity>,
    pub treatments: Vec<Treatment>,
    pub genetic_variants: Vec<GeneticVariant>,
    pub snap: i64,
}

static_assertions::assert_impl_all!(PatientProfile: Send, Sync);

impl PatientProfile {
    /// Validate parsed JSON into a profile, collecting every violation.
    pub fn from_value(value: &Value) -> Result<Self, ValidationErrors> {
        let mut v = Validator::default();
        let profile = v.object(value, "").and_then(|obj| read_profile(&mut v, obj));
        v.finish(profile)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(input)?;
        Ok(Self::from_value(&value)?)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// [`from_path`](Self::from_path) for callers that stop on the first bad
    /// file; the error names the file.
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        Self::from_path(path).map_err(|e| ProcessingError::record(path.display().to_string(), e))
    }

    /// Comorbidity names in record order.
    pub fn comorbidity_names(&self) -> Vec<&str> {
        self.comorbidities.iter().map(|c| c.name.as_str()).collect()
    }

    /// BMI from weight and height.
    pub fn bmi(&self) -> f64 {
        let meters = self.weight.height_cm / 100.0;
        self.weight.weight_kg / (meters * meters)
    }
}

fn read_profile(v: &mut Validator, obj: &Map<String, Value>) -> Option<PatientProfile> {
    let age = v.integer(obj, "age", "", &[Bound::Ge(0.0)]);
    let gender = v.nested(obj, "gender", "").and_then(|g| read_gender(v, g));
    let weight = v.nested(obj, "weight", "").and_then(|w| read_weight(v, w));
    let ethnicity = v.literal::<Ethnicity>(obj, "ethnicity", "");
    let disease = v
        .nested(obj, "disease", "")
        .and_then(|d| read_disease(v, d, "disease"));
    let comorbidities = read_list(v, obj, "comorbidities", |v, item, path| {
        v.object(item, path).and_then(|d| read_disease(v, d, path))
    });
    let treatments = read_list(v, obj, "treatments", |v, item, path| {
        v.object(item, path).and_then(|t| read_treatment(v, t, path))
    });
    let genetic_variants = read_list(v, obj, "genetic_variants", |v, item, path| {
        v.object(item, path).and_then(|g| read_variant(v, g, path))
    });
    let snap = match obj.get("snap") {
        None => Some(DEFAULT_SNAP),
        Some(value) => v.as_integer(
            value,
            "snap",
            &[
                Bound::Gt(SNAP_RANGE.0 as f64),
                Bound::Lt(SNAP_RANGE.1 as f64),
            ],
        ),
    };

    Some(PatientProfile {
        age: age?,
        gender: gender?,
        weight: weight?,
        ethnicity: ethnicity?,
        disease: disease?,
        comorbidities: comorbidities?,
        treatments: treatments?,
        genetic_variants: genetic_variants?,
        snap: snap?,
    })
}

/// Validate every item of a required list, keeping going past bad items.
fn read_list<T>(
    v: &mut Validator,
    obj: &Map<String, Value>,
    key: &str,
    mut read: impl FnMut(&mut Validator, &Value, &str) -> Option<T>,
) -> Option<Vec<T>> {
    let items = v.array(obj, key, "")?;
    let parsed: Vec<Option<T>> = items
        .iter()
        .enumerate()
        .map(|(i, item)| read(v, item, &indexed(key, i)))
        .collect();
    parsed.into_iter().collect()
}

fn read_gender(v: &mut Validator, obj: &Map<String, Value>) -> Option<Gender> {
    let category = v.literal::<GenderCategory>(obj, "category", "gender");
    let intersex_condition =
        v.optional_literal::<IntersexCondition>(obj, "intersex_condition", "gender");
    Some(Gender {
        category: category?,
        intersex_condition: intersex_condition.ok()?,
    })
}

fn read_weight(v: &mut Validator, obj: &Map<String, Value>) -> Option<Weight> {
    let weight_kg = v.number(obj, "weight_kg", "weight", &[Bound::Gt(0.0)]);
    let height_cm = v.number(obj, "height_cm", "weight", &[Bound::Gt(0.0)]);
    let bmi_category = v.literal::<BmiCategory>(obj, "bmi_category", "weight");
    Some(Weight {
        weight_kg: weight_kg?,
        height_cm: height_cm?,
        bmi_category: bmi_category?,
    })
}

fn read_disease(v: &mut Validator, obj: &Map<String, Value>, path: &str) -> Option<Disease> {
    let name = v.string(obj, "name", path);
    let diagnosed_years_ago = v.number(obj, "diagnosed_years_ago", path, &[Bound::Ge(0.0)]);
    let prognosis = v.literal::<Prognosis>(obj, "prognosis", path);
    Some(Disease {
        name: name?,
        diagnosed_years_ago: diagnosed_years_ago?,
        prognosis: prognosis?,
    })
}

fn read_treatment(v: &mut Validator, obj: &Map<String, Value>, path: &str) -> Option<Treatment> {
    let treatment_name = v.string(obj, "treatment_name", path);
    let dosage = v.optional_number(
        obj.get("dosage_mg_per_day"),
        &child(path, "dosage_mg_per_day"),
        &[Bound::Ge(0.0)],
    );
    let percent = match obj.get("percent_week_administered") {
        None => Ok(Some(0.0)),
        value => v.optional_number(
            value,
            &child(path, "percent_week_administered"),
            &[Bound::Ge(0.0)],
        ),
    };
    let indication = v.literal::<Indication>(obj, "indication", path);
    Some(Treatment {
        treatment_name: treatment_name?,
        dosage_mg_per_day: dosage.ok()?,
        percent_week_administered: percent.ok()?,
        indication: indication?,
    })
}

fn read_variant(v: &mut Validator, obj: &Map<String, Value>, path: &str) -> Option<GeneticVariant> {
    let variant_name = match (obj.get("variant_name"), obj.get("gene"), obj.get("variant")) {
        (None | Some(Value::Null), Some(Value::String(gene)), Some(Value::String(variant))) => {
            Ok(Some(format!("{} {}", gene, variant)))
        }
        _ => v.optional_string(obj, "variant_name", path),
    };
    let associated_risks = match (obj.get("associated_risks"), obj.get("effect")) {
        (None | Some(Value::Null), Some(Value::String(effect))) => Ok(Some(vec![effect.clone()])),
        (None | Some(Value::Null), _) => Ok(None),
        (Some(value), _) => v
            .string_list(value, &child(path, "associated_risks"))
            .map(Some)
            .ok_or(()),
    };
    Some(GeneticVariant {
        variant_name: variant_name.ok()?,
        associated_risks: associated_risks.ok()?,
    })
}
