//! JSON Schema for the patient profile.
//!
//! Used for structured-output requests to a language model. Enumerations
//! are read from the same literal tables the validator uses.

use serde_json::{Value, json};

use super::literals::{
    BmiCategory, Ethnicity, GenderCategory, Indication, IntersexCondition, Literal, Prognosis,
};
use super::{DEFAULT_SNAP, SNAP_RANGE};

fn literal<T: Literal>(title: &str) -> Value {
    json!({
        "enum": T::literals(),
        "title": title,
        "type": "string",
    })
}

fn nullable(inner: Value, title: &str) -> Value {
    json!({
        "anyOf": [inner, {"type": "null"}],
        "default": null,
        "title": title,
    })
}

fn reference(name: &str) -> Value {
    json!({"$ref": format!("#/$defs/{}", name)})
}

fn array_of(items: Value, title: &str) -> Value {
    json!({"items": items, "title": title, "type": "array"})
}

fn disease_like(title: &str) -> Value {
    json!({
        "properties": {
            "name": {"title": "Name", "type": "string"},
            "diagnosed_years_ago": {"minimum": 0, "title": "Diagnosed Years Ago", "type": "number"},
            "prognosis": literal::<Prognosis>("Prognosis"),
        },
        "required": ["name", "diagnosed_years_ago", "prognosis"],
        "title": title,
        "type": "object",
    })
}

/// JSON Schema (draft 2020-12 style) describing a valid patient record.
pub fn json_schema() -> Value {
    let mut intersex = literal::<IntersexCondition>("Intersex Condition");
    if let Some(obj) = intersex.as_object_mut() {
        obj.remove("title");
    }

    let defs = json!({
        "Gender": {
            "properties": {
                "category": literal::<GenderCategory>("Category"),
                "intersex_condition": nullable(intersex, "Intersex Condition"),
            },
            "required": ["category"],
            "title": "Gender",
            "type": "object",
        },
        "Weight": {
            "properties": {
                "weight_kg": {"exclusiveMinimum": 0, "title": "Weight Kg", "type": "number"},
                "height_cm": {"exclusiveMinimum": 0, "title": "Height Cm", "type": "number"},
                "bmi_category": literal::<BmiCategory>("Bmi Category"),
            },
            "required": ["weight_kg", "height_cm", "bmi_category"],
            "title": "Weight",
            "type": "object",
        },
        "Disease": disease_like("Disease"),
        "Comorbidity": disease_like("Comorbidity"),
        "Treatment": {
            "properties": {
                "treatment_name": {"title": "Treatment Name", "type": "string"},
                "dosage_mg_per_day": nullable(
                    json!({"minimum": 0, "type": "number"}),
                    "Dosage Mg Per Day",
                ),
                "percent_week_administered": {
                    "anyOf": [{"minimum": 0, "type": "number"}, {"type": "null"}],
                    "default": 0,
                    "title": "Percent Week Administered",
                },
                "indication": literal::<Indication>("Indication"),
            },
            "required": ["treatment_name", "indication"],
            "title": "Treatment",
            "type": "object",
        },
        "GeneticVariant": {
            "properties": {
                "variant_name": nullable(json!({"type": "string"}), "Variant Name"),
                "associated_risks": nullable(
                    json!({"items": {"type": "string"}, "type": "array"}),
                    "Associated Risks",
                ),
            },
            "title": "GeneticVariant",
            "type": "object",
        },
    });

    json!({
        "$defs": defs,
        "description": "This is the description of the main model",
        "properties": {
            "age": {"minimum": 0, "title": "Age", "type": "integer"},
            "gender": reference("Gender"),
            "weight": reference("Weight"),
            "ethnicity": literal::<Ethnicity>("Ethnicity"),
            "disease": reference("Disease"),
            "comorbidities": array_of(reference("Comorbidity"), "Comorbidities"),
            "treatments": array_of(reference("Treatment"), "Treatments"),
            "genetic_variants": array_of(reference("GeneticVariant"), "Genetic Variants"),
            "snap": {
                "default": DEFAULT_SNAP,
                "description": "this is the value of snap",
                "exclusiveMaximum": SNAP_RANGE.1,
                "exclusiveMinimum": SNAP_RANGE.0,
                "title": "The Snap",
                "type": "integer",
            },
        },
        "required": [
            "age",
            "gender",
            "weight",
            "ethnicity",
            "disease",
            "comorbidities",
            "treatments",
            "genetic_variants",
        ],
        "title": "Main",
        "type": "object",
    })
}
