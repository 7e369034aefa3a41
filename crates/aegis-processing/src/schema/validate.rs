//! Exhaustive field validation over parsed JSON.
//!
//! [`Validator`] walks a `serde_json::Value` and records every constraint
//! violation it meets instead of stopping at the first one. Each reader
//! returns `Option<T>`: `None` means the field was rejected and a
//! [`FieldViolation`] was pushed.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::literals::Literal;

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Location of the field, e.g. `treatments[1].indication`.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Every violation found while validating one record.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{}", render(&self.violations))]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

fn render(violations: &[FieldViolation]) -> String {
    let mut out = format!(
        "{} validation error{} for PatientProfile",
        violations.len(),
        if violations.len() == 1 { "" } else { "s" }
    );
    for violation in violations {
        out.push('\n');
        out.push_str(&violation.to_string());
    }
    out
}

impl ValidationErrors {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation concerns exactly this path.
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

/// Numeric bound on a field.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Bound {
    Gt(f64),
    Ge(f64),
    Lt(f64),
}

impl Bound {
    fn check(&self, value: f64) -> Option<String> {
        match *self {
            Bound::Gt(limit) if value <= limit => {
                Some(format!("Input should be greater than {}", limit))
            }
            Bound::Ge(limit) if value < limit => {
                Some(format!("Input should be greater than or equal to {}", limit))
            }
            Bound::Lt(limit) if value >= limit => {
                Some(format!("Input should be less than {}", limit))
            }
            _ => None,
        }
    }
}

pub(crate) fn child(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

pub(crate) fn indexed(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collects violations while reading fields.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    violations: Vec<FieldViolation>,
}

impl Validator {
    pub fn violation(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation::new(path, message));
    }

    /// Turn the collected state into a result. `value` is only returned when
    /// nothing was rejected.
    pub fn finish<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(value) if self.violations.is_empty() => Ok(value),
            _ => {
                let mut violations = self.violations;
                if violations.is_empty() {
                    violations.push(FieldViolation::new("", "Record could not be validated"));
                }
                Err(ValidationErrors::new(violations))
            }
        }
    }

    pub fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.violation(
                    path,
                    format!("Input should be a valid dictionary, got {}", type_name(other)),
                );
                None
            }
        }
    }

    /// A key that must be present and non-null.
    pub fn required<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v Value> {
        match obj.get(key) {
            None => {
                self.violation(&child(path, key), "Field required");
                None
            }
            Some(Value::Null) => {
                self.violation(&child(path, key), "Field required, got null");
                None
            }
            Some(value) => Some(value),
        }
    }

    pub fn nested<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v Map<String, Value>> {
        let value = self.required(obj, key, path)?;
        self.object(value, &child(path, key))
    }

    pub fn string(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        let value = self.required(obj, key, path)?;
        self.as_string(value, &child(path, key))
    }

    pub fn optional_string(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Option<String>, ()> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.as_string(value, &child(path, key)).map(Some).ok_or(()),
        }
    }

    fn as_string(&mut self, value: &Value, path: &str) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            other => {
                self.violation(
                    path,
                    format!("Input should be a valid string, got {}", type_name(other)),
                );
                None
            }
        }
    }

    pub fn integer(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
        bounds: &[Bound],
    ) -> Option<i64> {
        let value = self.required(obj, key, path)?;
        self.as_integer(value, &child(path, key), bounds)
    }

    pub fn as_integer(&mut self, value: &Value, path: &str, bounds: &[Bound]) -> Option<i64> {
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(parsed) = parsed else {
            self.violation(
                path,
                format!("Input should be a valid integer, got {}", type_name(value)),
            );
            return None;
        };
        self.within(parsed as f64, path, bounds).then_some(parsed)
    }

    pub fn number(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
        bounds: &[Bound],
    ) -> Option<f64> {
        let value = self.required(obj, key, path)?;
        self.as_number(value, &child(path, key), bounds)
    }

    /// A number that may be null. `Err(())` means a violation was recorded.
    pub fn optional_number(
        &mut self,
        value: Option<&Value>,
        path: &str,
        bounds: &[Bound],
    ) -> Result<Option<f64>, ()> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.as_number(value, path, bounds).map(Some).ok_or(()),
        }
    }

    fn as_number(&mut self, value: &Value, path: &str, bounds: &[Bound]) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        };
        let Some(parsed) = parsed else {
            self.violation(
                path,
                format!("Input should be a valid number, got {}", type_name(value)),
            );
            return None;
        };
        self.within(parsed, path, bounds).then_some(parsed)
    }

    fn within(&mut self, value: f64, path: &str, bounds: &[Bound]) -> bool {
        let mut ok = true;
        for bound in bounds {
            if let Some(message) = bound.check(value) {
                self.violation(path, message);
                ok = false;
            }
        }
        ok
    }

    pub fn literal<T: Literal>(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<T> {
        let value = self.required(obj, key, path)?;
        self.as_literal(value, &child(path, key))
    }

    pub fn optional_literal<T: Literal>(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Option<T>, ()> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.as_literal(value, &child(path, key)).map(Some).ok_or(()),
        }
    }

    fn as_literal<T: Literal>(&mut self, value: &Value, path: &str) -> Option<T> {
        let parsed = value.as_str().and_then(T::parse);
        if parsed.is_none() {
            let expected = T::literals()
                .iter()
                .map(|l| format!("'{}'", l))
                .collect::<Vec<_>>()
                .join(", ");
            self.violation(
                path,
                format!("Input should be one of {}, got {}", expected, value),
            );
        }
        parsed
    }

    pub fn array<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v Vec<Value>> {
        let value = self.required(obj, key, path)?;
        self.as_array(value, &child(path, key))
    }

    pub fn as_array<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Vec<Value>> {
        match value {
            Value::Array(items) => Some(items),
            other => {
                self.violation(
                    path,
                    format!("Input should be a valid list, got {}", type_name(other)),
                );
                None
            }
        }
    }

    /// A list of strings; every bad item is reported.
    pub fn string_list(&mut self, value: &Value, path: &str) -> Option<Vec<String>> {
        let items = self.as_array(value, path)?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.as_string(item, &indexed(path, i)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::literals::Prognosis;
    use serde_json::json;

    fn obj(value: &Value) -> &Map<String, Value> {
        value.as_object().unwrap()
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(child("", "age"), "age");
        assert_eq!(child("weight", "height_cm"), "weight.height_cm");
        assert_eq!(indexed("treatments", 2), "treatments[2]");
    }

    #[test]
    fn test_required_missing_and_null() {
        let value = json!({"a": null});
        let mut v = Validator::default();
        assert!(v.required(obj(&value), "a", "").is_none());
        assert!(v.required(obj(&value), "b", "").is_none());
        let errors = v.finish::<()>(None).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.has_path("a"));
        assert!(errors.has_path("b"));
    }

    #[test]
    fn test_integer_accepts_whole_floats_and_strings() {
        let value = json!({"a": 42.0, "b": "7", "c": 1.5, "d": true});
        let mut v = Validator::default();
        assert_eq!(v.integer(obj(&value), "a", "", &[]), Some(42));
        assert_eq!(v.integer(obj(&value), "b", "", &[]), Some(7));
        assert_eq!(v.integer(obj(&value), "c", "", &[]), None);
        assert_eq!(v.integer(obj(&value), "d", "", &[]), None);
        assert_eq!(v.finish::<()>(Some(())).unwrap_err().len(), 2);
    }

    #[test]
    fn test_bounds_are_all_reported() {
        let mut v = Validator::default();
        let value = json!({"snap": 50});
        assert!(
            v.integer(obj(&value), "snap", "", &[Bound::Gt(30.0), Bound::Lt(50.0)])
                .is_none()
        );
        let errors = v.finish::<()>(None).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.violations()[0].message.contains("less than 50"));
    }

    #[test]
    fn test_literal_lists_expected_values() {
        let value = json!({"prognosis": "Great"});
        let mut v = Validator::default();
        assert!(v.literal::<Prognosis>(obj(&value), "prognosis", "disease").is_none());
        let errors = v.finish::<()>(None).unwrap_err();
        assert!(errors.has_path("disease.prognosis"));
        assert!(errors.violations()[0].message.contains("'Stable'"));
    }

    #[test]
    fn test_string_list_reports_each_bad_item() {
        let value = json!(["ok", 1, null]);
        let mut v = Validator::default();
        assert!(v.string_list(&value, "risks").is_none());
        let errors = v.finish::<()>(None).unwrap_err();
        assert!(errors.has_path("risks[1]"));
        assert!(errors.has_path("risks[2]"));
    }

    #[test]
    fn test_display_lists_every_violation() {
        let errors = ValidationErrors::new(vec![
            FieldViolation::new("age", "Field required"),
            FieldViolation::new("", "boom"),
        ]);
        let text = errors.to_string();
        assert!(text.starts_with("2 validation errors for PatientProfile"));
        assert!(text.contains("age: Field required"));
        assert!(text.contains("<root>: boom"));
    }
}
