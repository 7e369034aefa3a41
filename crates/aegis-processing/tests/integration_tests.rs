//! Integration tests for patient-record processing.
//!
//! These tests run the exporter and feature builder against record files
//! laid out the way the archive packages are.

use aegis_processing::{
    ExportConfig, FileStatus, FineTuningExporter, PatientProfile, ProcessingError, RecordError,
    TrainingPair, build_feature_frame, utils::column_f64, utils::column_labels,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> PathBuf {
    fixtures_path().join(name)
}

fn load_value(name: &str) -> Value {
    let content = fs::read_to_string(fixture(name)).expect("Failed to read fixture");
    serde_json::from_str(&content).expect("Fixture is not valid JSON")
}

/// Copy fixtures into `<root>/<package>/`.
fn package(root: &Path, package: &str, files: &[&str]) -> PathBuf {
    let dir = root.join(package);
    fs::create_dir_all(&dir).unwrap();
    for file in files {
        fs::copy(fixture(file), dir.join(file)).unwrap();
    }
    dir
}

fn read_lines(path: &Path) -> Vec<TrainingPair> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("Each line should be a training pair"))
        .collect()
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_fixture_profiles() {
    let diabetes = PatientProfile::from_path(fixture("patient_diabetes.json")).unwrap();
    assert_eq!(diabetes.treatments.len(), 2);
    assert_eq!(diabetes.comorbidity_names(), vec!["Hypertension"]);

    let hiv = PatientProfile::from_path(fixture("patient_hiv.json")).unwrap();
    assert_eq!(hiv.snap, 42);
    assert_eq!(hiv.treatments[0].percent_week_administered, Some(0.0));
    assert_eq!(hiv.genetic_variants[0].variant_name.as_deref(), Some("HLA-B *57:01"));
}

#[test]
fn test_invalid_fixture_reports_all_violations() {
    let err = PatientProfile::from_path(fixture("invalid_snap.json")).unwrap_err();
    let violations = err.violations().expect("Should be a schema error");
    assert_eq!(violations.len(), 2);
    assert!(violations.has_path("snap"));
    assert!(violations.has_path("treatments[0].indication"));

    let err = PatientProfile::from_path(fixture("malformed.json")).unwrap_err();
    assert!(matches!(err, RecordError::MalformedJson(_)));
}

#[test]
fn test_load_names_the_rejected_file() {
    assert!(PatientProfile::load(fixture("patient_hiv.json")).is_ok());

    let err = PatientProfile::load(fixture("invalid_snap.json")).unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
    assert!(err.to_string().contains("invalid_snap.json"));

    let err = PatientProfile::load(fixture("malformed.json")).unwrap_err();
    assert_eq!(err.error_code(), "RECORD_MALFORMED_JSON");
    assert!(matches!(
        err,
        ProcessingError::Record { ref path, .. } if path.ends_with("malformed.json")
    ));

    let err = PatientProfile::load(fixture("absent.json")).unwrap_err();
    assert_eq!(err.error_code(), "RECORD_UNREADABLE");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["code"], "RECORD_UNREADABLE");
}

// ============================================================================
// Export Tests
// ============================================================================

#[test]
fn test_export_writes_one_line_per_valid_record() {
    let tmp = TempDir::new().unwrap();
    let p1 = package(
        tmp.path(),
        "Package_1",
        &["patient_diabetes.json", "invalid_snap.json"],
    );
    let p2 = package(tmp.path(), "Package_2", &["patient_hiv.json", "malformed.json"]);
    let output = tmp.path().join("train.jsonl");

    let config = ExportConfig::builder()
        .source_folders([p1, p2, tmp.path().join("Package_3")])
        .output_path(&output)
        .build()
        .unwrap();
    let report = FineTuningExporter::new(config).run().unwrap();

    assert_eq!(report.exported(), 2);
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.folders_scanned.len(), 2);
    assert_eq!(report.folders_missing, vec![tmp.path().join("Package_3")]);

    let pairs = read_lines(&output);
    assert_eq!(pairs.len(), report.exported());
    assert!(pairs[0].input.starts_with("Patient is 65 years old. gender: Male. weight: 75 kg."));
    assert_eq!(
        pairs[0].output,
        "Treatment: Metformin, Dosage: 1500 mg/day, Percent week administered: 100%, Indication: Primary. \
         Treatment: Lisinopril, Dosage: 10 mg/day, Percent week administered: 100%, Indication: Comorbidity"
    );
    assert!(pairs[1].input.contains("height: 166.5 cm."));
    assert!(pairs[1].input.contains("Comorbidities: . Generate a treatment plan"));
    assert_eq!(
        pairs[1].output,
        "Treatment: Biktarvy, Dosage: 50 mg/day, Percent week administered: 0%, Indication: Primary"
    );
}

#[test]
fn test_export_order_is_sorted_by_file_name() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("pkg");
    fs::create_dir_all(&dir).unwrap();
    fs::copy(fixture("patient_hiv.json"), dir.join("a.json")).unwrap();
    fs::copy(fixture("patient_diabetes.json"), dir.join("b.json")).unwrap();
    fs::write(dir.join("notes.txt"), "not a record").unwrap();

    let config = ExportConfig::builder().source_folder(&dir).build().unwrap();
    let mut out = Vec::new();
    let report = FineTuningExporter::new(config)
        .export_to_writer(&mut out)
        .unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].path, dir.join("a.json"));
    let text = String::from_utf8(out).unwrap();
    let first: TrainingPair = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert!(first.input.starts_with("Patient is 38 years old."));
}

#[test]
fn test_skipped_files_carry_kind() {
    let tmp = TempDir::new().unwrap();
    let dir = package(tmp.path(), "pkg", &["invalid_snap.json", "malformed.json"]);

    let config = ExportConfig::builder().source_folder(dir).build().unwrap();
    let mut out = Vec::new();
    let report = FineTuningExporter::new(config)
        .export_to_writer(&mut out)
        .unwrap();

    let kinds: Vec<&str> = report
        .files
        .iter()
        .filter_map(|f| match &f.status {
            FileStatus::Skipped { kind, .. } => Some(kind.as_str()),
            FileStatus::Exported => None,
        })
        .collect();
    assert_eq!(kinds, vec!["schema", "malformed_json"]);
    assert!(out.is_empty());
}

#[test]
fn test_unwritable_output_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let dir = package(tmp.path(), "pkg", &["patient_hiv.json"]);

    let config = ExportConfig::builder()
        .source_folder(dir)
        .output_path(tmp.path().join("no/such/dir/out.jsonl"))
        .build()
        .unwrap();
    let err = FineTuningExporter::new(config).run().unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
    assert!(matches!(err, ProcessingError::WithContext { .. }));
}

// ============================================================================
// Feature Frame Tests
// ============================================================================

#[test]
fn test_feature_frame_from_fixtures() {
    let records = vec![
        load_value("patient_diabetes.json"),
        load_value("patient_hiv.json"),
        load_value("invalid_snap.json"),
    ];
    let df = build_feature_frame(&records).unwrap();

    assert_eq!(df.height(), 3);
    assert_eq!(
        column_labels(&df, "patient_id").unwrap(),
        vec![Some("P-0001".to_string()), Some("P-0002".to_string()), None]
    );
    assert_eq!(
        column_labels(&df, "treatment_name").unwrap(),
        vec![
            Some("Metformin".to_string()),
            Some("Biktarvy".to_string()),
            Some("Salbutamol".to_string())
        ]
    );
    assert_eq!(
        column_f64(&df, "var__SLC22A1 rs622342").unwrap(),
        vec![Some(1.0), Some(0.0), Some(0.0)]
    );
    // raw variant shape without variant_name contributes no column
    assert!(df.column("var__HLA-B *57:01").is_err());

    let bmi = column_f64(&df, "bmi").unwrap();
    assert!((bmi[0].unwrap() - 25.95).abs() < 0.01);
    assert_eq!(column_f64(&df, "comorbidity_count").unwrap()[0], Some(1.0));
}
