//! Fine-tuning dataset export.
//!
//! Every valid patient record becomes one `{"input", "output"}` JSON line:
//! the input describes the patient in prose and ends with a fixed
//! instruction, the output lists the recorded treatments.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::{ProcessingError, RecordError, Result, ResultExt};
use crate::schema::{PatientProfile, Treatment};

/// Instruction appended to every input text.
pub const INSTRUCTION: &str = "Generate a treatment plan in JSON format. Use the exact format: \
Treatment: <treatment_name>, Dosage: <float> mg/day, Percent week administered: <float>%, \
Indication: <[Primary, Comorbidity, Other]>.";

/// Rendered in place of a missing dosage or percentage.
pub const UNSPECIFIED: &str = "unspecified";

/// One fine-tuning example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub input: String,
    pub output: String,
}

impl TrainingPair {
    pub fn from_profile(profile: &PatientProfile) -> Self {
        Self {
            input: format!("{}{}", describe_patient(profile), INSTRUCTION),
            output: format_treatments(&profile.treatments),
        }
    }
}

/// Format a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    // -0.0 would print as "-0"
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| UNSPECIFIED.to_string(), format_number)
}

/// Prose description of a patient, without the instruction.
pub fn describe_patient(profile: &PatientProfile) -> String {
    format!(
        "Patient is {} years old. gender: {}. weight: {} kg. height: {} cm. \
         BMI category: {}. ethnicity: {}. primary disease: {}. diagnosed {} years ago. \
         prognosis: {}. Comorbidities: {}. ",
        profile.age,
        profile.gender.category,
        format_number(profile.weight.weight_kg),
        format_number(profile.weight.height_cm),
        profile.weight.bmi_category,
        profile.ethnicity,
        profile.disease.name,
        format_number(profile.disease.diagnosed_years_ago),
        profile.disease.prognosis,
        profile.comorbidity_names().join(", "),
    )
}

pub fn format_treatment(treatment: &Treatment) -> String {
    format!(
        "Treatment: {}, Dosage: {} mg/day, Percent week administered: {}%, Indication: {}",
        treatment.treatment_name,
        format_optional(treatment.dosage_mg_per_day),
        format_optional(treatment.percent_week_administered),
        treatment.indication,
    )
}

/// All treatments joined with `". "`. Empty when there are none.
pub fn format_treatments(treatments: &[Treatment]) -> String {
    treatments
        .iter()
        .map(format_treatment)
        .collect::<Vec<_>>()
        .join(". ")
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Exported,
    Skipped { kind: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Summary of an export run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    /// Folders that existed and were scanned.
    pub folders_scanned: Vec<PathBuf>,
    /// Configured folders that did not exist.
    pub folders_missing: Vec<PathBuf>,
    /// Per-file outcomes in processing order.
    pub files: Vec<FileOutcome>,
    pub duration_ms: u64,
}

impl ExportReport {
    /// Number of lines written.
    pub fn exported(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Exported)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files.len() - self.exported()
    }
}

/// Reads patient folders and writes the JSONL dataset.
#[derive(Debug, Clone)]
pub struct FineTuningExporter {
    config: ExportConfig,
}

static_assertions::assert_impl_all!(FineTuningExporter: Send, Sync);
static_assertions::assert_impl_all!(ExportReport: Send, Sync);

impl FineTuningExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export to the configured output file, truncating it first.
    pub fn run(&self) -> Result<ExportReport> {
        self.config.validate()?;
        let path = &self.config.output_path;
        let file = File::create(path)
            .context(format!("Failed to create output file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        let report = self.export_to_writer(&mut writer)?;
        writer
            .flush()
            .context(format!("Failed to write output file '{}'", path.display()))?;

        info!(
            "Wrote {} training pairs to {} ({} skipped)",
            report.exported(),
            path.display(),
            report.skipped()
        );
        Ok(report)
    }

    /// Export to any writer. Bad records are skipped; write failures are fatal.
    pub fn export_to_writer<W: Write>(&self, writer: &mut W) -> Result<ExportReport> {
        let start = Instant::now();
        let mut report = ExportReport::default();

        for folder in &self.config.source_folders {
            info!("Processing folder: {}", folder.display());
            let files = match list_json_files(folder) {
                Ok(files) => files,
                Err(e) => {
                    warn!("Skipping folder {}: {}", folder.display(), e);
                    report.folders_missing.push(folder.clone());
                    continue;
                }
            };
            report.folders_scanned.push(folder.clone());

            for path in files {
                let status = match PatientProfile::from_path(&path) {
                    Ok(profile) => {
                        write_pair(writer, &TrainingPair::from_profile(&profile))?;
                        debug!("Exported {}", path.display());
                        FileStatus::Exported
                    }
                    Err(e) => {
                        log_rejection(&path, &e);
                        FileStatus::Skipped {
                            kind: e.kind().to_string(),
                            reason: e.to_string(),
                        }
                    }
                };
                report.files.push(FileOutcome { path, status });
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

fn log_rejection(path: &Path, error: &RecordError) {
    match error {
        RecordError::Schema(errors) => {
            warn!("Validation failed for {}:\n{}", path.display(), errors)
        }
        RecordError::MalformedJson(e) => warn!("Invalid JSON in file {}: {}", path.display(), e),
        RecordError::Io(e) => warn!("Could not read {}: {}", path.display(), e),
    }
}

fn write_pair<W: Write>(writer: &mut W, pair: &TrainingPair) -> Result<()> {
    serde_json::to_writer(&mut *writer, pair)?;
    writer.write_all(b"\n").map_err(ProcessingError::Io)
}

/// `*.json` files directly inside `folder`, sorted by name.
pub fn list_json_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Indication, Treatment};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn treatment(
        name: &str,
        dosage: Option<f64>,
        percent: Option<f64>,
        indication: Indication,
    ) -> Treatment {
        Treatment {
            treatment_name: name.to_string(),
            dosage_mg_per_day: dosage,
            percent_week_administered: percent,
            indication,
        }
    }

    fn profile() -> PatientProfile {
        PatientProfile::from_value(&json!({
            "age": 62,
            "gender": {"category": "Female"},
            "weight": {"weight_kg": 68.5, "height_cm": 160, "bmi_category": "Overweight"},
            "ethnicity": "East Asian",
            "disease": {"name": "Asthma", "diagnosed_years_ago": 10, "prognosis": "Stable"},
            "comorbidities": [
                {"name": "GERD", "diagnosed_years_ago": 2, "prognosis": "Improving"},
                {"name": "Anxiety", "diagnosed_years_ago": 1.5, "prognosis": "Unknown"}
            ],
            "treatments": [
                {"treatment_name": "Budesonide", "dosage_mg_per_day": 0.4,
                 "percent_week_administered": 100, "indication": "Primary"}
            ],
            "genetic_variants": []
        }))
        .unwrap()
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(1500.0), "1500");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn test_format_treatments_joined() {
        let treatments = vec![
            treatment("A", Some(10.0), Some(50.0), Indication::Primary),
            treatment("B", Some(5.0), Some(100.0), Indication::Comorbidity),
        ];
        assert_eq!(
            format_treatments(&treatments),
            "Treatment: A, Dosage: 10 mg/day, Percent week administered: 50%, Indication: Primary. \
             Treatment: B, Dosage: 5 mg/day, Percent week administered: 100%, Indication: Comorbidity"
        );
    }

    #[test]
    fn test_missing_values_render_unspecified() {
        let t = treatment("Rest", None, None, Indication::Other);
        assert_eq!(
            format_treatment(&t),
            "Treatment: Rest, Dosage: unspecified mg/day, Percent week administered: unspecified%, Indication: Other"
        );
        assert_eq!(format_treatments(&[]), "");
    }

    #[test]
    fn test_describe_patient() {
        assert_eq!(
            describe_patient(&profile()),
            "Patient is 62 years old. gender: Female. weight: 68.5 kg. height: 160 cm. \
             BMI category: Overweight. ethnicity: East Asian. primary disease: Asthma. \
             diagnosed 10 years ago. prognosis: Stable. Comorbidities: GERD, Anxiety. "
        );
    }

    #[test]
    fn test_training_pair_appends_instruction() {
        let pair = TrainingPair::from_profile(&profile());
        assert!(pair.input.ends_with(INSTRUCTION));
        assert!(pair.input.contains("Comorbidities: GERD, Anxiety. Generate a treatment plan"));
        assert_eq!(
            pair.output,
            "Treatment: Budesonide, Dosage: 0.4 mg/day, Percent week administered: 100%, Indication: Primary"
        );
    }

    #[test]
    fn test_empty_comorbidities() {
        let mut p = profile();
        p.comorbidities.clear();
        assert!(describe_patient(&p).ends_with("Comorbidities: . "));
    }

    #[test]
    fn test_report_counts() {
        let report = ExportReport {
            files: vec![
                FileOutcome {
                    path: "a.json".into(),
                    status: FileStatus::Exported,
                },
                FileOutcome {
                    path: "b.json".into(),
                    status: FileStatus::Skipped {
                        kind: "schema".into(),
                        reason: "bad".into(),
                    },
                },
            ],
            ..Default::default()
        };
        assert_eq!(report.exported(), 1);
        assert_eq!(report.skipped(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"][1]["status"], "skipped");
        assert_eq!(json["files"][1]["kind"], "schema");
    }

    #[test]
    fn test_missing_folder_is_skipped() {
        let config = ExportConfig::builder()
            .source_folder("/no/such/folder/anywhere")
            .build()
            .unwrap();
        let mut out = Vec::new();
        let report = FineTuningExporter::new(config)
            .export_to_writer(&mut out)
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(report.folders_missing.len(), 1);
        assert!(report.folders_scanned.is_empty());
    }
}
