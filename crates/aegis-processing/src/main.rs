//! CLI entry point for patient-record processing.

use aegis_processing::{ExportConfig, FineTuningExporter, PatientProfile, RecordError, json_schema};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[cfg(feature = "client")]
use aegis_processing::{ClientConfig, TrainingPair, TreatmentClient};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Patient-record validation and fine-tuning export",
    long_about = "Validates patient JSON records and prepares them for model training.\n\n\
                  EXAMPLES:\n  \
                  # Export the default Archive/Package_1..8 folders\n  \
                  aegis-processing export\n\n  \
                  # Export selected folders to a custom file\n  \
                  aegis-processing export -s data/a -s data/b -o train.jsonl\n\n  \
                  # Check records without exporting\n  \
                  aegis-processing validate records/*.json\n\n  \
                  # Print the JSON schema used for structured output\n  \
                  aegis-processing schema"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one {input, output} JSON line per valid record
    Export {
        /// Source folder (repeatable). Defaults to Archive/Package_1..8
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Output JSONL file
        #[arg(short, long, default_value = "gemini_train.jsonl")]
        output: PathBuf,

        /// Print the export report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate record files and list every violation
    Validate {
        /// Record files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the patient-record JSON schema
    Schema,

    /// Send a patient description to the treatment endpoint
    #[cfg(feature = "client")]
    Consult {
        /// Endpoint URL
        #[arg(short, long, default_value = aegis_processing::config::DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Free-text patient description
        #[arg(short, long, conflicts_with = "record")]
        patient: Option<String>,

        /// Record file to describe instead of free text
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Request timeout in seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },
}

fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet);

    match args.command {
        Command::Export {
            sources,
            output,
            json,
        } => run_export(sources, output, json),
        Command::Validate { files } => run_validate(&files),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&json_schema())?);
            Ok(())
        }
        #[cfg(feature = "client")]
        Command::Consult {
            endpoint,
            patient,
            record,
            timeout_secs,
        } => run_consult(endpoint, patient, record, timeout_secs),
    }
}

fn run_export(sources: Vec<PathBuf>, output: PathBuf, json: bool) -> Result<()> {
    let mut builder = ExportConfig::builder().output_path(output);
    if !sources.is_empty() {
        builder = builder.source_folders(sources);
    }
    let config = builder.build()?;

    let report = FineTuningExporter::new(config).run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Exported {} records ({} skipped) from {} folders in {} ms",
            report.exported(),
            report.skipped(),
            report.folders_scanned.len(),
            report.duration_ms
        );
        for folder in &report.folders_missing {
            println!("  missing folder: {}", folder.display());
        }
    }
    Ok(())
}

/// Note: uses `println!` for the per-file verdicts; they are the command's output.
fn run_validate(files: &[PathBuf]) -> Result<()> {
    let mut failures = 0usize;
    for path in files {
        match PatientProfile::from_path(path) {
            Ok(_) => println!("OK    {}", path.display()),
            Err(RecordError::Schema(errors)) => {
                failures += 1;
                println!("FAIL  {}", path.display());
                for violation in errors.violations() {
                    println!("      {}", violation);
                }
            }
            Err(e) => {
                failures += 1;
                println!("FAIL  {}: {}", path.display(), e);
            }
        }
    }

    info!("{} of {} files valid", files.len() - failures, files.len());
    if failures > 0 {
        return Err(anyhow!("{} of {} files failed validation", failures, files.len()));
    }
    Ok(())
}

#[cfg(feature = "client")]
fn run_consult(
    endpoint: String,
    patient: Option<String>,
    record: Option<PathBuf>,
    timeout_secs: u64,
) -> Result<()> {
    let description = match (patient, record) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            let profile = PatientProfile::load(&path)?;
            TrainingPair::from_profile(&profile).input
        }
        (None, None) => return Err(anyhow!("Provide --patient or --record")),
    };

    let config = ClientConfig::builder()
        .endpoint(endpoint)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?;
    let client = TreatmentClient::new(config)?;

    let plan = client.consult(&description)?;
    if plan.is_empty() {
        warn!("Endpoint returned an empty plan");
    }
    println!("{}", plan);
    Ok(())
}
