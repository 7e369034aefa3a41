//! CLI entry point for treatment model training.

use aegis_learning::{Pipeline, TrainingConfig, TrainingReport};
use aegis_processing::build_feature_frame;
use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Train treatment and dosage models on patient records",
    long_about = "Flattens patient JSON records, holds out whole patients, and trains a\n\
                  random-forest treatment classifier and dosage regressor.\n\n\
                  EXAMPLES:\n  \
                  # Train on the built-in sample record repeated 200 times\n  \
                  aegis-train\n\n  \
                  # Train on record folders\n  \
                  aegis-train -r Archive/Package_1 -r Archive/Package_2\n\n  \
                  # Train, then predict for one record\n  \
                  aegis-train -r Archive/Package_1 --predict patient.json"
)]
struct Args {
    /// Folder of *.json patient records (repeatable). Uses the sample record when omitted
    #[arg(short, long = "records")]
    records: Vec<PathBuf>,

    /// Copies of the sample record when no folder is given
    #[arg(long, default_value = "200")]
    sample_count: usize,

    /// Number of group folds; the first is held out
    #[arg(long, default_value = "5")]
    n_splits: usize,

    /// Trees per forest
    #[arg(short = 'n', long, default_value = "200")]
    n_estimators: usize,

    /// Maximum tree depth (unlimited when omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Skip the dosage regressor
    #[arg(long)]
    no_dosage: bool,

    /// Record file to predict for after training
    #[arg(short, long)]
    predict: Option<PathBuf>,

    /// Print the training report as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,
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

    let records = if args.records.is_empty() {
        info!("No record folders given; using {} sample records", args.sample_count);
        vec![sample_record(); args.sample_count]
    } else {
        load_records(&args.records)?
    };
    if records.is_empty() {
        bail!("No records to train on");
    }

    let frame = build_feature_frame(&records)?;

    let mut builder = TrainingConfig::builder()
        .n_splits(args.n_splits)
        .n_estimators(args.n_estimators)
        .random_seed(args.seed)
        .train_dosage_model(!args.no_dosage);
    if let Some(depth) = args.max_depth {
        builder = builder.max_depth(depth);
    }
    let config = builder.build()?;

    let pipeline = Pipeline::builder()
        .config(config)
        .on_progress(|update| info!("[{:>3.0}%] {}", update.progress * 100.0, update.message))
        .build()?;
    let outcome = pipeline.train(&frame)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        print_report(&outcome.report);
    }

    if let Some(path) = args.predict {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record: Value = serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        for prediction in outcome.model.predict_records(&[record])? {
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
    }

    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!(
        "Trained on {} rows, evaluated on {} ({} labelled of {}, {} patients)",
        report.n_train, report.n_test, report.n_labelled, report.n_rows, report.n_groups
    );
    println!();
    println!("Classification report for treatment_name:");
    println!("{}", report.classification);
    match report.dosage_mae {
        Some(mae) => println!("Dosage MAE: {:.4} ({} rows)", mae, report.n_dosage_test),
        None => println!("Dosage MAE: n/a"),
    }
    println!();
    println!("Top features:");
    for (name, importance) in report.top_features(10) {
        println!("  {:<40} {:.4}", name, importance);
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
}

/// Raw records from every `*.json` file in `folders`, sorted by file name.
fn load_records(folders: &[PathBuf]) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for folder in folders {
        if !folder.is_dir() {
            warn!("Folder not found: {}", folder.display());
            continue;
        }
        let mut files: Vec<PathBuf> = fs::read_dir(folder)
            .with_context(|| format!("Failed to list {}", folder.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_json_file(path))
            .collect();
        files.sort();

        for file in files {
            let parsed = fs::read_to_string(&file)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?));
            match parsed {
                Ok(record) => records.push(record),
                Err(err) => warn!("Skipping {}: {}", file.display(), err),
            }
        }
    }
    info!("Loaded {} records from {} folders", records.len(), folders.len());
    Ok(records)
}

fn is_json_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "json")
}

fn sample_record() -> Value {
    json!({
        "age": 65,
        "gender": {"category": "Male", "intersex_condition": null},
        "weight": {"weight_kg": 75, "height_cm": 170, "bmi_category": "Healthy"},
        "ethnicity": "Hispanic",
        "disease": {"name": "Type 2 Diabetes Mellitus", "diagnosed_years_ago": 6, "prognosis": "Stable"},
        "comorbidities": [],
        "treatments": [
            {"treatment_name": "Metformin", "dosage_mg_per_day": 1500,
             "percent_week_administered": 100, "indication": "Primary"}
        ],
        "genetic_variants": [
            {"variant_name": "SLC22A1 rs622342", "associated_risks": ["Altered metformin transport"]}
        ]
    })
}
