use std::path::PathBuf;

use anyhow::{Result, anyhow};

use rift_predictor::config::PipelineConfig;
use rift_predictor::model::{LogisticModel, Model};
use rift_predictor::store::{RecordStore, SqliteStore};
use rift_predictor::telemetry;

const HIGH_CORRELATION: f64 = 0.8;

fn main() -> Result<()> {
    telemetry::init();
    let mut cfg = PipelineConfig::from_env_offline()?;
    if let Some(path) = parse_path_arg("--db") {
        cfg.db_path = path;
    }
    if let Some(path) = parse_path_arg("--model") {
        cfg.model_path = path;
    }

    let store = SqliteStore::open(&cfg.db_path)?;
    let set = store.load_training_set(&cfg.schema)?;
    if set.is_empty() {
        return Err(anyhow!(
            "no complete training rows in {}",
            cfg.db_path.display()
        ));
    }

    let mut model = LogisticModel::new(&cfg.schema);
    let report = model.train(&set)?;
    model.save(&cfg.model_path)?;

    println!("Model trained");
    println!("Rows: train={} holdout={}", report.train_rows, report.holdout_rows);
    println!("Iterations: {}", report.iterations);
    println!("Accuracy: {:.4}", report.accuracy);
    println!("Precision: {:.4}", report.precision);
    println!("Recall: {:.4}", report.recall);
    println!("F1: {:.4}", report.f1);
    println!("ROC AUC: {:.4}", report.roc_auc);
    println!("Log loss: {:.4}", report.log_loss);
    println!("Brier: {:.4}", report.brier);
    let cm = report.confusion;
    println!(
        "Confusion: [[{} {}] [{} {}]]",
        cm.true_negative, cm.false_positive, cm.false_negative, cm.true_positive
    );
    println!("Saved: {}", cfg.model_path.display());

    let diag = model.diagnostics(&set)?;
    println!();
    println!("Coefficients (standardised):");
    for c in &diag.coefficients {
        println!(
            "  {:<16} {:>9.4}  se={:.4}  z={:>7.3}  p={:.4}",
            c.column, c.coefficient, c.std_error, c.z, c.p_value
        );
    }
    println!("VIF:");
    for (column, vif) in diag.columns.iter().zip(&diag.vif) {
        match vif {
            Some(v) => println!("  {column:<16} {v:.2}"),
            None => println!("  {column:<16} -"),
        }
    }
    let pairs = diag.correlated_pairs(HIGH_CORRELATION);
    if !pairs.is_empty() {
        println!("Highly correlated (|r| >= {HIGH_CORRELATION}):");
        for (a, b, r) in pairs {
            println!("  {a} ~ {b}: {r:.3}");
        }
    }
    Ok(())
}

fn parse_path_arg(flag: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
