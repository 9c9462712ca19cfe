use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::diagnostics::{self, Diagnostics};
use crate::schema::FeatureSchema;
use crate::store::TrainingSet;

const HOLDOUT_FRACTION: f64 = 0.2;
const SPLIT_SEED: u64 = 34;
const MIN_TRAIN_ROWS: usize = 8;
const L2_REG: f64 = 0.01;
const MAX_ITERS: usize = 3000;
const LR_START: f64 = 0.1;
const IMPROVEMENT_EPS: f64 = 1e-5;
const PATIENCE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// `[team 100 loses, team 100 wins]`.
    pub probabilities: [f64; 2],
    pub label: bool,
}

impl Prediction {
    fn from_win_prob(p: f64) -> Self {
        Self {
            probabilities: [1.0 - p, p],
            label: p >= 0.5,
        }
    }

    pub fn win_probability(&self) -> f64 {
        self.probabilities[1]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub iterations: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
    pub log_loss: f64,
    pub brier: f64,
    pub confusion: ConfusionMatrix,
}

pub trait Model {
    fn train(&mut self, set: &TrainingSet) -> Result<TrainReport>;
    fn predict(&self, row: &[f64]) -> Result<Prediction>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LogisticArtifact {
    schema_version: u32,
    columns: Vec<String>,
    trained_at_utc: String,
    mean: Vec<f64>,
    std: Vec<f64>,
    coeffs: Vec<f64>,
    intercept: f64,
    report: TrainReport,
}

/// L2-regularised logistic regression on standardised features.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    schema_version: u32,
    columns: Vec<String>,
    fitted: Option<Fitted>,
    report: Option<TrainReport>,
}

#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    mean: Vec<f64>,
    std: Vec<f64>,
    coeffs: Vec<f64>,
    intercept: f64,
}

impl Fitted {
    fn win_prob(&self, row: &[f64]) -> f64 {
        let z = row
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .zip(&self.coeffs)
            .map(|((x, (m, s)), w)| w * standardized(*x, *m, *s))
            .sum::<f64>()
            + self.intercept;
        sigmoid(z)
    }
}

impl LogisticModel {
    pub fn new(schema: &FeatureSchema) -> Self {
        Self {
            schema_version: schema.version(),
            columns: schema.feature_columns(),
            fitted: None,
            report: None,
        }
    }

    pub fn report(&self) -> Option<&TrainReport> {
        self.report.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    /// Correlation, VIF and coefficient significance over `set`, using the
    /// fitted standardisation.
    pub fn diagnostics(&self, set: &TrainingSet) -> Result<Diagnostics> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| anyhow!("model has not been trained"))?;
        if set.columns != self.columns {
            return Err(anyhow!("training columns do not match model columns"));
        }
        let width = self.columns.len();
        let scaled = set
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(fitted.mean.iter().zip(&fitted.std))
                    .map(|(x, (m, s))| standardized(*x, *m, *s))
                    .collect()
            })
            .collect::<Vec<Vec<f64>>>();
        Ok(Diagnostics {
            columns: self.columns.clone(),
            correlation: diagnostics::correlation_matrix(&set.rows, width),
            vif: diagnostics::variance_inflation(&set.rows, width),
            coefficients: diagnostics::coefficient_stats(
                &self.columns,
                &scaled,
                &fitted.coeffs,
                fitted.intercept,
                L2_REG,
            ),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| anyhow!("model has not been trained"))?;
        let artifact = LogisticArtifact {
            schema_version: self.schema_version,
            columns: self.columns.clone(),
            trained_at_utc: Utc::now().to_rfc3339(),
            mean: fitted.mean.clone(),
            std: fitted.std.clone(),
            coeffs: fitted.coeffs.clone(),
            intercept: fitted.intercept,
            report: self.report.clone().unwrap_or_default(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let raw = serde_json::to_string_pretty(&artifact).context("serialize model")?;
        fs::write(path, raw).with_context(|| format!("write model {}", path.display()))?;
        Ok(())
    }

    /// Refuses artifacts whose column layout differs from `schema`.
    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("read model {}", path.display()))?;
        let artifact = serde_json::from_str::<LogisticArtifact>(&raw)
            .with_context(|| format!("invalid model artifact {}", path.display()))?;
        if artifact.schema_version != schema.version() {
            return Err(anyhow!(
                "model schema v{} does not match current v{}",
                artifact.schema_version,
                schema.version()
            ));
        }
        let expected = schema.feature_columns();
        if artifact.columns != expected {
            return Err(anyhow!(
                "model columns {:?} do not match {:?}",
                artifact.columns,
                expected
            ));
        }
        let width = expected.len();
        if artifact.mean.len() != width
            || artifact.std.len() != width
            || artifact.coeffs.len() != width
        {
            return Err(anyhow!("model artifact has inconsistent widths"));
        }
        Ok(Self {
            schema_version: artifact.schema_version,
            columns: artifact.columns,
            fitted: Some(Fitted {
                mean: artifact.mean,
                std: artifact.std,
                coeffs: artifact.coeffs,
                intercept: artifact.intercept,
            }),
            report: Some(artifact.report),
        })
    }
}

impl Model for LogisticModel {
    fn train(&mut self, set: &TrainingSet) -> Result<TrainReport> {
        if set.columns != self.columns {
            return Err(anyhow!(
                "training columns {:?} do not match model columns {:?}",
                set.columns,
                self.columns
            ));
        }
        if set.labels.len() != set.rows.len() {
            return Err(anyhow!(
                "{} rows but {} labels",
                set.rows.len(),
                set.labels.len()
            ));
        }
        let width = self.columns.len();
        if set.rows.iter().any(|r| r.len() != width) {
            return Err(anyhow!("training rows must have {width} features"));
        }

        let (train, holdout) = split(set);
        if train.len() < MIN_TRAIN_ROWS || holdout.is_empty() {
            return Err(anyhow!(
                "not enough training rows ({} total, need at least {})",
                set.len(),
                MIN_TRAIN_ROWS + 1
            ));
        }

        let (mean, std) = feature_norm_stats(&train, width);
        let scale = |rows: &[(&[f64], bool)]| -> Vec<(Vec<f64>, f64)> {
            rows.iter()
                .map(|(x, y)| {
                    let z = x
                        .iter()
                        .zip(mean.iter().zip(&std))
                        .map(|(v, (m, s))| standardized(*v, *m, *s))
                        .collect();
                    (z, if *y { 1.0 } else { 0.0 })
                })
                .collect()
        };
        let train_z = scale(&train);
        let holdout_z = scale(&holdout);

        let (coeffs, intercept, iterations) = fit_coeffs(&train_z, &holdout_z, width, L2_REG);
        let fitted = Fitted {
            mean,
            std,
            coeffs,
            intercept,
        };

        let scored = holdout
            .iter()
            .map(|(x, y)| (fitted.win_prob(x), *y))
            .collect::<Vec<_>>();
        let mut report = evaluate(&scored);
        report.train_rows = train.len();
        report.holdout_rows = holdout.len();
        report.iterations = iterations;
        info!(
            train_rows = report.train_rows,
            holdout_rows = report.holdout_rows,
            accuracy = report.accuracy,
            log_loss = report.log_loss,
            "model trained"
        );

        self.fitted = Some(fitted);
        self.report = Some(report.clone());
        Ok(report)
    }

    fn predict(&self, row: &[f64]) -> Result<Prediction> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| anyhow!("model has not been trained"))?;
        if row.len() != self.columns.len() {
            return Err(anyhow!(
                "expected {} features, got {}",
                self.columns.len(),
                row.len()
            ));
        }
        Ok(Prediction::from_win_prob(fitted.win_prob(row)))
    }
}

/// Seeded shuffle, so reruns over the same store split the same way.
fn split(set: &TrainingSet) -> (Vec<(&[f64], bool)>, Vec<(&[f64], bool)>) {
    let mut order = (0..set.rows.len()).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    order.shuffle(&mut rng);
    let holdout_len = (set.rows.len() as f64 * HOLDOUT_FRACTION).round() as usize;

    let mut train = Vec::with_capacity(order.len().saturating_sub(holdout_len));
    let mut holdout = Vec::with_capacity(holdout_len);
    for (pos, idx) in order.into_iter().enumerate() {
        let sample = (set.rows[idx].as_slice(), set.labels[idx]);
        if pos < holdout_len {
            holdout.push(sample);
        } else {
            train.push(sample);
        }
    }
    (train, holdout)
}

fn feature_norm_stats(rows: &[(&[f64], bool)], width: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mean = vec![0.0; width];
    let mut var = vec![0.0; width];
    let n = rows.len().max(1) as f64;
    for (x, _) in rows {
        for i in 0..width {
            mean[i] += x[i];
        }
    }
    for v in &mut mean {
        *v /= n;
    }
    for (x, _) in rows {
        for i in 0..width {
            let d = x[i] - mean[i];
            var[i] += d * d;
        }
    }
    let std = var.into_iter().map(|v| (v / n).sqrt().max(1e-6)).collect();
    (mean, std)
}

fn standardized(x: f64, mean: f64, std: f64) -> f64 {
    (x - mean) / std.max(1e-6)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn fit_coeffs(
    train: &[(Vec<f64>, f64)],
    val: &[(Vec<f64>, f64)],
    width: usize,
    l2: f64,
) -> (Vec<f64>, f64, usize) {
    let mut coeffs = vec![0.0; width];
    let mut intercept = 0.0;
    let mut best = (coeffs.clone(), intercept);
    let mut best_val = log_loss_for(&coeffs, intercept, val);
    let mut no_improve = 0usize;
    let mut iterations = 0;
    let n = train.len().max(1) as f64;

    for iter in 0..MAX_ITERS {
        iterations = iter + 1;
        let mut grad = vec![0.0; width];
        let mut grad_b = 0.0;
        for (x, y) in train {
            let p = sigmoid(dot(&coeffs, x) + intercept);
            let dz = p - y;
            grad_b += dz;
            for j in 0..width {
                grad[j] += dz * x[j];
            }
        }

        let lr = LR_START / (1.0 + (iter as f64 * 0.003));
        for j in 0..width {
            let g = grad[j] / n + l2 * coeffs[j];
            coeffs[j] -= lr * g;
        }
        intercept -= lr * grad_b / n;

        if iter % 20 == 0 || iter + 1 == MAX_ITERS {
            let val_ll = log_loss_for(&coeffs, intercept, val);
            if val_ll + IMPROVEMENT_EPS < best_val {
                best_val = val_ll;
                best = (coeffs.clone(), intercept);
                no_improve = 0;
            } else {
                no_improve = no_improve.saturating_add(1);
                if no_improve >= PATIENCE {
                    debug!(iter, best_val, "early stop");
                    break;
                }
            }
        }
    }

    (best.0, best.1, iterations)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn log_loss_for(coeffs: &[f64], intercept: f64, samples: &[(Vec<f64>, f64)]) -> f64 {
    if samples.is_empty() {
        return f64::INFINITY;
    }
    let sum: f64 = samples
        .iter()
        .map(|(x, y)| {
            let p = sigmoid(dot(coeffs, x) + intercept).clamp(1e-9, 1.0 - 1e-9);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    sum / samples.len() as f64
}

/// Metrics over `(predicted win probability, actual label)` pairs.
pub fn evaluate(scored: &[(f64, bool)]) -> TrainReport {
    let mut cm = ConfusionMatrix::default();
    let mut ll = 0.0;
    let mut brier = 0.0;
    for (p, y) in scored {
        match (*p >= 0.5, *y) {
            (true, true) => cm.true_positive += 1,
            (true, false) => cm.false_positive += 1,
            (false, true) => cm.false_negative += 1,
            (false, false) => cm.true_negative += 1,
        }
        let target = if *y { 1.0 } else { 0.0 };
        let pc = p.clamp(1e-9, 1.0 - 1e-9);
        ll += -(target * pc.ln() + (1.0 - target) * (1.0 - pc).ln());
        brier += (p - target).powi(2);
    }
    let n = scored.len().max(1) as f64;
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(cm.true_positive, cm.true_positive + cm.false_positive);
    let recall = ratio(cm.true_positive, cm.true_positive + cm.false_negative);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    TrainReport {
        accuracy: ratio(cm.true_positive + cm.true_negative, scored.len()),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(scored),
        log_loss: ll / n,
        brier: brier / n,
        confusion: cm,
        ..TrainReport::default()
    }
}

/// Rank-based AUC; ties count half. 0.5 when one class is absent.
fn roc_auc(scored: &[(f64, bool)]) -> f64 {
    let pos: Vec<f64> = scored.iter().filter(|(_, y)| *y).map(|(p, _)| *p).collect();
    let neg: Vec<f64> = scored.iter().filter(|(_, y)| !*y).map(|(p, _)| *p).collect();
    if pos.is_empty() || neg.is_empty() {
        return 0.5;
    }
    let mut wins = 0.0;
    for p in &pos {
        for q in &neg {
            if p > q {
                wins += 1.0;
            } else if p == q {
                wins += 0.5;
            }
        }
    }
    wins / (pos.len() * neg.len()) as f64
}
