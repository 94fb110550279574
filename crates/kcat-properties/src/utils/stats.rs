use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Utility functions for evaluating regression predictions.
pub struct Metrics;

impl Metrics {
    pub fn mae(pred: &[f32], target: &[f32]) -> f64 {
        pred.iter()
            .zip(target)
            .map(|(p, t)| (*p as f64 - *t as f64).abs())
            .sum::<f64>()
            / pred.len() as f64
    }

    pub fn mse(pred: &[f32], target: &[f32]) -> f64 {
        pred.iter()
            .zip(target)
            .map(|(p, t)| (*p as f64 - *t as f64).powi(2))
            .sum::<f64>()
            / pred.len() as f64
    }

    pub fn rmse(pred: &[f32], target: &[f32]) -> f64 {
        Self::mse(pred, target).sqrt()
    }

    /// Coefficient of determination. Undefined (NaN) for fewer than two
    /// samples; for a constant target it is 1.0 on a perfect fit, else 0.0.
    pub fn r2(pred: &[f32], target: &[f32]) -> f64 {
        if target.len() < 2 {
            return f64::NAN;
        }
        let mean_t = target.iter().map(|t| *t as f64).sum::<f64>() / target.len() as f64;
        let ss_res = pred
            .iter()
            .zip(target)
            .map(|(p, t)| (*t as f64 - *p as f64).powi(2))
            .sum::<f64>();
        let ss_tot = target
            .iter()
            .map(|t| (*t as f64 - mean_t).powi(2))
            .sum::<f64>();
        if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        }
    }
}

/// Aggregate of one pass over a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    /// Sum of the per-example squared errors.
    pub loss: f64,
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
    /// Number of examples whose loss was NaN or infinite.
    pub non_finite_losses: usize,
}

impl EpochSummary {
    pub fn from_predictions(loss: f64, predicted: &[f32], observed: &[f32], non_finite_losses: usize) -> Self {
        Self {
            loss,
            rmse: Metrics::rmse(predicted, observed),
            r2: Metrics::r2(predicted, observed),
            mae: Metrics::mae(predicted, observed),
            non_finite_losses,
        }
    }
}

/// One row of the per-epoch metric log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub elapsed_time: f64,
    pub train_loss: f64,
    #[serde(rename = "train_RMSE")]
    pub train_rmse: f64,
    #[serde(rename = "train_R2")]
    pub train_r2: f64,
    pub dev_loss: f64,
    #[serde(rename = "dev_RMSE")]
    pub dev_rmse: f64,
    #[serde(rename = "dev_R2")]
    pub dev_r2: f64,
    pub learning_rate: f64,
}

impl EpochRecord {
    pub fn new(
        epoch: usize,
        elapsed_time: f64,
        train: &EpochSummary,
        dev: &EpochSummary,
        learning_rate: f64,
    ) -> Self {
        Self {
            epoch,
            elapsed_time,
            train_loss: train.loss,
            train_rmse: train.rmse,
            train_r2: train.r2,
            dev_loss: dev.loss,
            dev_rmse: dev.rmse,
            dev_r2: dev.r2,
            learning_rate,
        }
    }
}

/// Ordered per-epoch metrics of a run, persisted as a CSV that is rewritten
/// in full on every save.
#[derive(Debug, Clone, Default)]
pub struct TrainingLog {
    pub records: Vec<EpochRecord>,
}

impl TrainingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes every record to a sibling temporary file and renames it over
    /// `path`, so readers only ever see a complete log.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut tmp = PathBuf::from(path);
        tmp.set_extension("csv.tmp");

        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("Failed to create metric log: {:?}", tmp))?;
            if self.records.is_empty() {
                writer.write_record([
                    "epoch",
                    "elapsed_time",
                    "train_loss",
                    "train_RMSE",
                    "train_R2",
                    "dev_loss",
                    "dev_RMSE",
                    "dev_R2",
                    "learning_rate",
                ])?;
            }
            for record in &self.records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move metric log into place: {:?}", path))?;
        Ok(())
    }
}
