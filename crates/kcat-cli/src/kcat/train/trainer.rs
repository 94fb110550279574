use anyhow::{Context, Result};
use kcat_properties::models::kcat_model::KcatModel;
use kcat_properties::models::model_interface::ModelInterface;
use kcat_properties::models::trainer::{Tester, Trainer};
use kcat_properties::utils::logging::get_rss_memory;
use kcat_properties::utils::stats::{EpochRecord, EpochSummary, TrainingLog};
use kcat_properties::utils::utils::get_device;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::kcat::load_data::load_dataset;
use crate::kcat::train::input::{KcatTrainConfig, RunArgs};
use crate::kcat::train::plot::{plot_learning_rate, plot_rmse_curves};
use crate::kcat::util::{ensure_dir, validate_data_dir, write_bytes_to_file};

/// Outcome of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub test: EpochSummary,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub log: TrainingLog,
}

pub fn run_training(config: &KcatTrainConfig) -> Result<TrainingSummary> {
    let data_dir = Path::new(&config.data_dir);
    validate_data_dir(data_dir)?;
    ensure_dir(Path::new(&config.output_dir))?;

    let device = get_device(&config.device)?;
    if let Some(seed) = config.seed {
        if let Err(e) = device.set_seed(seed) {
            log::debug!("Device {:?} does not support seeding: {}", device, e);
        }
    }
    log::info!("Using device: {:?}", device);

    let dataset = load_dataset(data_dir, true).context("Failed to load training data")?;
    let (protein_length, feature_width) = dataset
        .protein_shape()
        .ok_or_else(|| anyhow::anyhow!("No examples found in {:?}", data_dir))?;

    let args = RunArgs {
        config: config.clone(),
        len_fingerprint: dataset.vocab_size(),
        protein_length,
        feature_width,
    };
    let args_path = config.output_path("-args.json");
    let args_json = serde_json::to_string_pretty(&args)?;
    write_bytes_to_file(&args_path, args_json.as_bytes())
        .with_context(|| format!("Failed to write run arguments: {:?}", args_path))?;
    log::info!("Run arguments written to: {:?}", args_path);

    let split = dataset.split(config.split_seed, config.train_ratio, config.dev_ratio);
    if split.train.is_empty() {
        anyhow::bail!("Training partition is empty; provide more examples or raise train_ratio");
    }

    let model = KcatModel::new_untrained(&args.model_config(), device)?;
    model.print_summary();
    let mut trainer = Trainer::new(&model, &config.trainer_config())?;

    let metrics_path = config.output_path("-metrics.csv");
    let mut metrics_log = TrainingLog::new();
    let start = Instant::now();
    log::info!("Training {} model for {} epochs", config.model_name, config.epochs);

    for epoch in 0..config.epochs {
        let (train, lr) = trainer
            .train(&model, &split.train)
            .with_context(|| format!("Training failed in epoch {}", epoch + 1))?;
        let dev = Tester::test(&model, &split.dev)
            .with_context(|| format!("Evaluation failed in epoch {}", epoch + 1))?;
        let elapsed = start.elapsed().as_secs_f64();

        log::info!(
            "Epoch {}/{}: train loss {:.4}, RMSE {:.4}, R2 {:.4} | dev loss {:.4}, RMSE {:.4}, R2 {:.4} | lr {:.6}",
            epoch + 1,
            config.epochs,
            train.loss,
            train.rmse,
            train.r2,
            dev.loss,
            dev.rmse,
            dev.r2,
            lr
        );
        log::debug!("Memory in use: {} MB", get_rss_memory() / (1024 * 1024));

        metrics_log.push(EpochRecord::new(epoch + 1, elapsed, &train, &dev, lr));

        if epoch % config.checkpoint_interval == 0 {
            let checkpoint = config.output_path(&format!("_{}.safetensors", epoch));
            model.save(&checkpoint)?;
        }
        metrics_log.save_csv(&metrics_path)?;
    }

    let test = Tester::test(&model, &split.test).context("Failed to score the test set")?;
    log::info!(
        "Test: loss {:.4}, RMSE {:.4}, R2 {:.4}, MAE {:.4}",
        test.loss,
        test.rmse,
        test.r2,
        test.mae
    );

    let model_path = config.output_path(".safetensors");
    model.save(&model_path)?;
    metrics_log.save_csv(&metrics_path)?;
    log::info!("Metric log saved to: {:?}", metrics_path);

    if !metrics_log.is_empty() {
        let curves_path = config.output_path("-curves.html");
        write_bytes_to_file(&curves_path, plot_rmse_curves(&metrics_log).to_html().as_bytes())
            .with_context(|| format!("Failed to write plot: {:?}", curves_path))?;
        let lr_path = config.output_path("-learning-rate.html");
        write_bytes_to_file(&lr_path, plot_learning_rate(&metrics_log).to_html().as_bytes())
            .with_context(|| format!("Failed to write plot: {:?}", lr_path))?;
        log::info!("Training curves written to: {:?}", curves_path);
    }

    log::info!("Training completed in {:?}", start.elapsed());

    Ok(TrainingSummary {
        epochs: config.epochs,
        test,
        model_path,
        metrics_path,
        log: metrics_log,
    })
}
