use anyhow::{Context, Result};
use clap::ArgMatches;
use kcat_properties::models::kcat_model::KcatModelConfig;
use kcat_properties::models::trainer::TrainerConfig;
use kcat_properties::utils::data_handling::{
    DEFAULT_DEV_RATIO, DEFAULT_SPLIT_SEED, DEFAULT_TRAIN_RATIO,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KcatTrainConfig {
    pub version: String,
    pub data_dir: String,
    pub output_dir: String,
    pub model_name: String,
    pub device: String,
    pub dim: usize,
    pub layer_gnn: usize,
    pub layer_output: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub epochs: usize,
    pub lr_milestones: Vec<usize>,
    pub lr_gamma: f64,
    /// Checkpoint every this many epochs (0-based epoch index).
    pub checkpoint_interval: usize,
    pub split_seed: u64,
    pub train_ratio: f64,
    pub dev_ratio: f64,
    /// Seed of the per-epoch shuffle; unseeded when absent.
    pub seed: Option<u64>,
}

impl Default for KcatTrainConfig {
    fn default() -> Self {
        KcatTrainConfig {
            version: clap::crate_version!().to_string(),
            data_dir: String::from("data"),
            output_dir: String::from("output"),
            model_name: String::from("Kcat"),
            device: String::from("auto"),
            dim: 20,
            layer_gnn: 3,
            layer_output: 3,
            learning_rate: 1e-4,
            weight_decay: 1e-6,
            epochs: 100,
            lr_milestones: vec![35, 70],
            lr_gamma: 0.1,
            checkpoint_interval: 20,
            split_seed: DEFAULT_SPLIT_SEED,
            train_ratio: DEFAULT_TRAIN_RATIO,
            dev_ratio: DEFAULT_DEV_RATIO,
            seed: None,
        }
    }
}

impl KcatTrainConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let mut config = Self::from_file(config_path)?;

        // Apply CLI overrides
        if let Some(data_dir) = matches.get_one::<String>("data_dir") {
            config.data_dir = data_dir.clone();
        }
        if let Some(output_dir) = matches.get_one::<String>("output_dir") {
            config.output_dir = output_dir.clone();
        }
        if let Some(epochs) = matches.get_one::<usize>("epochs") {
            config.epochs = *epochs;
        }
        if let Some(device) = matches.get_one::<String>("device") {
            config.device = device.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config; missing or invalid fields keep their defaults.
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Config file is not valid JSON: {:?}", config_path))?;
        let mut config = KcatTrainConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        );
                    }
                } else {
                    log::warn!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    );
                }
            };
        }

        load_or_default!(data_dir);
        load_or_default!(output_dir);
        load_or_default!(model_name);
        load_or_default!(device);
        load_or_default!(dim);
        load_or_default!(layer_gnn);
        load_or_default!(layer_output);
        load_or_default!(learning_rate);
        load_or_default!(weight_decay);
        load_or_default!(epochs);
        load_or_default!(lr_milestones);
        load_or_default!(lr_gamma);
        load_or_default!(checkpoint_interval);
        load_or_default!(split_seed);
        load_or_default!(train_ratio);
        load_or_default!(dev_ratio);
        load_or_default!(seed);

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name.is_empty() {
            anyhow::bail!("model_name must not be empty");
        }
        if self.dim == 0 {
            anyhow::bail!("dim must be positive");
        }
        if self.checkpoint_interval == 0 {
            anyhow::bail!("checkpoint_interval must be positive");
        }
        for (name, ratio) in [("train_ratio", self.train_ratio), ("dev_ratio", self.dev_ratio)] {
            if !(0.0..=1.0).contains(&ratio) {
                anyhow::bail!("{} must lie in [0, 1], got {}", name, ratio);
            }
        }
        Ok(())
    }

    pub fn model_config(
        &self,
        len_fingerprint: usize,
        protein_length: usize,
        feature_width: usize,
    ) -> KcatModelConfig {
        KcatModelConfig {
            len_fingerprint,
            dim: self.dim,
            layer_gnn: self.layer_gnn,
            layer_output: self.layer_output,
            protein_length,
            feature_width,
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            learning_rate: self.learning_rate,
            weight_decay: self.weight_decay,
            lr_milestones: self.lr_milestones.clone(),
            lr_gamma: self.lr_gamma,
            seed: self.seed,
        }
    }

    pub fn output_path(&self, suffix: &str) -> PathBuf {
        Path::new(&self.output_dir).join(format!("{}{}", self.model_name, suffix))
    }
}

/// Flat record of a run's configuration, written once at the start of
/// training and read back to rebuild the model for inference.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RunArgs {
    #[serde(flatten)]
    pub config: KcatTrainConfig,
    pub len_fingerprint: usize,
    pub protein_length: usize,
    pub feature_width: usize,
}

impl RunArgs {
    pub fn model_config(&self) -> KcatModelConfig {
        self.config
            .model_config(self.len_fingerprint, self.protein_length, self.feature_width)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run arguments: {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid run arguments: {:?}", path))
    }
}
