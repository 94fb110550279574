use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KcatInferenceConfig {
    pub version: String,
    pub data_dir: String,
    /// Run arguments written by the training run that produced the model.
    pub args_file: String,
    pub model_path: String,
    pub output_file: String,
    pub device: String,
}

impl Default for KcatInferenceConfig {
    fn default() -> Self {
        KcatInferenceConfig {
            version: clap::crate_version!().to_string(),
            data_dir: String::from("data"),
            args_file: String::from("output/Kcat-args.json"),
            model_path: String::from("output/Kcat.safetensors"),
            output_file: String::from("kcat_predictions.csv"),
            device: String::from("auto"),
        }
    }
}

impl KcatInferenceConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Config file is not valid JSON: {:?}", config_path))?;
        let mut config = KcatInferenceConfig::default();

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
        load_or_default!(args_file);
        load_or_default!(model_path);
        load_or_default!(output_file);
        load_or_default!(device);

        // Apply CLI overrides
        if let Some(model_path) = matches.get_one::<String>("model_path") {
            config.model_path = model_path.clone();
        }
        if let Some(data_dir) = matches.get_one::<String>("data_dir") {
            config.data_dir = data_dir.clone();
        }
        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = output_file.clone();
        }
        if let Some(device) = matches.get_one::<String>("device") {
            config.device = device.clone();
        }

        Ok(config)
    }
}
