use anyhow::{Context, Result};
use kcat_properties::models::kcat_model::KcatModel;
use kcat_properties::models::model_interface::ModelInterface;
use kcat_properties::utils::utils::get_device;
use std::path::Path;

use crate::kcat::inference::input::KcatInferenceConfig;
use crate::kcat::inference::output::{write_predictions, KcatPrediction};
use crate::kcat::load_data::load_dataset;
use crate::kcat::train::input::RunArgs;
use crate::kcat::util::validate_data_dir;

pub fn run_inference(config: &KcatInferenceConfig) -> Result<Vec<KcatPrediction>> {
    let data_dir = Path::new(&config.data_dir);
    validate_data_dir(data_dir)?;

    let args = RunArgs::load(Path::new(&config.args_file))?;
    let model_config = args.model_config();
    let device = get_device(&config.device)?;
    log::info!("Using device: {:?}", device);

    let dataset = load_dataset(data_dir, false).context("Failed to load inference data")?;
    if let Some(shape) = dataset.protein_shape() {
        let expected = (model_config.protein_length, model_config.feature_width);
        if shape != expected {
            anyhow::bail!(
                "Protein representations have shape {:?} but the model expects {:?}",
                shape,
                expected
            );
        }
    }
    log::info!("Loaded {} examples", dataset.len());

    let model = KcatModel::new(&config.model_path, &model_config, device)
        .with_context(|| format!("Failed to load model: {}", config.model_path))?;
    model.print_summary();

    let examples = dataset.into_examples();
    let start_time = std::time::Instant::now();
    let predicted = model.predict(&examples)?;
    log::info!(
        "Predicted {} examples in {:?}",
        predicted.len(),
        start_time.elapsed()
    );

    let predictions: Vec<KcatPrediction> = examples
        .iter()
        .zip(predicted)
        .enumerate()
        .map(|(index, (example, predicted))| KcatPrediction {
            index,
            predicted,
            observed: example.kcat,
        })
        .collect();

    write_predictions(&predictions, &config.output_file)?;
    log::info!("Predictions written to: {}", config.output_file);

    Ok(predictions)
}
