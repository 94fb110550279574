use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::VarMap;
use log::info;
use ndarray::Array2;
use std::path::Path;

use crate::models::kcat_model::KcatModelConfig;
use crate::utils::data_handling::Example;
use crate::utils::logging::Progress;

/// Device-resident tensors for one example.
#[derive(Debug, Clone)]
pub struct EncodedExample {
    /// `(num_atoms,)` u32 fingerprint indices.
    pub fingerprints: Tensor,
    /// `(num_atoms, num_atoms)`.
    pub adjacency: Tensor,
    /// `(protein_length, feature_width)`.
    pub protein: Tensor,
}

/// Loads the named tensors of a checkpoint. `.safetensors` files are read
/// natively; `.pth` / `.pt` files are read as pickled PyTorch state dicts.
pub fn load_tensors_from_model(model_path: &Path, device: &Device) -> Result<Vec<(String, Tensor)>> {
    let extension = model_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    let tensors = match extension {
        "safetensors" => candle_core::safetensors::load(model_path, device)
            .with_context(|| format!("Failed to read safetensors checkpoint: {:?}", model_path))?
            .into_iter()
            .collect::<Vec<_>>(),
        "pth" | "pt" => candle_core::pickle::read_all(model_path)
            .with_context(|| format!("Failed to read PyTorch checkpoint: {:?}", model_path))?,
        other => {
            return Err(anyhow!(
                "Unsupported checkpoint format '{}' for {:?}, expected .safetensors or .pth",
                other,
                model_path
            ))
        }
    };

    log::debug!("Loaded {} tensors from {:?}", tensors.len(), model_path);
    Ok(tensors)
}

/// Populates `var_map` with the given tensors as f32 variables on `device`.
pub fn create_var_map(
    var_map: &mut VarMap,
    tensor_data: Vec<(String, Tensor)>,
    device: &Device,
) -> Result<()> {
    let mut ws = var_map
        .data()
        .lock()
        .map_err(|e| anyhow!("VarMap lock poisoned: {}", e))?;

    for (name, tensor) in tensor_data {
        let tensor = tensor.to_dtype(DType::F32)?.to_device(device)?;
        ws.insert(name, Var::from_tensor(&tensor)?);
    }

    Ok(())
}

/// Copies a host matrix into a device tensor of the same shape.
pub fn array_to_tensor(array: &Array2<f32>, device: &Device) -> Result<Tensor> {
    let shape = array.dim();
    let tensor = Tensor::from_iter(array.iter().copied(), device)?.reshape(shape)?;
    Ok(tensor)
}

pub trait ModelInterface: Send + Sync {
    fn model_arch(&self) -> &'static str;

    /// Builds a freshly initialised model.
    fn new_untrained(config: &KcatModelConfig, device: Device) -> Result<Self>
    where
        Self: Sized;

    /// Builds a model from a checkpoint. Every parameter the architecture
    /// needs must be present in the checkpoint.
    fn new<P: AsRef<Path>>(model_path: P, config: &KcatModelConfig, device: Device) -> Result<Self>
    where
        Self: Sized;

    /// One scalar prediction of shape `(1, 1)`.
    fn forward(&self, input: &EncodedExample) -> Result<Tensor, candle_core::Error>;

    fn config(&self) -> &KcatModelConfig;

    fn get_device(&self) -> &Device;

    fn get_varmap(&self) -> &VarMap;

    /// Moves an example's host arrays onto the model device.
    fn encode_example(&self, example: &Example) -> Result<EncodedExample> {
        let config = self.config();
        if let Some(&index) = example
            .fingerprints
            .iter()
            .find(|&&i| i as usize >= config.len_fingerprint)
        {
            return Err(anyhow!(
                "fingerprint index {} is outside the embedding table of {} rows",
                index,
                config.len_fingerprint
            ));
        }

        let device = self.get_device();
        let fingerprints = Tensor::from_slice(
            &example.fingerprints,
            example.fingerprints.len(),
            device,
        )?;
        let adjacency = array_to_tensor(&example.adjacency, device)?;
        let protein = array_to_tensor(&example.protein, device)?;

        Ok(EncodedExample {
            fingerprints,
            adjacency,
            protein,
        })
    }

    /// Predicts one example without tracking gradients.
    fn predict_example(&self, example: &Example) -> Result<f32> {
        let input = self.encode_example(example)?;
        let output = self.forward(&input)?.detach();
        let value = output.flatten_all()?.get(0)?.to_scalar::<f32>()?;
        Ok(value)
    }

    /// Predicts every example in order.
    fn predict(&self, examples: &[Example]) -> Result<Vec<f32>> {
        let progress = Progress::new(examples.len(), "[predict] Examples: ");
        let mut predictions = Vec::with_capacity(examples.len());
        for example in examples {
            predictions.push(self.predict_example(example)?);
            progress.inc();
        }
        progress.finish();
        Ok(predictions)
    }

    /// Number of trainable scalars.
    fn param_count(&self) -> usize {
        self.get_varmap()
            .all_vars()
            .iter()
            .map(|var| var.elem_count())
            .sum()
    }

    /// Save model weights to a file in safetensors format.
    fn save(&self, path: &Path) -> Result<()> {
        info!(
            "Saving {} model weights to: {:?}",
            self.model_arch(),
            path
        );
        self.get_varmap()
            .save(path)
            .with_context(|| format!("Failed to write checkpoint: {:?}", path))?;
        Ok(())
    }
}
