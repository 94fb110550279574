use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn as nn;
use candle_nn::{VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::building_blocks::attention::compound_protein_attention;
use crate::building_blocks::cnn::{flattened_width, SequenceEncoder};
use crate::building_blocks::decoder::InteractionDecoder;
use crate::building_blocks::gnn::GraphEncoder;
use crate::models::model_interface::{
    create_var_map, load_tensors_from_model, EncodedExample, ModelInterface,
};

/// Shape hyperparameters of a [`KcatModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcatModelConfig {
    /// Rows of the fingerprint embedding table (vocabulary size).
    pub len_fingerprint: usize,
    pub dim: usize,
    pub layer_gnn: usize,
    pub layer_output: usize,
    /// Rows of the protein local representation.
    pub protein_length: usize,
    /// Columns of the protein local representation.
    pub feature_width: usize,
}

impl Default for KcatModelConfig {
    fn default() -> Self {
        Self {
            len_fingerprint: 1,
            dim: 20,
            layer_gnn: 3,
            layer_output: 3,
            protein_length: 3714,
            feature_width: 26,
        }
    }
}

impl KcatModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.len_fingerprint == 0 {
            return Err(anyhow!("fingerprint vocabulary is empty"));
        }
        if self.dim == 0 {
            return Err(anyhow!("embedding dimension must be positive"));
        }
        if self.feature_width == 0 {
            return Err(anyhow!("protein feature width must be positive"));
        }
        if flattened_width(self.protein_length).is_none() {
            return Err(anyhow!(
                "protein length {} is too short for the sequence encoder",
                self.protein_length
            ));
        }
        Ok(())
    }
}

/// Graph + sequence fusion model predicting one Kcat value per
/// compound/protein pair.
pub struct KcatModel {
    varmap: VarMap,
    device: Device,
    config: KcatModelConfig,
    embed_fingerprint: nn::Embedding,
    gnn: GraphEncoder,
    sequence_encoder: SequenceEncoder,
    decoder: InteractionDecoder,
}

impl KcatModel {
    /// Builds every layer through a `VarBuilder` over `varmap`. Parameters
    /// already present in the map are reused, missing ones are initialised.
    fn build(varmap: VarMap, config: &KcatModelConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let embedding = vb.pp("embed_fingerprint").get_with_hints(
            (config.len_fingerprint, config.dim),
            "weight",
            nn::Init::Randn {
                mean: 0.,
                stdev: 1.,
            },
        )?;
        let embed_fingerprint = nn::Embedding::new(embedding, config.dim);

        let gnn = GraphEncoder::new(config.dim, config.layer_gnn, vb.pp("W_gnn"))?;
        let sequence_encoder = SequenceEncoder::new(
            config.protein_length,
            config.feature_width,
            config.dim,
            vb.pp("conv_layers"),
            vb.pp("fc_layers"),
        )?;
        let decoder = InteractionDecoder::new(
            config.dim,
            config.layer_output,
            vb.pp("W_out"),
            vb.pp("W_interaction"),
        )?;

        Ok(Self {
            varmap,
            device,
            config: config.clone(),
            embed_fingerprint,
            gnn,
            sequence_encoder,
            decoder,
        })
    }

    fn var_names(&self) -> Result<HashSet<String>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|e| anyhow!("VarMap lock poisoned: {}", e))?;
        Ok(data.keys().cloned().collect())
    }

    pub fn print_summary(&self) {
        log::info!(
            "{} model: vocab {}, dim {}, {} GNN layers, {} output layers, protein ({}, {}), {} parameters",
            self.model_arch(),
            self.config.len_fingerprint,
            self.config.dim,
            self.gnn.depth(),
            self.decoder.depth(),
            self.config.protein_length,
            self.config.feature_width,
            self.param_count()
        );
    }
}

impl ModelInterface for KcatModel {
    fn model_arch(&self) -> &'static str {
        "kcat_gnn_cnn"
    }

    fn new_untrained(config: &KcatModelConfig, device: Device) -> Result<Self> {
        Self::build(VarMap::new(), config, device)
    }

    fn new<P: AsRef<Path>>(model_path: P, config: &KcatModelConfig, device: Device) -> Result<Self> {
        let tensor_data = load_tensors_from_model(model_path.as_ref(), &device)?;
        let loaded: HashSet<String> = tensor_data.iter().map(|(name, _)| name.clone()).collect();

        let mut varmap = VarMap::new();
        create_var_map(&mut varmap, tensor_data, &device)?;
        let model = Self::build(varmap, config, device)?;

        let expected = model.var_names()?;
        let mut missing: Vec<&String> = expected.difference(&loaded).collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(anyhow!(
                "checkpoint {:?} is missing parameters: {:?}",
                model_path.as_ref(),
                missing
            ));
        }
        let mut unused: Vec<&String> = loaded.difference(&expected).collect();
        if !unused.is_empty() {
            unused.sort();
            log::warn!("Ignoring unknown checkpoint tensors: {:?}", unused);
            let mut data = model
                .varmap
                .data()
                .lock()
                .map_err(|e| anyhow!("VarMap lock poisoned: {}", e))?;
            for name in unused {
                data.remove(name);
            }
        }

        Ok(model)
    }

    fn forward(&self, input: &EncodedExample) -> Result<Tensor, candle_core::Error> {
        let atoms = self.embed_fingerprint.forward(&input.fingerprints)?;
        let compound = self.gnn.forward(&atoms, &input.adjacency)?;
        let protein = self.sequence_encoder.forward(&input.protein)?;
        let attended = compound_protein_attention(&compound, &protein)?;
        log::trace!(
            "[KcatModel] compound {:?}, attended protein {:?}",
            compound.shape(),
            attended.shape()
        );

        let fused = Tensor::cat(&[&compound, &attended], 1)?;
        self.decoder.forward(&fused)
    }

    fn config(&self) -> &KcatModelConfig {
        &self.config
    }

    fn get_device(&self) -> &Device {
        &self.device
    }

    fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::data_handling::Example;
    use ndarray::Array2;

    fn small_config() -> KcatModelConfig {
        KcatModelConfig {
            len_fingerprint: 5,
            dim: 4,
            layer_gnn: 1,
            layer_output: 1,
            protein_length: 16,
            feature_width: 26,
        }
    }

    fn example(atoms: usize, protein_length: usize) -> Example {
        Example {
            fingerprints: (0..atoms as u32).map(|i| i % 5).collect(),
            adjacency: Array2::from_shape_fn((atoms, atoms), |(i, j)| {
                if i.abs_diff(j) == 1 {
                    1.0
                } else {
                    0.0
                }
            }),
            protein: Array2::from_shape_fn((protein_length, 26), |(i, j)| {
                ((i * 26 + j) % 7) as f32 / 7.0
            }),
            kcat: 1.5,
        }
    }

    #[test]
    fn test_parameter_names_follow_state_dict() {
        let model = KcatModel::new_untrained(&small_config(), Device::Cpu).unwrap();
        let names = model.var_names().unwrap();
        for name in [
            "embed_fingerprint.weight",
            "W_gnn.0.weight",
            "W_gnn.0.bias",
            "conv_layers.0.weight",
            "conv_layers.3.bias",
            "fc_layers.0.weight",
            "fc_layers.2.weight",
            "fc_layers.4.bias",
            "W_out.0.weight",
            "W_interaction.weight",
            "W_interaction.bias",
        ] {
            assert!(names.contains(name), "missing {}", name);
        }
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn test_forward_yields_single_scalar() {
        let model = KcatModel::new_untrained(&small_config(), Device::Cpu).unwrap();
        for atoms in [1usize, 3, 7] {
            let input = model.encode_example(&example(atoms, 16)).unwrap();
            let output = model.forward(&input).unwrap();
            assert_eq!(output.dims(), &[1, 1]);
        }
        let prediction = model.predict_example(&example(3, 16)).unwrap();
        assert!(prediction.is_finite());
    }

    #[test]
    fn test_wrong_protein_shape_is_rejected() {
        let model = KcatModel::new_untrained(&small_config(), Device::Cpu).unwrap();
        let input = model.encode_example(&example(3, 17)).unwrap();
        assert!(model.forward(&input).is_err());
    }

    #[test]
    fn test_fingerprint_outside_vocabulary_is_rejected() {
        let model = KcatModel::new_untrained(&small_config(), Device::Cpu).unwrap();
        let mut bad = example(3, 16);
        bad.fingerprints[1] = 5;
        assert!(model.encode_example(&bad).is_err());
    }

    #[test]
    fn test_too_short_protein_length_is_rejected() {
        let config = KcatModelConfig {
            protein_length: 5,
            ..small_config()
        };
        assert!(KcatModel::new_untrained(&config, Device::Cpu).is_err());
    }

    #[test]
    fn test_param_count_matches_layer_shapes() {
        let config = small_config();
        let model = KcatModel::new_untrained(&config, Device::Cpu).unwrap();
        // protein_length 16 -> 7 rows after stage one, 2 after stage two.
        let flat = 64 * 2;
        let expected = 5 * 4
            + (4 * 4 + 4)
            + (32 * 3 * 26 + 32)
            + (64 * 32 * 3 + 64)
            + (flat * 512 + 512)
            + (512 * 256 + 256)
            + (256 * 4 + 4)
            + (8 * 8 + 8)
            + (8 + 1);
        assert_eq!(model.param_count(), expected);
    }
}
