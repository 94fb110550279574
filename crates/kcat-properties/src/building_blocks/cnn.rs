use candle_core::{Module, Result, Tensor};
use candle_nn as nn;
use candle_nn::Activation;

use crate::building_blocks::nn::{conv2d_rect, ModuleList, SeqMaxPool};

/// Channels produced by the first convolution; the second doubles it.
pub const NUM_FILTERS: usize = 32;
/// Window, in sequence positions, of both convolutions.
pub const KERNEL_SIZE: usize = 3;
/// Pooling factor applied along the sequence axis after each convolution.
pub const POOL_FACTOR: usize = 2;
/// Hidden widths of the fully connected projection.
pub const FC_HIDDEN: [usize; 2] = [512, 256];

/// Number of features left after the two conv + pool stages for a protein
/// representation of `seq_len` rows, or `None` if the sequence is too short
/// for both stages to produce at least one row.
pub fn flattened_width(seq_len: usize) -> Option<usize> {
    let stage = |len: usize| -> Option<usize> {
        if len < KERNEL_SIZE {
            return None;
        }
        let pooled = (len - KERNEL_SIZE + 1) / POOL_FACTOR;
        (pooled > 0).then_some(pooled)
    };
    let rows = stage(stage(seq_len)?)?;
    Some(rows * NUM_FILTERS * 2)
}

/// CNN + FC encoder turning a `(seq_len, feature_width)` protein
/// representation into a `(1, dim)` protein vector.
#[derive(Debug, Clone)]
pub struct SequenceEncoder {
    conv_layers: ModuleList,
    fc_layers: ModuleList,
    seq_len: usize,
    feature_width: usize,
}

impl SequenceEncoder {
    pub fn new(
        seq_len: usize,
        feature_width: usize,
        dim: usize,
        vb_conv: nn::VarBuilder,
        vb_fc: nn::VarBuilder,
    ) -> Result<Self> {
        let flat = match flattened_width(seq_len) {
            Some(flat) => flat,
            None => candle_core::bail!(
                "protein length {seq_len} is too short for two conv/pool stages"
            ),
        };

        // Indices follow the stacked layer positions so weights line up with
        // exported state dicts: 0 conv, 1 relu, 2 pool, 3 conv, 4 relu, 5 pool.
        let mut conv_layers = ModuleList::new();
        conv_layers.push(conv2d_rect(
            1,
            NUM_FILTERS,
            (KERNEL_SIZE, feature_width),
            vb_conv.pp("0"),
        )?);
        conv_layers.push(Activation::Relu);
        conv_layers.push(SeqMaxPool::new(POOL_FACTOR));
        conv_layers.push(conv2d_rect(
            NUM_FILTERS,
            NUM_FILTERS * 2,
            (KERNEL_SIZE, 1),
            vb_conv.pp("3"),
        )?);
        conv_layers.push(Activation::Relu);
        conv_layers.push(SeqMaxPool::new(POOL_FACTOR));

        let mut fc_layers = ModuleList::new();
        fc_layers.push(nn::linear(flat, FC_HIDDEN[0], vb_fc.pp("0"))?);
        fc_layers.push(Activation::Relu);
        fc_layers.push(nn::linear(FC_HIDDEN[0], FC_HIDDEN[1], vb_fc.pp("2"))?);
        fc_layers.push(Activation::Relu);
        fc_layers.push(nn::linear(FC_HIDDEN[1], dim, vb_fc.pp("4"))?);

        log::debug!(
            "[SequenceEncoder] input ({}, {}) -> {} flattened features -> {}",
            seq_len,
            feature_width,
            flat,
            dim
        );

        Ok(Self {
            conv_layers,
            fc_layers,
            seq_len,
            feature_width,
        })
    }

    /// Expected `(seq_len, feature_width)` of the protein input.
    pub fn input_shape(&self) -> (usize, usize) {
        (self.seq_len, self.feature_width)
    }
}

impl Module for SequenceEncoder {
    fn forward(&self, protein: &Tensor) -> Result<Tensor> {
        let (seq_len, feature_width) = protein.dims2()?;
        if (seq_len, feature_width) != self.input_shape() {
            candle_core::bail!(
                "protein representation has shape ({seq_len}, {feature_width}), expected {:?}",
                self.input_shape()
            );
        }

        let xs = protein.reshape((1, 1, seq_len, feature_width))?;
        let xs = self.conv_layers.forward(&xs)?;
        log::trace!("[SequenceEncoder] conv output shape: {:?}", xs.shape());

        let xs = xs.flatten_all()?.unsqueeze(0)?;
        self.fc_layers.forward(&xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    fn encoder(seq_len: usize, dim: usize, varmap: &VarMap) -> Result<SequenceEncoder> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
        SequenceEncoder::new(seq_len, 26, dim, vb.pp("conv_layers"), vb.pp("fc_layers"))
    }

    #[test]
    fn test_flattened_width_for_full_length_proteins() {
        // Lengths 3714..=3717 all collapse to 927 rows of 64 channels.
        for seq_len in 3714..=3717 {
            assert_eq!(flattened_width(seq_len), Some(59328));
        }
        assert_eq!(flattened_width(3713), Some(64 * 926));
    }

    #[test]
    fn test_flattened_width_too_short() {
        assert_eq!(flattened_width(0), None);
        assert_eq!(flattened_width(2), None);
        assert_eq!(flattened_width(7), None);
        assert_eq!(flattened_width(10), Some(64));
        assert_eq!(flattened_width(16), Some(128));
    }

    #[test]
    fn test_output_is_single_row_of_dim() -> Result<()> {
        let varmap = VarMap::new();
        let cnn = encoder(16, 4, &varmap)?;
        let protein = Tensor::randn(0f32, 1., (16, 26), &Device::Cpu)?;
        let out = cnn.forward(&protein)?;
        assert_eq!(out.dims(), &[1, 4]);
        Ok(())
    }

    #[test]
    fn test_parameter_names_follow_layer_positions() -> Result<()> {
        let varmap = VarMap::new();
        let _cnn = encoder(16, 4, &varmap)?;
        let data = varmap.data().lock().unwrap();
        for name in [
            "conv_layers.0.weight",
            "conv_layers.3.bias",
            "fc_layers.0.weight",
            "fc_layers.2.weight",
            "fc_layers.4.bias",
        ] {
            assert!(data.contains_key(name), "missing {name}");
        }
        assert_eq!(data.get("fc_layers.0.weight").unwrap().dims(), &[512, 128]);
        Ok(())
    }

    #[test]
    fn test_wrong_shape_fails_instead_of_padding() -> Result<()> {
        let varmap = VarMap::new();
        let cnn = encoder(16, 4, &varmap)?;
        let longer = Tensor::randn(0f32, 1., (20, 26), &Device::Cpu)?;
        let narrower = Tensor::randn(0f32, 1., (16, 25), &Device::Cpu)?;
        assert!(cnn.forward(&longer).is_err());
        assert!(cnn.forward(&narrower).is_err());
        Ok(())
    }

    #[test]
    fn test_too_short_configuration_is_rejected() {
        let varmap = VarMap::new();
        assert!(encoder(5, 4, &varmap).is_err());
    }
}
