use candle_core::{Module, Result, Tensor};
use candle_nn as nn;

/// Regression head over the concatenated compound/protein vector.
#[derive(Debug, Clone)]
pub struct InteractionDecoder {
    hidden: Vec<nn::Linear>,
    interaction: nn::Linear,
}

impl InteractionDecoder {
    /// `depth` layers `Linear(2*dim, 2*dim)` under `vb_hidden.{j}` followed by
    /// the scalar projection under `vb_interaction`.
    pub fn new(
        dim: usize,
        depth: usize,
        vb_hidden: nn::VarBuilder,
        vb_interaction: nn::VarBuilder,
    ) -> Result<Self> {
        let width = 2 * dim;
        let hidden = (0..depth)
            .map(|j| nn::linear(width, width, vb_hidden.pp(j.to_string())))
            .collect::<Result<Vec<_>>>()?;
        let interaction = nn::linear(width, 1, vb_interaction)?;
        Ok(Self {
            hidden,
            interaction,
        })
    }

    pub fn depth(&self) -> usize {
        self.hidden.len()
    }
}

impl Module for InteractionDecoder {
    /// `(1, 2*dim)` in, `(1, 1)` out; no activation on the output.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.hidden {
            xs = layer.forward(&xs)?.relu()?;
        }
        self.interaction.forward(&xs)
    }
}
