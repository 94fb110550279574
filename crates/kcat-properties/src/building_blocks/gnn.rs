use candle_core::{Module, Result, Tensor};
use candle_nn as nn;

/// Residual graph convolution over a molecular graph.
///
/// Every layer owns its own `Linear(dim, dim)`. One layer updates the atom
/// matrix as `X <- X + A . relu(X W_i + b_i)`; after the last layer the atoms
/// are mean-pooled into a single `(1, dim)` compound vector.
#[derive(Debug, Clone)]
pub struct GraphEncoder {
    layers: Vec<nn::Linear>,
    dim: usize,
}

impl GraphEncoder {
    /// Creates `depth` layers stored as `{prefix}.{i}.weight` / `{prefix}.{i}.bias`.
    pub fn new(dim: usize, depth: usize, vb: nn::VarBuilder) -> Result<Self> {
        let layers = (0..depth)
            .map(|i| nn::linear(dim, dim, vb.pp(i.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers, dim })
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// `atoms` is `(num_atoms, dim)`, `adjacency` is `(num_atoms, num_atoms)`.
    pub fn forward(&self, atoms: &Tensor, adjacency: &Tensor) -> Result<Tensor> {
        let (num_atoms, dim) = atoms.dims2()?;
        let (rows, cols) = adjacency.dims2()?;
        if dim != self.dim {
            candle_core::bail!(
                "GraphEncoder expects atom vectors of width {}, got {}",
                self.dim,
                dim
            );
        }
        if rows != num_atoms || cols != num_atoms {
            candle_core::bail!(
                "adjacency of shape ({rows}, {cols}) does not match {num_atoms} atoms"
            );
        }

        let mut xs = atoms.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let hs = layer.forward(&xs)?.relu()?;
            xs = (&xs + adjacency.matmul(&hs)?)?;
            log::trace!("[GraphEncoder] layer {} output shape: {:?}", i, xs.shape());
        }
        xs.mean_keepdim(0)
    }
}
