use candle_core::{Result, Tensor};

/// Gates the protein rows by their affinity to the compound vector.
///
/// `compound` is `(1, dim)` and `protein` is `(rows, dim)`. The affinity of
/// each protein row is `tanh(compound . row)`; rows are scaled by their
/// affinity and mean-pooled into a `(1, dim)` vector. With the single-row
/// protein vector produced by the sequence encoder this is a scalar gate on
/// that vector.
pub fn compound_protein_attention(compound: &Tensor, protein: &Tensor) -> Result<Tensor> {
    let (_, compound_dim) = compound.dims2()?;
    let (_, protein_dim) = protein.dims2()?;
    if compound_dim != protein_dim {
        candle_core::bail!(
            "compound vector width {compound_dim} differs from protein vector width {protein_dim}"
        );
    }

    let weights = compound.matmul(&protein.t()?)?.tanh()?;
    let ys = weights.t()?.broadcast_mul(protein)?;
    ys.mean_keepdim(0)
}
