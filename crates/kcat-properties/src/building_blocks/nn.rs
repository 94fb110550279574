use candle_core::{Module, Result, Tensor};
use candle_nn as nn;
use std::ops::Deref;
use std::sync::Arc;

/// Ordered stack of modules applied one after the other, mirroring an
/// `nn.ModuleList` that is iterated in the forward pass.
#[derive(Clone)]
pub struct ModuleList {
    modules: Vec<Arc<dyn Module + Send + Sync>>,
}

impl ModuleList {
    pub fn new() -> Self {
        Self { modules: Vec::new() }
    }

    pub fn push<M: Module + Send + Sync + 'static>(&mut self, module: M) {
        self.modules.push(Arc::new(module));
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleList {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for ModuleList {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut output = xs.clone();
        for module in &self.modules {
            output = module.forward(&output)?;
        }
        Ok(output)
    }
}

impl Deref for ModuleList {
    type Target = Vec<Arc<dyn Module + Send + Sync>>;

    fn deref(&self) -> &Self::Target {
        &self.modules
    }
}

impl std::fmt::Debug for ModuleList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleList")
            .field("len", &self.modules.len())
            .finish()
    }
}

/// Max pooling along the sequence (height) axis only, `(k, 1)` window with
/// stride `(k, 1)`. Expects a `(batch, channels, seq, width)` tensor.
#[derive(Debug, Clone, Copy)]
pub struct SeqMaxPool {
    factor: usize,
}

impl SeqMaxPool {
    pub fn new(factor: usize) -> Self {
        Self { factor }
    }
}

impl Module for SeqMaxPool {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.max_pool2d_with_stride((self.factor, 1), (self.factor, 1))
    }
}

/// 2D convolution with a rectangular `(kernel_h, kernel_w)` kernel, no padding
/// and unit stride. Weights are stored as `{prefix}.weight` / `{prefix}.bias`.
pub fn conv2d_rect(
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    vb: nn::VarBuilder,
) -> Result<nn::Conv2d> {
    let (kernel_h, kernel_w) = kernel;
    let weight = vb.get_with_hints(
        (out_channels, in_channels, kernel_h, kernel_w),
        "weight",
        nn::init::DEFAULT_KAIMING_NORMAL,
    )?;
    let bound = 1. / ((in_channels * kernel_h * kernel_w) as f64).sqrt();
    let bias = vb.get_with_hints(
        out_channels,
        "bias",
        nn::Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    Ok(nn::Conv2d::new(
        weight,
        Some(bias),
        nn::Conv2dConfig::default(),
    ))
}
