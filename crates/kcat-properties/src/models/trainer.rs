use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::model_interface::ModelInterface;
use crate::utils::data_handling::Example;
use crate::utils::logging::Progress;
use crate::utils::stats::EpochSummary;
use crate::utils::utils::{LRScheduler, MultiStepLR};

/// Optimisation hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub lr_milestones: Vec<usize>,
    pub lr_gamma: f64,
    /// Seed of the per-epoch shuffle; drawn from entropy when unset.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            weight_decay: 1e-6,
            lr_milestones: vec![35, 70],
            lr_gamma: 0.1,
            seed: None,
        }
    }
}

/// Squared error of one prediction, returned as a scalar tensor.
fn example_loss<M: ModelInterface>(model: &M, example: &Example) -> Result<(Tensor, f32)> {
    let input = model.encode_example(example)?;
    let predicted = model.forward(&input)?;
    let target = Tensor::new(&[[example.kcat]], model.get_device())?;
    let loss = candle_nn::loss::mse(&predicted, &target)?;
    let value = predicted.detach().flatten_all()?.get(0)?.to_scalar::<f32>()?;
    Ok((loss, value))
}

/// Per-example gradient descent over a model's parameters with a
/// milestone learning-rate schedule.
///
/// Weight decay is decoupled (AdamW): it shrinks the weights directly
/// instead of being added to the gradient as an L2 term, as Adam with
/// `weight_decay` does. Runs therefore do not reproduce Adam+L2 losses
/// step for step.
pub struct Trainer {
    optimizer: AdamW,
    scheduler: MultiStepLR,
    rng: StdRng,
}

impl Trainer {
    pub fn new<M: ModelInterface>(model: &M, config: &TrainerConfig) -> Result<Self> {
        let params = ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: config.weight_decay,
            ..Default::default()
        };
        let optimizer = AdamW::new(model.get_varmap().all_vars(), params)?;
        let scheduler = MultiStepLR::new(config.learning_rate, &config.lr_milestones, config.lr_gamma);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "Optimizer AdamW (lr {}, weight decay {}), lr milestones {:?} x{}",
            config.learning_rate, config.weight_decay, config.lr_milestones, config.lr_gamma
        );

        Ok(Self {
            optimizer,
            scheduler,
            rng,
        })
    }

    pub fn learning_rate(&self) -> f64 {
        self.scheduler.get_last_lr()
    }

    /// Runs one epoch over `dataset` in a fresh random order, one optimizer
    /// step per example, then advances the schedule. Returns the epoch
    /// summary and the learning rate for the next epoch.
    pub fn train<M: ModelInterface>(
        &mut self,
        model: &M,
        dataset: &[Example],
    ) -> Result<(EpochSummary, f64)> {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut self.rng);

        let progress = Progress::new(dataset.len(), "[train] Examples: ");
        let mut loss_total = 0f64;
        let mut non_finite = 0usize;
        let mut observed = Vec::with_capacity(dataset.len());
        let mut predicted = Vec::with_capacity(dataset.len());

        for &i in &order {
            let example = &dataset[i];
            let (loss, value) = example_loss(model, example)?;
            self.optimizer.backward_step(&loss)?;

            let loss_value = loss.to_scalar::<f32>()?;
            if !loss_value.is_finite() {
                non_finite += 1;
            }
            loss_total += loss_value as f64;
            observed.push(example.kcat);
            predicted.push(value);
            progress.inc();
        }
        progress.finish();

        self.scheduler.step();
        let lr = self.scheduler.get_last_lr();
        self.optimizer.set_learning_rate(lr);

        if non_finite > 0 {
            warn!(
                "{} of {} training losses were not finite this epoch",
                non_finite,
                dataset.len()
            );
        }

        let summary = EpochSummary::from_predictions(loss_total, &predicted, &observed, non_finite);
        Ok((summary, lr))
    }
}

/// Scores a model without updating it. Examples are visited in order.
pub struct Tester;

impl Tester {
    pub fn test<M: ModelInterface>(model: &M, dataset: &[Example]) -> Result<EpochSummary> {
        let progress = Progress::new(dataset.len(), "[test] Examples: ");
        let mut loss_total = 0f64;
        let mut non_finite = 0usize;
        let mut observed = Vec::with_capacity(dataset.len());
        let mut predicted = Vec::with_capacity(dataset.len());

        for example in dataset {
            let (loss, value) = example_loss(model, example)?;
            let loss_value = loss.detach().to_scalar::<f32>()?;
            if !loss_value.is_finite() {
                non_finite += 1;
            }
            loss_total += loss_value as f64;
            observed.push(example.kcat);
            predicted.push(value);
            progress.inc();
        }
        progress.finish();

        if non_finite > 0 {
            warn!(
                "{} of {} evaluation losses were not finite",
                non_finite,
                dataset.len()
            );
        }

        Ok(EpochSummary::from_predictions(
            loss_total,
            &predicted,
            &observed,
            non_finite,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::kcat_model::{KcatModel, KcatModelConfig};
    use candle_core::Device;
    use ndarray::Array2;

    fn model() -> KcatModel {
        let config = KcatModelConfig {
            len_fingerprint: 5,
            dim: 4,
            layer_gnn: 1,
            layer_output: 1,
            protein_length: 16,
            feature_width: 26,
        };
        KcatModel::new_untrained(&config, Device::Cpu).unwrap()
    }

    fn constant_dataset(n: usize, kcat: f32) -> Vec<Example> {
        (0..n)
            .map(|k| Example {
                fingerprints: vec![(k % 5) as u32, ((k + 1) % 5) as u32, 2],
                adjacency: Array2::from_shape_fn((3, 3), |(i, j)| if i != j { 1.0 } else { 0.0 }),
                protein: Array2::from_shape_fn((16, 26), |(i, j)| ((i + j + k) % 5) as f32 / 10.0),
                kcat,
            })
            .collect()
    }

    #[test]
    fn test_loss_decreases_on_constant_target() {
        let model = model();
        let dataset = constant_dataset(8, 2.0);
        let config = TrainerConfig {
            learning_rate: 1e-3,
            seed: Some(7),
            ..Default::default()
        };
        let mut trainer = Trainer::new(&model, &config).unwrap();

        let before = Tester::test(&model, &dataset).unwrap();
        for _ in 0..10 {
            trainer.train(&model, &dataset).unwrap();
        }
        let after = Tester::test(&model, &dataset).unwrap();

        assert!(after.loss.is_finite());
        assert!(
            after.loss < before.loss,
            "loss did not decrease: {} -> {}",
            before.loss,
            after.loss
        );
    }

    #[test]
    fn test_tester_does_not_update_parameters() {
        let model = model();
        let dataset = constant_dataset(4, 1.0);
        let first = Tester::test(&model, &dataset).unwrap();
        let second = Tester::test(&model, &dataset).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.non_finite_losses, 0);
    }

    #[test]
    fn test_learning_rate_follows_milestones() {
        let model = model();
        let dataset = constant_dataset(2, 1.0);
        let config = TrainerConfig {
            learning_rate: 1e-2,
            lr_milestones: vec![1, 2],
            seed: Some(1),
            ..Default::default()
        };
        let mut trainer = Trainer::new(&model, &config).unwrap();
        assert_eq!(trainer.learning_rate(), 1e-2);

        let (_, lr) = trainer.train(&model, &dataset).unwrap();
        assert!((lr - 1e-3).abs() < 1e-15);
        let (_, lr) = trainer.train(&model, &dataset).unwrap();
        assert!((lr - 1e-4).abs() < 1e-15);
        let (_, lr) = trainer.train(&model, &dataset).unwrap();
        assert!((lr - 1e-4).abs() < 1e-15);
    }
}
