use anyhow::{anyhow, Result};
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;

/// Converts a device string to a Candle `Device`.
///
/// # Supported Device Strings
///
/// - `"cpu"`: the CPU device
/// - `"cuda"`: the first CUDA device
/// - `"cuda:N"`: the CUDA device with index `N`
/// - `"auto"`: the best available accelerator, falling back to the CPU
///
/// # Errors
///
/// Returns an error if a requested CUDA device is not available, or if the
/// string names an unsupported device type.
pub fn get_device(device_str: &str) -> Result<Device> {
    if device_str.starts_with("cuda") {
        let cuda_index = if device_str == "cuda" {
            0
        } else {
            device_str
                .split(':')
                .nth(1)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| anyhow!("Invalid CUDA device string: {}", device_str))?
        };

        let device = Device::cuda_if_available(cuda_index)?;
        if !device.is_cuda() {
            return Err(anyhow!("CUDA device {} is not available", cuda_index));
        }
        Ok(device)
    } else {
        match device_str {
            "cpu" => Ok(Device::Cpu),
            "auto" => device(false),
            _ => Err(anyhow!("Unsupported device type: {}", device_str)),
        }
    }
}

/// Returns the best available device, or the CPU when `cpu` is set.
pub fn device(cpu: bool) -> Result<Device> {
    if cpu {
        Ok(Device::Cpu)
    } else if cuda_is_available() {
        Ok(Device::new_cuda(0)?)
    } else if metal_is_available() {
        Ok(Device::new_metal(0)?)
    } else {
        log::info!("No accelerator available, running on CPU");
        Ok(Device::Cpu)
    }
}

pub trait LRScheduler {
    /// Advances the schedule by one epoch.
    fn step(&mut self);

    /// Learning rate for the current epoch.
    fn get_last_lr(&self) -> f64;
}

/// Step decay: the rate is multiplied by `gamma` once for every milestone
/// the epoch counter has reached.
#[derive(Debug, Clone)]
pub struct MultiStepLR {
    base_lr: f64,
    milestones: Vec<usize>,
    gamma: f64,
    last_epoch: usize,
}

impl MultiStepLR {
    pub fn new(base_lr: f64, milestones: &[usize], gamma: f64) -> Self {
        let mut milestones = milestones.to_vec();
        milestones.sort_unstable();
        Self {
            base_lr,
            milestones,
            gamma,
            last_epoch: 0,
        }
    }
}

impl LRScheduler for MultiStepLR {
    fn step(&mut self) {
        self.last_epoch += 1;
    }

    fn get_last_lr(&self) -> f64 {
        let reached = self
            .milestones
            .iter()
            .filter(|&&m| m <= self.last_epoch)
            .count();
        self.base_lr * self.gamma.powi(reached as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_device_cpu() {
        let device = get_device("cpu").unwrap();
        assert!(device.is_cpu());
        assert!(get_device("auto").is_ok());
    }

    #[test]
    fn test_get_device_rejects_unknown() {
        assert!(get_device("tpu").is_err());
        assert!(get_device("cuda:x").is_err());
    }

    #[test]
    fn test_multistep_decays_at_milestones() {
        let mut sched = MultiStepLR::new(1.0, &[2, 4], 0.5);
        let mut rates = vec![sched.get_last_lr()];
        for _ in 0..5 {
            sched.step();
            rates.push(sched.get_last_lr());
        }
        assert_eq!(rates, vec![1.0, 1.0, 0.5, 0.5, 0.25, 0.25]);
    }
}
