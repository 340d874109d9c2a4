//! Linear beta noise schedule
//!
//! The forward (noising) process corrupts a clean grid at step `t` as
//!
//! `x_t = sqrt(1 - beta[t]) * x_0 + sqrt(beta[t]) * eps`,  `eps ~ N(0, 1)`
//!
//! where `beta` is linearly interpolated between the configured noise bounds.
//! The noise draw is the only source of randomness; [`add_noise_with`] takes
//! an explicit draw and [`NoiseScheduler::seeded_noise`] makes one
//! reproducible.

use candle_core::{Device, Shape, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::config::{DiffusionConfig, Objective};
use crate::core::error::{DiMarcoError, GridStage, Result};

/// `steps` values linearly spaced from `min_noise` to `max_noise` (both inclusive).
///
/// A single-step schedule is `[min_noise]`.
pub fn linear_betas(min_noise: f64, max_noise: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![min_noise],
        _ => {
            let delta = (max_noise - min_noise) / (steps - 1) as f64;
            (0..steps)
                .map(|i| {
                    if i == steps - 1 {
                        max_noise
                    } else {
                        min_noise + i as f64 * delta
                    }
                })
                .collect()
        }
    }
}

/// Corrupt `x` at step `t` with a fresh standard-normal draw.
pub fn add_noise(x: &Tensor, t: usize, beta: &[f64]) -> Result<Tensor> {
    let noise = x.randn_like(0.0, 1.0)?;
    add_noise_with(x, t, beta, &noise)
}

/// Corrupt `x` at step `t` with the given noise draw.
///
/// Fails with [`DiMarcoError::TimestepOutOfRange`] when `t >= beta.len()`.
pub fn add_noise_with(x: &Tensor, t: usize, beta: &[f64], noise: &Tensor) -> Result<Tensor> {
    let beta_t = *beta.get(t).ok_or(DiMarcoError::TimestepOutOfRange {
        timestep: t,
        steps: beta.len(),
    })?;
    if noise.dims() != x.dims() {
        return Err(DiMarcoError::Shape {
            stage: GridStage::Noising,
            expected: format!("noise of shape {:?}", x.dims()),
            actual: noise.dims().to_vec(),
        });
    }

    let signal = (x * (1.0 - beta_t).sqrt())?;
    let noise = (noise * beta_t.sqrt())?;
    Ok((signal + noise)?)
}

/// Precomputed noise schedule, owned by the model for its lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseScheduler {
    betas: Vec<f64>,
}

impl NoiseScheduler {
    /// Build a linear schedule; bounds must satisfy `0 < min_noise < max_noise < 1`
    /// and the step count must not exceed [`MAX_DIFFUSION_STEPS`](crate::config::MAX_DIFFUSION_STEPS).
    pub fn new(min_noise: f64, max_noise: f64, diffusion_steps: usize) -> Result<Self> {
        Self::from_config(&DiffusionConfig {
            min_noise,
            max_noise,
            diffusion_steps,
            ..Default::default()
        })
    }

    pub fn from_config(config: &DiffusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            betas: linear_betas(config.min_noise, config.max_noise, config.diffusion_steps),
        })
    }

    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    /// Number of diffusion steps
    pub fn len(&self) -> usize {
        self.betas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn beta(&self, t: usize) -> Result<f64> {
        self.betas
            .get(t)
            .copied()
            .ok_or(DiMarcoError::TimestepOutOfRange {
                timestep: t,
                steps: self.betas.len(),
            })
    }

    /// `sqrt(1 - beta[t])`, the weight of the clean grid at step `t`
    pub fn signal_scale(&self, t: usize) -> Result<f64> {
        Ok((1.0 - self.beta(t)?).sqrt())
    }

    /// `sqrt(beta[t])`, the weight of the noise at step `t`
    pub fn noise_scale(&self, t: usize) -> Result<f64> {
        Ok(self.beta(t)?.sqrt())
    }

    /// Schedule as a 1-D F32 tensor
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        let betas: Vec<f32> = self.betas.iter().map(|&b| b as f32).collect();
        let len = betas.len();
        Ok(Tensor::from_vec(betas, len, device)?)
    }

    pub fn add_noise(&self, x: &Tensor, t: usize) -> Result<Tensor> {
        add_noise(x, t, &self.betas)
    }

    pub fn add_noise_with(&self, x: &Tensor, t: usize, noise: &Tensor) -> Result<Tensor> {
        add_noise_with(x, t, &self.betas, noise)
    }

    /// Reproducible standard-normal F32 draw
    pub fn seeded_noise<S: Into<Shape>>(shape: S, seed: u64, device: &Device) -> Result<Tensor> {
        let shape: Shape = shape.into();
        let mut rng = StdRng::seed_from_u64(seed);
        let values: Vec<f32> = (0..shape.elem_count())
            .map(|_| -> f32 { StandardNormal.sample(&mut rng) })
            .collect();
        Ok(Tensor::from_vec(values, shape, device)?)
    }

    /// Tensor the model is trained to predict for `objective`.
    ///
    /// `noise`: the injected noise. `v-space`: `sqrt(1-beta) * noise - sqrt(beta) * x0`.
    pub fn target(&self, x0: &Tensor, noise: &Tensor, t: usize, objective: Objective) -> Result<Tensor> {
        match objective {
            Objective::Noise => Ok(noise.clone()),
            Objective::VSpace => {
                let signal = self.signal_scale(t)?;
                let sigma = self.noise_scale(t)?;
                Ok(((noise * signal)? - (x0 * sigma)?)?)
            }
        }
    }

    /// Estimate of the clean grid from a noisy grid and the model's prediction.
    pub fn predict_clean(
        &self,
        x_t: &Tensor,
        model_output: &Tensor,
        t: usize,
        objective: Objective,
    ) -> Result<Tensor> {
        let signal = self.signal_scale(t)?;
        let sigma = self.noise_scale(t)?;
        let x_t = x_t.to_dtype(model_output.dtype())?;
        match objective {
            Objective::Noise => Ok(((&x_t - (model_output * sigma)?)? / signal)?),
            Objective::VSpace => Ok(((&x_t * signal)? - (model_output * sigma)?)?),
        }
    }
}

impl Default for NoiseScheduler {
    fn default() -> Self {
        let config = DiffusionConfig::default();
        Self {
            betas: linear_betas(config.min_noise, config.max_noise, config.diffusion_steps),
        }
    }
}

/// Largest absolute element-wise difference, for tests
#[cfg(test)]
pub(crate) fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    use candle_core::DType;
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .to_dtype(DType::F32)
        .unwrap()
        .max_all()
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}
