//! Model configuration types for the DiMARCo denoiser
//!
//! Mirrors the constructor arguments of the model: training objective,
//! number of diffusion steps and the noise bounds of the linear schedule.
//! Configurations can be built in code or read from a YAML file; missing
//! fields fall back to the defaults below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::error::DiMarcoError;

/// Numerical epsilon the default noise bounds are derived from
pub const EPS: f64 = 1e-8;

/// Upper bound on `diffusion_steps`
pub const MAX_DIFFUSION_STEPS: usize = 100_000;

/// Training target convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Objective {
    /// Predict the velocity `sqrt(1-beta) * noise - sqrt(beta) * x0`
    #[default]
    #[serde(rename = "v-space")]
    VSpace,
    /// Predict the raw injected noise
    #[serde(rename = "noise")]
    Noise,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::VSpace => "v-space",
            Objective::Noise => "noise",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Objective {
    type Err = DiMarcoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v-space" | "vspace" | "v" => Ok(Objective::VSpace),
            "noise" | "epsilon" => Ok(Objective::Noise),
            other => Err(DiMarcoError::config(format!(
                "unknown objective '{other}', expected 'v-space' or 'noise'"
            ))),
        }
    }
}

/// Root configuration of the denoiser
///
/// Immutable once handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    /// Training target convention
    pub objective: Objective,

    /// Number of discrete diffusion steps
    pub diffusion_steps: usize,

    /// Noise variance at step 0
    pub min_noise: f64,

    /// Noise variance at the last step
    pub max_noise: f64,

    /// Use PReLU (true) or SiLU (false) after the per-tier bridge convolutions
    pub learnable_bridge_activation: bool,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            objective: Objective::VSpace,
            diffusion_steps: 10,
            min_noise: EPS.sqrt(),
            max_noise: EPS.sqrt().sqrt(),
            learnable_bridge_activation: true,
        }
    }
}

impl DiffusionConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config
            .validate()
            .map_err(|e| e.with_path(path.as_ref()))
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).with_context(|| "Failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the noise schedule relies on
    pub fn validate(&self) -> crate::Result<()> {
        if self.diffusion_steps == 0 {
            return Err(DiMarcoError::config("diffusion_steps must be positive"));
        }
        if self.diffusion_steps > MAX_DIFFUSION_STEPS {
            return Err(DiMarcoError::config(format!(
                "diffusion_steps must be at most {MAX_DIFFUSION_STEPS}, got {}",
                self.diffusion_steps
            )));
        }
        for (name, value) in [("min_noise", self.min_noise), ("max_noise", self.max_noise)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(DiMarcoError::config(format!(
                    "{name} must lie in (0, 1), got {value}"
                )));
            }
        }
        if self.min_noise >= self.max_noise {
            return Err(DiMarcoError::config(format!(
                "min_noise ({}) must be below max_noise ({})",
                self.min_noise, self.max_noise
            )));
        }
        Ok(())
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_steps(mut self, diffusion_steps: usize) -> Self {
        self.diffusion_steps = diffusion_steps;
        self
    }
}
