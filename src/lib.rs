//! # DiMARCo - Diffusion Model for ARC grids
//!
//! A size-routed U-Net denoiser for square, single-channel puzzle grids,
//! together with the linear noise schedule used to corrupt grids during
//! training. Built on Candle.
//!
//! ## Features
//!
//! - **Size-tiered depth**: grids are routed through 1 to 4 encoder stages
//!   depending on their side length, so tiny grids are not over-smoothed
//! - **Per-tier bridges**: 1x1 convolutions join shortened encoder paths to
//!   the decoder suffix
//! - **Linear beta schedule**: `x_t = sqrt(1 - beta[t]) * x + sqrt(beta[t]) * noise`
//! - **Two objectives**: velocity (`v-space`) or raw noise prediction
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use candle_core::Device;
//! use dimarco::{DiffusionConfig, DiffusionGridDenoiser};
//!
//! let device = Device::Cpu;
//! let (model, _varmap) = DiffusionGridDenoiser::with_random_weights(DiffusionConfig::default(), &device)?;
//!
//! let grid = model.blank_grid(1, 32)?;
//! let noisy = model.add_noise(&grid, 3)?;
//! let prediction = model.forward(&noisy)?;
//! assert_eq!(prediction.dims(), &[1, 1, 32, 32]);
//! ```
//!
//! ## Routing
//!
//! | Grid size      | Tier   | Encoder stages | Decoder stages |
//! |----------------|--------|----------------|----------------|
//! | size > 24      | large  | 1-4            | 1-4            |
//! | 11 < size ≤ 24 | medium | 1-3            | 2-4            |
//! | 6 < size ≤ 11  | small  | 1-2            | 3-4            |
//! | size ≤ 6       | tiny   | 1              | 4              |

pub mod config;
pub mod core;
pub mod models;

pub use config::{DiffusionConfig, Objective, EPS, MAX_DIFFUSION_STEPS};
pub use crate::core::error::{DiMarcoError, GridStage, Result, ResultExt};
pub use models::dimarco::{
    add_noise, add_noise_with, linear_betas, DiffusionGridDenoiser, GridConvBlock, GridTier,
    NoiseScheduler,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework name
pub const FRAMEWORK_NAME: &str = "DiMARCo";
