//! Neural network models
//!
//! - DiMARCo size-routed diffusion U-Net for puzzle grids

pub mod dimarco;

pub use dimarco::{DiffusionGridDenoiser, GridConvBlock, GridTier, NoiseScheduler};
