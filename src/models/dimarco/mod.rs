//! DiMARCo: diffusion model for ARC-style grids
//!
//! Pure Rust implementation on top of Candle.
//!
//! - `scheduler`: linear beta schedule and the noising formula
//! - `tier`: size tiers and the routing table
//! - `blocks`: encoder/decoder stages and [`GridConvBlock`]
//! - `unet`: the size-routed denoiser

pub mod blocks;
pub mod scheduler;
pub mod tier;
pub mod unet;
#[cfg(test)]
mod tests;

pub use blocks::{DecoderStage, EncoderStage, GridConvBlock};
pub use scheduler::{add_noise, add_noise_with, linear_betas, NoiseScheduler};
pub use tier::GridTier;
pub use unet::{bridge_channels, DiffusionGridDenoiser, DECODER_CHANNELS, ENCODER_CHANNELS};
