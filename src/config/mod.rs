//! Configuration for the denoiser and its noise schedule

mod model_config;

pub use model_config::{DiffusionConfig, Objective, EPS, MAX_DIFFUSION_STEPS};
