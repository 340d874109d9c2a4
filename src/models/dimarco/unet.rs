//! Size-routed U-Net denoiser
//!
//! Architecture:
//! - Encoder: four stages, each two 3x3 convolutions + ReLU
//!   (1 -> 16 -> 32, 32 -> 32 -> 64, 64 -> 64 -> 128, 128 -> 128 -> 128)
//! - Decoder: four 3x3 transpose convolutions (128 -> 64 -> 32 -> 16 -> 1)
//! - Bridges: per-tier 1x1 [`GridConvBlock`]s joining a shortened encoder
//!   prefix to the decoder suffix (128 -> 64, 64 -> 32, 32 -> 16)
//!
//! Spatial size is preserved end to end, so the output has the shape of the
//! input: `[batch, 1, size, size]`.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{VarBuilder, VarMap};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::blocks::{DecoderStage, EncoderStage, GridConvBlock};
use super::scheduler::NoiseScheduler;
use super::tier::{GridTier, NUM_STAGES};
use crate::config::{DiffusionConfig, Objective};
use crate::core::error::{DiMarcoError, GridStage, Result, ResultExt};

/// (in, mid, out) channels of `stage1..stage4`
pub const ENCODER_CHANNELS: [(usize, usize, usize); NUM_STAGES] =
    [(1, 16, 32), (32, 32, 64), (64, 64, 128), (128, 128, 128)];

/// (in, out) channels of `decoder1..decoder4`
pub const DECODER_CHANNELS: [(usize, usize); NUM_STAGES] = [(128, 64), (64, 32), (32, 16), (16, 1)];

/// Channel widths a tier's bridge has to join, `None` when they already agree
pub fn bridge_channels(tier: GridTier) -> Option<(usize, usize)> {
    let encoder_out = ENCODER_CHANNELS[tier.encoder_depth() - 1].2;
    let decoder_in = DECODER_CHANNELS[tier.decoder_stages().start].0;
    (encoder_out != decoder_in).then_some((encoder_out, decoder_in))
}

/// Diffusion U-Net for square single-channel grids
#[derive(Debug, Clone)]
pub struct DiffusionGridDenoiser {
    stages: Vec<EncoderStage>,
    decoders: Vec<DecoderStage>,
    bridges: HashMap<GridTier, GridConvBlock>,
    scheduler: NoiseScheduler,
    config: DiffusionConfig,
    device: Device,
}

impl DiffusionGridDenoiser {
    /// Build every layer from `vb`.
    ///
    /// Parameter names: `stage{n}.0.*`, `stage{n}.2.*`, `decoder{n}.*`,
    /// `bridge.{tier}.conv.*` and `bridge.{tier}.act.weight`.
    pub fn new(config: DiffusionConfig, vb: VarBuilder) -> Result<Self> {
        let scheduler = NoiseScheduler::from_config(&config)?;
        let device = vb.device().clone();

        let mut stages = Vec::with_capacity(NUM_STAGES);
        for (i, &(cin, cmid, cout)) in ENCODER_CHANNELS.iter().enumerate() {
            stages.push(EncoderStage::new(cin, cmid, cout, vb.pp(format!("stage{}", i + 1)))?);
        }

        let mut decoders = Vec::with_capacity(NUM_STAGES);
        for (i, &(cin, cout)) in DECODER_CHANNELS.iter().enumerate() {
            decoders.push(DecoderStage::new(cin, cout, vb.pp(format!("decoder{}", i + 1)))?);
        }

        let mut bridges = HashMap::new();
        let bridge_vb = vb.pp("bridge");
        for tier in GridTier::ALL {
            if let Some((cin, cout)) = bridge_channels(tier) {
                let block = GridConvBlock::projection(
                    cin,
                    cout,
                    config.learnable_bridge_activation,
                    bridge_vb.pp(tier.name()),
                )?;
                bridges.insert(tier, block);
            }
        }

        info!(
            "DiMARCo denoiser ready: objective={}, steps={}, bridges={}",
            config.objective,
            config.diffusion_steps,
            bridges.len()
        );

        Ok(Self {
            stages,
            decoders,
            bridges,
            scheduler,
            config,
            device,
        })
    }

    /// Fresh model with randomly initialised parameters held in the returned [`VarMap`]
    pub fn with_random_weights(config: DiffusionConfig, device: &Device) -> Result<(Self, VarMap)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = Self::new(config, vb)?;
        Ok((model, varmap))
    }

    /// Load parameters from safetensors files
    pub fn from_safetensors<P: AsRef<Path>>(
        config: DiffusionConfig,
        paths: &[P],
        device: &Device,
    ) -> Result<Self> {
        let paths: Vec<&Path> = paths.iter().map(|p| p.as_ref()).collect();
        for path in &paths {
            if !path.exists() {
                return Err(DiMarcoError::Io {
                    message: "weights file not found".to_string(),
                    path: Some(path.to_path_buf()),
                });
            }
        }
        // SAFETY: the files are only read, and stay mapped for the lifetime of the tensors.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&paths, DType::F32, device) }
            .context("mapping safetensors weights")?;
        Self::new(config, vb)
    }

    /// Side length of a `[batch, 1, size, size]` grid
    fn grid_size(x: &Tensor) -> Result<usize> {
        let dims = x.dims();
        if dims.len() != 4 || dims[1] != 1 {
            return Err(DiMarcoError::Shape {
                stage: GridStage::Input,
                expected: "[batch, 1, size, size]".to_string(),
                actual: dims.to_vec(),
            });
        }
        if dims[2] != dims[3] {
            return Err(DiMarcoError::NonSquareGrid {
                height: dims[2],
                width: dims[3],
            });
        }
        if dims[2] == 0 {
            return Err(DiMarcoError::Shape {
                stage: GridStage::Input,
                expected: "a grid of side at least 1".to_string(),
                actual: dims.to_vec(),
            });
        }
        Ok(dims[2])
    }

    /// Tier the grid `x` is routed through
    pub fn route(&self, x: &Tensor) -> Result<GridTier> {
        Ok(GridTier::from_size(Self::grid_size(x)?))
    }

    /// Size-routed forward pass; the output has the shape of `x`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let tier = self.route(x)?;
        debug!("routing {:?} through {} tier: {}", x.dims(), tier, tier.stage_names().join(" -> "));

        let mut h = x.clone();
        for stage in &self.stages[tier.encoder_stages()] {
            h = stage.forward(&h).map_err(|e| GridStage::Encoder.tag(e))?;
        }
        if let Some(bridge) = self.bridges.get(&tier) {
            h = bridge.forward(&h).map_err(|e| GridStage::Bridge.tag(e))?;
        }
        for decoder in &self.decoders[tier.decoder_stages()] {
            h = decoder.forward(&h).map_err(|e| GridStage::Decoder.tag(e))?;
        }
        Ok(h)
    }

    /// Noise a clean grid at step `t` using the model's schedule
    pub fn add_noise(&self, x: &Tensor, t: usize) -> Result<Tensor> {
        self.scheduler.add_noise(x, t)
    }

    /// Zero grid of shape `[batch, 1, size, size]` on the model's device
    pub fn blank_grid(&self, batch: usize, size: usize) -> Result<Tensor> {
        Ok(Tensor::zeros((batch, 1, size, size), DType::F32, &self.device)?)
    }

    pub fn bridge(&self, tier: GridTier) -> Option<&GridConvBlock> {
        self.bridges.get(&tier)
    }

    pub fn config(&self) -> &DiffusionConfig {
        &self.config
    }

    pub fn objective(&self) -> Objective {
        self.config.objective
    }

    pub fn scheduler(&self) -> &NoiseScheduler {
        &self.scheduler
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Module for DiffusionGridDenoiser {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        DiffusionGridDenoiser::forward(self, x).map_err(|e| candle_core::Error::Msg(e.to_string()))
    }
}
