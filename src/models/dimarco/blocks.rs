//! Convolutional building blocks of the grid U-Net

use candle_core::{Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig, Module, PReLU, VarBuilder};

/// Activation following a [`GridConvBlock`] convolution
#[derive(Debug, Clone)]
enum GridActivation {
    /// Per-channel learnable rectifier
    Learnable(PReLU),
    /// Fixed smooth rectifier (SiLU)
    Smooth,
}

/// One convolution followed by one nonlinearity.
///
/// Parameters live under `conv.*` and, for the learnable variant, `act.weight`.
#[derive(Debug, Clone)]
pub struct GridConvBlock {
    conv: Conv2d,
    activation: GridActivation,
    in_channels: usize,
    out_channels: usize,
}

impl GridConvBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        dilation: usize,
        padding: usize,
        learnable_activation: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding,
            stride,
            dilation,
            ..Default::default()
        };
        let conv = candle_nn::conv2d(in_channels, out_channels, kernel_size, cfg, vb.pp("conv"))?;
        let activation = if learnable_activation {
            GridActivation::Learnable(candle_nn::prelu(Some(out_channels), vb.pp("act"))?)
        } else {
            GridActivation::Smooth
        };

        Ok(Self {
            conv,
            activation,
            in_channels,
            out_channels,
        })
    }

    /// 1x1 projection between channel widths
    pub fn projection(
        in_channels: usize,
        out_channels: usize,
        learnable_activation: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        Self::new(in_channels, out_channels, 1, 1, 1, 0, learnable_activation, vb)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn is_learnable(&self) -> bool {
        matches!(self.activation, GridActivation::Learnable(_))
    }
}

impl Module for GridConvBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.conv.forward(x)?;
        match &self.activation {
            GridActivation::Learnable(prelu) => prelu.forward(&x),
            GridActivation::Smooth => candle_nn::ops::silu(&x),
        }
    }
}

/// Encoder stage: conv3x3 -> ReLU -> conv3x3 -> ReLU, spatial size preserved.
///
/// Weights are named `0.*` and `2.*`, the positions of the two convolutions
/// in the layer sequence.
#[derive(Debug, Clone)]
pub struct EncoderStage {
    conv_in: Conv2d,
    conv_out: Conv2d,
    out_channels: usize,
}

impl EncoderStage {
    pub fn new(
        in_channels: usize,
        mid_channels: usize,
        out_channels: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg3x3 = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv_in = candle_nn::conv2d(in_channels, mid_channels, 3, cfg3x3, vb.pp("0"))?;
        let conv_out = candle_nn::conv2d(mid_channels, out_channels, 3, cfg3x3, vb.pp("2"))?;
        Ok(Self {
            conv_in,
            conv_out,
            out_channels,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl Module for EncoderStage {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.conv_in.forward(x)?.relu()?;
        self.conv_out.forward(&x)?.relu()
    }
}

/// Decoder stage: a single 3x3 transpose convolution (padding 1, stride 1)
/// narrowing the channel width.
#[derive(Debug, Clone)]
pub struct DecoderStage {
    conv: ConvTranspose2d,
    in_channels: usize,
}

impl DecoderStage {
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        let cfg = ConvTranspose2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv = candle_nn::conv_transpose2d(in_channels, out_channels, 3, cfg, vb)?;
        Ok(Self { conv, in_channels })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }
}

impl Module for DecoderStage {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.conv.forward(x)
    }
}
