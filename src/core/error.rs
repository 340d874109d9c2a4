//! Structured error handling for DiMARCo
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! separates configuration problems, invalid timesteps and grid-shape
//! violations from failures raised by the tensor library.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias with DiMarcoError
pub type Result<T> = std::result::Result<T, DiMarcoError>;

/// Main error type for DiMARCo
#[derive(Error, Debug, Clone)]
pub enum DiMarcoError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Timestep index outside `[0, steps)`
    #[error("Timestep {timestep} out of range for a {steps}-step schedule")]
    TimestepOutOfRange { timestep: usize, steps: usize },

    /// Grid tensor with an unexpected rank or channel count
    #[error("Shape error at {stage}: expected {expected}, got {actual:?}")]
    Shape {
        stage: GridStage,
        expected: String,
        actual: Vec<usize>,
    },

    /// Grid tensor whose height and width differ
    #[error("Grid must be square, got {height}x{width}")]
    NonSquareGrid { height: usize, width: usize },

    /// Failures raised by the tensor library
    #[error("Tensor operation failed: {message}")]
    Tensor { message: String },

    /// Tensor failure inside one part of the forward pass
    #[error("Forward pass failed in {stage}: {message}")]
    Forward { stage: GridStage, message: String },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },
}

impl DiMarcoError {
    /// Build a configuration error without a source file
    pub fn config(message: impl Into<String>) -> Self {
        DiMarcoError::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Attach the file a configuration or I/O error came from
    pub fn with_path(self, source: impl Into<PathBuf>) -> Self {
        match self {
            DiMarcoError::Config { message, .. } => DiMarcoError::Config {
                message,
                path: Some(source.into()),
            },
            DiMarcoError::Io { message, .. } => DiMarcoError::Io {
                message,
                path: Some(source.into()),
            },
            other => other,
        }
    }

    /// Source file of a configuration or I/O error, if known
    pub fn path(&self) -> Option<&Path> {
        match self {
            DiMarcoError::Config { path, .. } | DiMarcoError::Io { path, .. } => path.as_deref(),
            _ => None,
        }
    }

    /// Whether this error is an index-range violation
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, DiMarcoError::TimestepOutOfRange { .. })
    }
}

/// Where in the model a grid was rejected or a tensor op failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStage {
    Input,
    Noising,
    Encoder,
    Bridge,
    Decoder,
}

impl GridStage {
    /// Tag a tensor-library failure with this stage
    pub fn tag(self, err: candle_core::Error) -> DiMarcoError {
        DiMarcoError::Forward {
            stage: self,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for GridStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridStage::Input => write!(f, "input"),
            GridStage::Noising => write!(f, "noising"),
            GridStage::Encoder => write!(f, "encoder"),
            GridStage::Bridge => write!(f, "bridge"),
            GridStage::Decoder => write!(f, "decoder"),
        }
    }
}

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add a simple message context
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| DiMarcoError::Tensor {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for DiMarcoError {
    fn from(err: std::io::Error) -> Self {
        DiMarcoError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Convert from candle_core::Error
impl From<candle_core::Error> for DiMarcoError {
    fn from(err: candle_core::Error) -> Self {
        DiMarcoError::Tensor {
            message: err.to_string(),
        }
    }
}
