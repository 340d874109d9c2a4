//! Core abstractions shared across the crate
//!
//! - `error`: structured error type and `Result` alias

pub mod error;

pub use error::{DiMarcoError, GridStage, Result, ResultExt};
