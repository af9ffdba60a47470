//! Error types for the sketch engine.

use std::io;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Host size times scale produced an empty render surface.
    #[error(
        "invalid surface size: {width}x{height} at scale {scale} is empty"
    )]
    InvalidSurfaceSize { width: u32, height: u32, scale: f32 },

    #[error("rate for '{name}' must be positive, got {value}")]
    InvalidRate { name: &'static str, value: u32 },

    #[error("failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("rasterizer allocation failed: {0}")]
    Raster(String),

    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Config(#[from] serde_yml::Error),
}
