use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};

pub const DEFAULT_STEP_RATE: u32 = 60;
pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const DEFAULT_INPUT_RATE: u32 = 120;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Engine settings, typically loaded from a YAML file next to the sketch:
///
/// ```yaml
/// step_rate: 30
/// frame_rate: 60
/// vsync: false
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulation steps per second.
    pub step_rate: u32,
    /// Screen updates per second.
    pub frame_rate: u32,
    /// Input worker drains per second.
    pub input_rate: u32,
    /// Host size multiplier used to size the render surface.
    pub scale: f32,
    /// When set, screen updates only mark a redraw as pending and the step
    /// clock performs it.
    pub vsync: bool,
    pub shutdown_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_rate: DEFAULT_STEP_RATE,
            frame_rate: DEFAULT_FRAME_RATE,
            input_rate: DEFAULT_INPUT_RATE,
            scale: 1.0,
            vsync: true,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> EngineResult<Self> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_rate("step_rate", self.step_rate)?;
        validate_rate("frame_rate", self.frame_rate)?;
        validate_rate("input_rate", self.input_rate)?;
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

pub(crate) fn validate_rate(name: &'static str, value: u32) -> EngineResult<()> {
    if value == 0 {
        return Err(EngineError::InvalidRate { name, value });
    }
    Ok(())
}

/// Period of a clock firing `rate` times per second.
pub(crate) fn period_for(rate: u32) -> Duration {
    Duration::from_secs(1) / rate.max(1)
}
