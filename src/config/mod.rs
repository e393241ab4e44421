//! Configuration system for codemend.
//!
//! Two layers:
//! 1. Global config (.codemend.yml or ~/.config/codemend/codemend.yml)
//! 2. Command-line overrides

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{
    DepsConfig, ExtractConfig, GlobalConfig, HealingConfig, LlmConfig, MAX_RETRIES_LIMIT, SandboxSettings,
    ValidationConfig,
};
pub use self::overrides::ConfigOverrides;

mod global;
mod overrides;

/// Load from the standard search paths, apply overrides, then validate.
pub fn load_config(explicit_path: Option<&PathBuf>, overrides: &ConfigOverrides) -> Result<GlobalConfig> {
    let mut config = GlobalConfig::load(explicit_path)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
