//! Command-line overrides.
//!
//! Applied on top of the loaded file, before validation.

use serde::{Deserialize, Serialize};

use super::GlobalConfig;

/// Values given on the command line that replace file settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigOverrides {
    /// Override healing.max-retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Override llm.model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Override sandbox.timeout-ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Check if any overrides are set.
    pub fn is_empty(&self) -> bool {
        self.max_retries.is_none() && self.model.is_none() && self.timeout_ms.is_none()
    }

    /// Write every set value into `config`.
    pub fn apply(&self, config: &mut GlobalConfig) {
        if let Some(max_retries) = self.max_retries {
            config.healing.max_retries = max_retries;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.sandbox.timeout_ms = timeout_ms;
        }
    }
}
