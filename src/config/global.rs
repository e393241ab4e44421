//! Global configuration.
//!
//! Loaded from ./.codemend.yml or ~/.config/codemend/codemend.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deps::PipInstaller;
use crate::extract::CodeBlockExtractor;
use crate::llm::AnthropicConfig;
use crate::llm::anthropic::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::runner::{
    DEFAULT_FIXER_ROLE, DEFAULT_MAX_RETRIES, DEFAULT_ORACLE_TIMEOUT_MS, DEFAULT_SYSTEM_ROLE, HealingLoopConfig,
};
use crate::sandbox::SandboxConfig;
use crate::validation::{DEFAULT_MIN_CHARS, OutputValidatorConfig, default_failure_phrases};

/// Upper bound on `healing.max-retries`
pub const MAX_RETRIES_LIMIT: u32 = 20;

const PROJECT_CONFIG: &str = ".codemend.yml";

/// Global configuration for codemend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Oracle settings.
    pub llm: LlmConfig,

    /// Retry policy.
    pub healing: HealingConfig,

    /// Sandboxed execution.
    pub sandbox: SandboxSettings,

    /// Dependency provisioning.
    pub deps: DepsConfig,

    /// Output validation.
    pub validation: ValidationConfig,

    /// Code block extraction.
    pub extract: ExtractConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .codemend.yml in current directory
    /// 3. ~/.config/codemend/codemend.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(PROJECT_CONFIG);
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from {}", PROJECT_CONFIG);
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", PROJECT_CONFIG, e);
                }
            }
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// ~/.config/codemend/codemend.yml (platform equivalent)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("codemend").join("codemend.yml"))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.healing.max_retries > MAX_RETRIES_LIMIT {
            eyre::bail!("healing.max-retries must be <= {}", MAX_RETRIES_LIMIT);
        }
        if self.llm.timeout_ms == 0 {
            eyre::bail!("llm.timeout-ms must be > 0");
        }
        if self.llm.max_tokens == 0 {
            eyre::bail!("llm.max-tokens must be > 0");
        }
        if self.sandbox.timeout_ms == 0 {
            eyre::bail!("sandbox.timeout-ms must be > 0");
        }
        if self.deps.install_timeout_ms == 0 || self.deps.probe_timeout_ms == 0 {
            eyre::bail!("deps timeouts must be > 0");
        }
        if self.sandbox.interpreter.trim().is_empty() {
            eyre::bail!("sandbox.interpreter must not be empty");
        }
        if self.deps.interpreter.trim().is_empty() {
            eyre::bail!("deps.interpreter must not be empty");
        }
        if self.extract.language.trim().is_empty() {
            eyre::bail!("extract.language must not be empty");
        }
        Ok(())
    }

    pub fn anthropic_config(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            base_url: self.llm.base_url.clone(),
            api_key_env: self.llm.api_key_env.clone(),
            timeout: Duration::from_millis(self.llm.timeout_ms),
        }
    }

    pub fn healing_config(&self) -> HealingLoopConfig {
        HealingLoopConfig {
            max_retries: self.healing.max_retries,
            accumulate_history: self.healing.accumulate_history,
            oracle_timeout_ms: self.llm.timeout_ms,
            system_role: self.llm.system_role.clone(),
            fixer_role: self.llm.fixer_role.clone(),
            max_tokens: Some(self.llm.max_tokens),
        }
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::new(self.sandbox.interpreter.clone())
            .timeout_ms(self.sandbox.timeout_ms)
            .max_output_bytes(self.sandbox.max_output_bytes)
    }

    pub fn installer(&self) -> PipInstaller {
        PipInstaller::new(self.deps.interpreter.clone())
            .install_timeout_ms(self.deps.install_timeout_ms)
            .probe_timeout_ms(self.deps.probe_timeout_ms)
    }

    pub fn validator_config(&self) -> OutputValidatorConfig {
        OutputValidatorConfig::default()
            .min_chars(self.validation.min_chars)
            .failure_phrases(self.validation.failure_phrases.clone())
    }

    pub fn extractor(&self) -> CodeBlockExtractor {
        CodeBlockExtractor::new(self.extract.language.clone()).with_aliases(self.extract.aliases.clone())
    }
}

/// Oracle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Timeout per oracle call in milliseconds.
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// System role for the initial generation.
    #[serde(rename = "system-role")]
    pub system_role: String,

    /// System role for fix requests.
    #[serde(rename = "fixer-role")]
    pub fixer_role: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: DEFAULT_ORACLE_TIMEOUT_MS,
            system_role: DEFAULT_SYSTEM_ROLE.to_string(),
            fixer_role: DEFAULT_FIXER_ROLE.to_string(),
        }
    }
}

/// Retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealingConfig {
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Include earlier failures in every fix prompt.
    #[serde(rename = "accumulate-history")]
    pub accumulate_history: bool,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            accumulate_history: false,
        }
    }
}

/// Sandboxed execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub interpreter: String,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(rename = "max-output-bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let defaults = SandboxConfig::default();
        Self {
            interpreter: defaults.interpreter,
            timeout_ms: defaults.timeout_ms,
            max_output_bytes: defaults.max_output_bytes,
        }
    }
}

/// Dependency provisioning settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DepsConfig {
    /// Interpreter whose pip installs packages; should match the sandbox.
    pub interpreter: String,

    #[serde(rename = "install-timeout-ms")]
    pub install_timeout_ms: u64,

    #[serde(rename = "probe-timeout-ms")]
    pub probe_timeout_ms: u64,
}

impl Default for DepsConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            install_timeout_ms: 300_000,
            probe_timeout_ms: 15_000,
        }
    }
}

/// Output validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    #[serde(rename = "min-chars")]
    pub min_chars: usize,

    #[serde(rename = "failure-phrases")]
    pub failure_phrases: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            failure_phrases: default_failure_phrases(),
        }
    }
}

/// Code block extraction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub language: String,
    pub aliases: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            language: "python".to_string(),
            aliases: vec!["py".to_string()],
        }
    }
}
