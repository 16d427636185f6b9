//! KitchenMaster configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::LlmError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Main KitchenMaster configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reasoning model configuration
    pub llm: LlmConfig,

    /// Image model configuration
    pub image: ImageConfig,

    /// Turn workflow settings
    pub workflow: WorkflowConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Directory with prompt template overrides
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,

    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variables are set. Call this
    /// before any command that talks to the hosted models.
    pub fn validate(&self) -> Result<()> {
        self.llm.api_key().map_err(|e| eyre::eyre!("{}", e))?;
        self.image.api_key().map_err(|e| eyre::eyre!("{}", e))?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .kitchenmaster.yml
        let local_config = PathBuf::from(".kitchenmaster.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/kitchenmaster/kitchenmaster.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("kitchenmaster").join("kitchenmaster.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn read_api_key(env_name: &str) -> Result<String, LlmError> {
    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::MissingApiKey(env_name.to_string())),
    }
}

/// Reasoning model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "gemini" or "anthropic"
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL, provider default when unset
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, LlmError> {
        read_api_key(&self.api_key_env)
    }

    /// Configured base URL, or the provider's public endpoint
    pub fn base_url(&self) -> String {
        match (&self.base_url, self.provider.as_str()) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, "anthropic") => ANTHROPIC_BASE_URL.to_string(),
            (None, _) => GEMINI_BASE_URL.to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            timeout_ms: 120_000,
        }
    }
}

/// Image model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Provider name (currently only "gemini")
    pub provider: String,

    /// Image generation model
    pub model: String,

    /// Multimodal model used to describe an image before editing it
    #[serde(rename = "describe-model")]
    pub describe_model: String,

    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Output aspect ratio, e.g. "16:9"
    #[serde(rename = "aspect-ratio")]
    pub aspect_ratio: String,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl ImageConfig {
    pub fn api_key(&self) -> Result<String, LlmError> {
        read_api_key(&self.api_key_env)
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "imagen-3.0-generate-002".to_string(),
            describe_model: "gemini-2.0-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            aspect_ratio: "16:9".to_string(),
            timeout_ms: 180_000,
        }
    }
}

/// Turn workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Upper bound on any single reasoning or image call; expiry counts as a failure
    #[serde(rename = "service-timeout-ms")]
    pub service_timeout_ms: u64,

    /// Size used when an edit falls back to a first design with no size known
    #[serde(rename = "default-linear-meters")]
    pub default_linear_meters: f64,
}

impl WorkflowConfig {
    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            service_timeout_ms: 240_000,
            default_linear_meters: 3.0,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the design store database
    #[serde(rename = "store-dir")]
    pub store_dir: String,

    /// Lifetime of cached turn state
    #[serde(rename = "state-ttl-hours")]
    pub state_ttl_hours: u64,
}

impl StorageConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_hours.saturating_mul(3600))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/kitchenmaster on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("kitchenmaster"))
            .unwrap_or_else(|| PathBuf::from(".kitchenmaster"))
            .to_string_lossy()
            .into_owned();

        Self {
            store_dir,
            state_ttl_hours: 168,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.image.aspect_ratio, "16:9");
        assert_eq!(config.workflow.default_linear_meters, 3.0);
        assert_eq!(config.storage.state_ttl(), Duration::from_secs(7 * 24 * 3600));
        assert!(config.prompts_dir.is_none());
    }

    #[test]
    fn test_base_url_follows_provider() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.base_url(), GEMINI_BASE_URL);

        llm.provider = "anthropic".to_string();
        assert_eq!(llm.base_url(), ANTHROPIC_BASE_URL);

        llm.base_url = Some("http://localhost:8080/".to_string());
        assert_eq!(llm.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-sonnet-4
  api-key-env: MY_API_KEY
  max-tokens: 2048
  temperature: 0.2

image:
  model: imagen-4
  aspect-ratio: "4:3"

workflow:
  service-timeout-ms: 1000
  default-linear-meters: 2.5

storage:
  store-dir: /tmp/km
  state-ttl-hours: 1

prompts-dir: /etc/km/prompts
log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.image.model, "imagen-4");
        assert_eq!(config.image.aspect_ratio, "4:3");
        assert_eq!(config.workflow.service_timeout(), Duration::from_millis(1000));
        assert_eq!(config.workflow.default_linear_meters, 2.5);
        assert_eq!(config.storage.store_dir, "/tmp/km");
        assert_eq!(config.storage.state_ttl(), Duration::from_secs(3600));
        assert_eq!(config.prompts_dir, Some(PathBuf::from("/etc/km/prompts")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_huge_state_ttl_saturates() {
        let storage = StorageConfig {
            state_ttl_hours: u64::MAX,
            ..StorageConfig::default()
        };
        assert_eq!(storage.state_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gemini-1.5-pro
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.image.model, "imagen-3.0-generate-002");
        assert_eq!(config.storage.state_ttl_hours, 168);
    }

    #[test]
    fn test_validate_fails_without_api_key() {
        let mut config = Config::default();
        config.llm.api_key_env = "KM_TEST_SURELY_UNSET_KEY".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("KM_TEST_SURELY_UNSET_KEY"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("km.yml");
        std::fs::write(&path, "workflow:\n  default-linear-meters: 4.0\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.workflow.default_linear_meters, 4.0);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let path = PathBuf::from("/nonexistent/kitchenmaster.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
