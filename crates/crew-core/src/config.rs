//! Configuration management for research-crew
//!
//! Handles loading, saving, and managing application configuration
//! including API keys, provider settings, search keys and crew limits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::ProviderType;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default provider to use
    #[serde(default = "default_provider_name")]
    pub default_provider: String,
    /// Provider configurations keyed by name
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
    /// Search API settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Crew execution limits
    #[serde(default)]
    pub crew: CrewSettings,
    /// General application settings
    #[serde(default)]
    pub general: GeneralConfig,
}

fn default_provider_name() -> String {
    "anthropic".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert("anthropic".to_string(), ProviderConfig::anthropic());
    providers.insert("openai".to_string(), ProviderConfig::openai());
    providers.insert("groq".to_string(), ProviderConfig::groq());
    providers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider_name(),
            providers: default_providers(),
            search: SearchConfig::default(),
            crew: CrewSettings::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Config {
    /// Get the provider config for the default provider
    pub fn get_default_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.default_provider)
    }

    /// Get a specific provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// API key for a provider: its config section first, then the
    /// provider's standard environment variable. Works for providers that
    /// have no section in the file.
    pub fn api_key_for(&self, provider_name: &str) -> Option<String> {
        self.get_provider(provider_name)
            .and_then(|p| p.get_api_key())
            .or_else(|| {
                provider_name
                    .parse::<ProviderType>()
                    .ok()
                    .and_then(|p| non_empty_env(p.api_key_env()))
            })
    }

    /// List all configured provider names
    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// LLM Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "anthropic", "openai" or "groq"
    pub provider_type: String,
    /// API key (can be loaded from env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Model to use
    pub model: String,
    /// Max tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::anthropic()
    }
}

impl ProviderConfig {
    /// Create Anthropic provider config
    pub fn anthropic() -> Self {
        Self {
            provider_type: "anthropic".to_string(),
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 8192,
            temperature: 0.6,
        }
    }

    /// Create OpenAI provider config
    pub fn openai() -> Self {
        Self {
            provider_type: "openai".to_string(),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    /// Create Groq provider config
    pub fn groq() -> Self {
        Self {
            provider_type: "groq".to_string(),
            api_key: None,
            api_key_env: Some("GROQ_API_KEY".to_string()),
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    /// Get the API key, checking environment variable if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        if let Some(env_name) = &self.api_key_env {
            if let Some(key) = non_empty_env(env_name) {
                return Some(key);
            }
        }

        match self.provider_type.as_str() {
            "anthropic" => non_empty_env("ANTHROPIC_API_KEY"),
            "openai" => non_empty_env("OPENAI_API_KEY"),
            "groq" => non_empty_env("GROQ_API_KEY"),
            _ => None,
        }
    }
}

/// Search API keys and request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// SerpAPI key (falls back to SERPAPI_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serpapi_api_key: Option<String>,
    /// SearchAPI.io key (falls back to SEARCH_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchapi_api_key: Option<String>,
    /// Serper key (falls back to SERPER_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serper_api_key: Option<String>,
    /// Results requested per search
    pub max_results: usize,
    /// HTTP timeout per search request
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            serpapi_api_key: None,
            searchapi_api_key: None,
            serper_api_key: None,
            max_results: 10,
            timeout_secs: 30,
        }
    }
}

pub const SERPAPI_KEY_ENV: &str = "SERPAPI_API_KEY";
pub const SEARCHAPI_KEY_ENV: &str = "SEARCH_API_KEY";
pub const SERPER_KEY_ENV: &str = "SERPER_API_KEY";

impl SearchConfig {
    pub fn serpapi_key(&self) -> Option<String> {
        key_or_env(&self.serpapi_api_key, SERPAPI_KEY_ENV)
    }

    pub fn searchapi_key(&self) -> Option<String> {
        key_or_env(&self.searchapi_api_key, SEARCHAPI_KEY_ENV)
    }

    pub fn serper_key(&self) -> Option<String> {
        key_or_env(&self.serper_api_key, SERPER_KEY_ENV)
    }
}

/// Limits applied to every crew run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewSettings {
    /// Maximum LLM round-trips per task before forcing a final answer
    pub max_turns: u32,
    /// Maximum LLM requests per minute across the crew (0 disables)
    pub max_rpm: u32,
    /// Kickoff attempts before giving up
    pub max_attempts: u32,
    /// Base backoff between attempts, multiplied by the attempt number
    pub retry_backoff_secs: u64,
    /// Model every agent switches to once a topic run has used up its
    /// attempts; a blueprint's own `fallback_model` takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
}

impl Default for CrewSettings {
    fn default() -> Self {
        Self {
            max_turns: 15,
            max_rpm: 30,
            max_attempts: 3,
            retry_backoff_secs: 2,
            fallback_model: None,
        }
    }
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory result files are written to
    pub output_dir: Option<PathBuf>,
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn key_or_env(key: &Option<String>, env_name: &str) -> Option<String> {
    key.clone()
        .filter(|k| !k.is_empty())
        .or_else(|| non_empty_env(env_name))
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("research-crew").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Get API key for a specific provider
    pub fn get_api_key_for(&self, provider_name: &str) -> Option<String> {
        self.config.api_key_for(provider_name)
    }

    /// Get the default provider name
    pub fn default_provider(&self) -> &str {
        &self.config.default_provider
    }

    /// Names of required keys that are not configured anywhere.
    ///
    /// Accepts provider names ("anthropic") and search key env names
    /// ("SERPER_API_KEY").
    pub fn missing_keys<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.has_key(name))
            .collect()
    }

    fn has_key(&self, name: &str) -> bool {
        let search = &self.config.search;
        match name {
            SERPAPI_KEY_ENV => search.serpapi_key().is_some(),
            SEARCHAPI_KEY_ENV => search.searchapi_key().is_some(),
            SERPER_KEY_ENV => search.serper_key().is_some(),
            provider => self.get_api_key_for(provider).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.list_providers(), vec!["anthropic", "groq", "openai"]);

        let anthropic = config.get_default_provider().unwrap();
        assert_eq!(anthropic.model, "claude-3-5-sonnet-20241022");
        assert_eq!(anthropic.max_tokens, 8192);
        assert!((anthropic.temperature - 0.6).abs() < f64::EPSILON);

        assert_eq!(config.crew.max_attempts, 3);
        assert_eq!(config.crew.max_rpm, 30);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("default_provider"));
        assert!(toml_str.contains("[providers.anthropic]"));
        assert!(toml_str.contains("[crew]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.providers.len(), config.providers.len());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
default_provider = "groq"

[crew]
max_turns = 4
"#,
        )
        .unwrap();
        assert_eq!(parsed.default_provider, "groq");
        assert_eq!(parsed.crew.max_turns, 4);
        assert_eq!(parsed.crew.max_attempts, 3);
        assert_eq!(parsed.search.max_results, 10);
        assert!(parsed.providers.contains_key("anthropic"));
    }

    #[test]
    fn test_api_key_from_named_env() {
        let mut config = ProviderConfig::groq();
        config.api_key_env = Some("CREW_TEST_PROVIDER_KEY_31".to_string());

        unsafe { std::env::set_var("CREW_TEST_PROVIDER_KEY_31", "test-key") };
        assert_eq!(config.get_api_key(), Some("test-key".to_string()));
        unsafe { std::env::remove_var("CREW_TEST_PROVIDER_KEY_31") };
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut config = ProviderConfig::openai();
        config.api_key = Some("inline".to_string());
        assert_eq!(config.get_api_key(), Some("inline".to_string()));
    }

    #[test]
    fn test_search_key_prefers_config() {
        let search = SearchConfig {
            serper_api_key: Some("from-config".to_string()),
            ..SearchConfig::default()
        };
        assert_eq!(search.serper_key(), Some("from-config".to_string()));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::with_path(path.clone()).unwrap();
        manager.config_mut().default_provider = "openai".to_string();
        manager.config_mut().crew.max_rpm = 0;
        manager.save().unwrap();

        let reloaded = ConfigManager::with_path(path).unwrap();
        assert_eq!(reloaded.default_provider(), "openai");
        assert_eq!(reloaded.config().crew.max_rpm, 0);
    }

    #[test]
    fn test_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::with_path(dir.path().join("config.toml")).unwrap();
        manager.config_mut().search.serper_api_key = Some("k".to_string());
        if let Some(p) = manager.config_mut().providers.get_mut("anthropic") {
            p.api_key = Some("a".to_string());
        }

        let missing = manager.missing_keys(&["anthropic", SERPER_KEY_ENV, "no-such-provider"]);
        assert_eq!(missing, vec!["no-such-provider"]);
    }

    #[test]
    fn test_provider_key_from_env_without_config_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[providers.anthropic]
provider_type = "anthropic"
api_key = "sk-file"
"#,
        )
        .unwrap();
        let manager = ConfigManager::with_path(path).unwrap();
        assert!(manager.config().get_provider("groq").is_none());

        unsafe { std::env::set_var("GROQ_API_KEY", "gsk-env") };
        let missing = manager.missing_keys(&["anthropic", "groq"]);
        let key = manager.get_api_key_for("groq");
        unsafe { std::env::remove_var("GROQ_API_KEY") };

        assert!(missing.is_empty());
        assert_eq!(key, Some("gsk-env".to_string()));
    }
}
