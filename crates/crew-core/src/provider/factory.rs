//! Builds chat models for agents from configuration

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{catalog, ChatModel, GenAIProvider, ModelPreset};
use crate::config::Config;
use crate::error::{Error, Result};

enum Source {
    /// Models registered up front; unknown specs get the default
    Fixed {
        default: Arc<dyn ChatModel>,
        named: HashMap<String, Arc<dyn ChatModel>>,
    },
    /// Models are created from the catalog and cached per spec
    Configured {
        config: Config,
        cache: Mutex<HashMap<String, Arc<dyn ChatModel>>>,
    },
}

/// Hands out chat models by name (preset, provider or provider/model).
pub struct ModelPool {
    source: Source,
    /// Replaces every lookup's spec when set
    override_spec: Option<String>,
}

impl ModelPool {
    /// Pool backed by real providers.
    ///
    /// `override_spec` replaces every agent's own model choice, which is how
    /// `--provider`/`--model` on the command line take effect.
    pub fn from_config(config: Config, override_spec: Option<String>) -> Self {
        Self {
            source: Source::Configured {
                config,
                cache: Mutex::new(HashMap::new()),
            },
            override_spec,
        }
    }

    /// Pool that returns `model` for every lookup
    pub fn fixed(model: Arc<dyn ChatModel>) -> Self {
        Self {
            source: Source::Fixed {
                default: model,
                named: HashMap::new(),
            },
            override_spec: None,
        }
    }

    /// Serve `model` whenever `spec` is asked for
    pub fn with_model(mut self, spec: impl Into<String>, model: Arc<dyn ChatModel>) -> Self {
        match &mut self.source {
            Source::Fixed { named, .. } => {
                named.insert(spec.into(), model);
            }
            Source::Configured { cache, .. } => {
                cache.get_mut().insert(spec.into(), model);
            }
        }
        self
    }

    /// A pool over the same models where every lookup resolves to `spec`
    pub fn with_override(&self, spec: impl Into<String>) -> Self {
        let source = match &self.source {
            Source::Fixed { default, named } => Source::Fixed {
                default: Arc::clone(default),
                named: named.clone(),
            },
            Source::Configured { config, cache } => Source::Configured {
                config: config.clone(),
                cache: Mutex::new(cache.lock().clone()),
            },
        };
        Self {
            source,
            override_spec: Some(spec.into()),
        }
    }

    /// Get the model for `spec`
    pub fn get(&self, spec: &str) -> Result<Arc<dyn ChatModel>> {
        let spec = self.override_spec.as_deref().unwrap_or(spec);
        match &self.source {
            Source::Fixed { default, named } => Ok(Arc::clone(named.get(spec).unwrap_or(default))),
            Source::Configured { config, cache } => {
                if let Some(model) = cache.lock().get(spec) {
                    return Ok(Arc::clone(model));
                }

                let preset = preset_for(config, spec)?;
                let model = create_provider(config, &preset)?;
                cache.lock().insert(spec.to_string(), Arc::clone(&model));
                Ok(model)
            }
        }
    }

    /// Get the model for `spec`, or the configured default provider's model
    pub fn get_or_default(&self, spec: Option<&str>) -> Result<Arc<dyn ChatModel>> {
        match (spec.or(self.override_spec.as_deref()), &self.source) {
            (Some(spec), _) => self.get(spec),
            (None, Source::Configured { config, .. }) => self.get(&config.default_provider),
            (None, Source::Fixed { default, .. }) => Ok(Arc::clone(default)),
        }
    }
}

/// Resolve `spec`, letting the config's provider section supply the model
/// when only a provider name is given.
fn preset_for(config: &Config, spec: &str) -> Result<ModelPreset> {
    let mut preset = catalog::resolve(spec)?;
    if spec.eq_ignore_ascii_case(preset.provider.as_str()) {
        if let Some(provider_config) = config.get_provider(preset.provider.as_str()) {
            preset.model = provider_config.model.clone();
            preset.max_tokens = provider_config.max_tokens;
            preset.temperature = provider_config.temperature;
        }
    }
    debug!(spec, provider = %preset.provider, model = %preset.model, "Resolved model");
    Ok(preset)
}

fn create_provider(config: &Config, preset: &ModelPreset) -> Result<Arc<dyn ChatModel>> {
    let provider_name = preset.provider.as_str();
    let api_key = config
        .api_key_for(provider_name)
        .ok_or_else(|| {
            Error::Config(format!(
                "No API key for {}. Set {} or add api_key under [providers.{}]",
                provider_name,
                preset.provider.api_key_env(),
                provider_name
            ))
        })?;

    info!(provider = provider_name, model = %preset.model, "Creating chat model");
    Ok(Arc::new(GenAIProvider::with_api_key(preset, &api_key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_provider_name_uses_config_model() {
        let mut config = Config::default();
        config.providers.insert(
            "groq".to_string(),
            ProviderConfig {
                model: "gemma2-9b-it".to_string(),
                ..ProviderConfig::groq()
            },
        );

        let preset = preset_for(&config, "groq").unwrap();
        assert_eq!(preset.model, "gemma2-9b-it");

        let preset = preset_for(&config, "llama-8b").unwrap();
        assert_eq!(preset.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_configured_pool_caches_models() {
        let mut config = Config::default();
        if let Some(p) = config.providers.get_mut("anthropic") {
            p.api_key = Some("sk-test".to_string());
        }
        let pool = ModelPool::from_config(config, None);

        let a = pool.get("haiku").unwrap();
        let b = pool.get("haiku").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.model(), "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_override_spec_wins() {
        let mut config = Config::default();
        if let Some(p) = config.providers.get_mut("openai") {
            p.api_key = Some("sk-test".to_string());
        }
        let pool = ModelPool::from_config(config, Some("gpt-4o-mini".to_string()));
        assert_eq!(pool.get("sonnet").unwrap().model(), "gpt-4o-mini");
    }

    #[test]
    fn test_default_uses_default_provider() {
        let mut config = Config::default();
        config.default_provider = "groq".to_string();
        if let Some(p) = config.providers.get_mut("groq") {
            p.api_key = Some("gsk-test".to_string());
        }
        let pool = ModelPool::from_config(config, None);
        let model = pool.get_or_default(None).unwrap();
        assert_eq!(model.provider(), "groq");
        assert_eq!(model.model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_with_override_redirects_every_lookup() {
        let mut config = Config::default();
        if let Some(p) = config.providers.get_mut("anthropic") {
            p.api_key = Some("sk-test".to_string());
        }
        if let Some(p) = config.providers.get_mut("groq") {
            p.api_key = Some("gsk-test".to_string());
        }
        let pool = ModelPool::from_config(config, None);
        assert_eq!(pool.get("sonnet").unwrap().provider(), "anthropic");

        let fallback = pool.with_override("llama-70b");
        assert_eq!(fallback.get("sonnet").unwrap().model(), "llama-3.3-70b-versatile");
        assert_eq!(fallback.get_or_default(None).unwrap().model(), "llama-3.3-70b-versatile");
        assert_eq!(pool.get("sonnet").unwrap().provider(), "anthropic");
    }

    #[test]
    fn test_pool_uses_env_key_without_config_section() {
        let mut config = Config::default();
        config.providers.remove("openai");

        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-env") };
        let built = ModelPool::from_config(config, None).get("gpt-4o").map(|m| m.provider().to_string());
        unsafe { std::env::remove_var("OPENAI_API_KEY") };

        assert_eq!(built.unwrap(), "openai");
    }
}
