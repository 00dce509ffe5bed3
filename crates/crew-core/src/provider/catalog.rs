//! Model catalog - named presets agents refer to
//!
//! Loads preset data from embedded JSON at compile time.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::ProviderType;
use crate::error::{Error, Result};

/// Embedded JSON data
const MODELS_JSON: &str = include_str!("models.json");

/// A concrete model with its sampling settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelPreset {
    pub provider: ProviderType,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Deserialize)]
struct RawCatalog {
    presets: BTreeMap<String, ModelPreset>,
}

static CATALOG: LazyLock<BTreeMap<String, ModelPreset>> = LazyLock::new(|| {
    let raw: RawCatalog = serde_json::from_str(MODELS_JSON)
        .expect("failed to parse models.json");
    raw.presets
});

/// Get a preset by name
pub fn get(name: &str) -> Option<&'static ModelPreset> {
    CATALOG.get(&name.to_lowercase())
}

/// All preset names, sorted
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.keys().map(|s| s.as_str())
}

fn provider_default(provider: ProviderType) -> &'static ModelPreset {
    get(provider.default_preset()).expect("every provider has a default preset")
}

/// Guess the provider that serves a bare model id
fn infer_provider(model: &str) -> Option<ProviderType> {
    let model = model.to_lowercase();
    if model.starts_with("claude") {
        Some(ProviderType::Anthropic)
    } else if model.starts_with("gpt") || model.starts_with("o1") || model.starts_with("o3") {
        Some(ProviderType::OpenAI)
    } else if ["llama", "mixtral", "gemma", "deepseek-r1-distill"]
        .iter()
        .any(|p| model.starts_with(p))
    {
        Some(ProviderType::Groq)
    } else {
        None
    }
}

/// Resolve a model spec to a preset.
///
/// Accepted forms, in order:
/// - a preset name (`sonnet`, `llama-70b`)
/// - a provider name (`groq`), giving that provider's default preset
/// - `provider/model` or `provider::model`
/// - a bare model id whose provider can be inferred (`claude-3-opus-20240229`)
pub fn resolve(spec: &str) -> Result<ModelPreset> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(Error::Config("empty model name".to_string()));
    }

    if let Some(preset) = get(spec) {
        return Ok(preset.clone());
    }

    if let Ok(provider) = spec.parse::<ProviderType>() {
        return Ok(provider_default(provider).clone());
    }

    let split = spec.split_once("::").or_else(|| spec.split_once('/'));
    if let Some((provider, model)) = split {
        if let Ok(provider) = provider.parse::<ProviderType>() {
            let defaults = provider_default(provider);
            return Ok(ModelPreset {
                provider,
                model: model.to_string(),
                max_tokens: defaults.max_tokens,
                temperature: defaults.temperature,
            });
        }
    }

    if let Some(provider) = infer_provider(spec) {
        let defaults = provider_default(provider);
        return Ok(ModelPreset {
            provider,
            model: spec.to_string(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        });
    }

    Err(Error::Config(format!(
        "Unknown model '{}'. Use a preset ({}) or provider/model",
        spec,
        names().collect::<Vec<_>>().join(", ")
    )))
}
