//! LLM Provider abstraction using GenAI
//!
//! Agents talk to models through the [`ChatModel`] trait. The production
//! implementation is [`GenAIProvider`], which reaches the hosted APIs through
//! the genai framework. Supported providers:
//! - Anthropic (Claude 3.5 Sonnet, Haiku, Claude 3 Opus)
//! - Groq (hosted Llama models)
//! - OpenAI (GPT-4o family)

pub mod catalog;
mod factory;
mod genai_provider;

pub use catalog::{ModelPreset, resolve};
pub use factory::ModelPool;
pub use genai_provider::GenAIProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::tools::ToolDefinition;

/// Supported LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Anthropic (Claude)
    Anthropic,
    /// OpenAI (GPT-4o, etc.)
    OpenAI,
    /// Groq (fast Llama inference)
    Groq,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "openai" => Ok(ProviderType::OpenAI),
            "groq" => Ok(ProviderType::Groq),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl ProviderType {
    pub const ALL: [ProviderType; 3] = [ProviderType::Anthropic, ProviderType::OpenAI, ProviderType::Groq];

    /// Get the provider type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "anthropic",
            ProviderType::OpenAI => "openai",
            ProviderType::Groq => "groq",
        }
    }

    /// Get the environment variable name for API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "ANTHROPIC_API_KEY",
            ProviderType::OpenAI => "OPENAI_API_KEY",
            ProviderType::Groq => "GROQ_API_KEY",
        }
    }

    /// Get the default model preset for this provider
    pub fn default_preset(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "sonnet",
            ProviderType::OpenAI => "gpt-4o",
            ProviderType::Groq => "llama-70b",
        }
    }
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Message in a conversation with a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum LlmMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    /// Assistant turn that asked for tools
    AssistantToolCalls {
        content: Option<String>,
        tool_calls: Vec<PendingToolCall>,
    },
    ToolResult { call_id: String, content: String },
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }

    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<PendingToolCall>) -> Self {
        Self::AssistantToolCalls { content, tool_calls }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    /// Text content (for logging/display)
    pub fn content_as_text(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => content,
            Self::ToolResult { content, .. } => content,
            Self::AssistantToolCalls { content, .. } => content.as_deref().unwrap_or(""),
        }
    }
}

/// Response from completion that may contain both content and tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResult {
    /// Text content from the assistant (may be present even with tool calls)
    pub content: Option<String>,
    /// Tool calls the crew should run before asking again
    pub tool_calls: Vec<PendingToolCall>,
}

impl CompletionResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Check if this result has any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Check if this result has text content
    pub fn has_content(&self) -> bool {
        self.content.as_ref().map(|c| !c.trim().is_empty()).unwrap_or(false)
    }
}

/// A chat-completion backend an agent can use
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name (e.g., "anthropic")
    fn provider(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str;

    /// Run one completion. An empty `tools` slice disables tool calling.
    async fn chat(&self, messages: &[LlmMessage], tools: &[ToolDefinition]) -> Result<CompletionResult>;

    /// Check the provider answers a minimal prompt
    async fn health_check(&self) -> bool {
        match self.chat(&[LlmMessage::user("Hi")], &[]).await {
            Ok(result) => result.has_content(),
            Err(e) => {
                warn!(provider = self.provider(), model = self.model(), error = %e, "Health check failed");
                false
            }
        }
    }
}
