//! GenAI-based LLM provider implementation
//!
//! Uses the genai framework to reach Anthropic, OpenAI and Groq with manual
//! tool control: tool calls come back to the crew, which runs them and
//! continues the conversation.
//!
//! ## LLM Request/Response Logging
//!
//! Set the `LLM_LOG_FILE` environment variable to append every request and
//! response to a JSON-lines file.
//!
//! Example: `LLM_LOG_FILE=/tmp/llm.log research-crew run history-research ...`

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent, Tool, ToolCall, ToolResponse};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client, WebConfig};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatModel, CompletionResult, LlmMessage, ModelPreset, PendingToolCall, ProviderType};
use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

/// Log LLM request/response to file if LLM_LOG_FILE is set
fn log_llm_interaction(
    model: &str,
    messages: &[LlmMessage],
    tools: &[ToolDefinition],
    result: Option<&CompletionResult>,
    error: Option<&str>,
) {
    let log_file = match std::env::var("LLM_LOG_FILE") {
        Ok(path) => path,
        Err(_) => return,
    };

    let entry = serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": model,
        "request": {
            "messages": messages,
            "message_count": messages.len(),
            "tools": tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        },
        "response": result.map(|r| serde_json::json!({
            "type": if r.has_tool_calls() { "tool_calls" } else { "message" },
            "content": r.content,
            "tool_calls": r.tool_calls,
        })),
        "error": error,
    });

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", entry) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", log_file, e);
        }
    }

    debug!("Logged LLM interaction to {}", log_file);
}

/// A provider implementation using genai
pub struct GenAIProvider {
    client: Client,
    provider_type: ProviderType,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl GenAIProvider {
    /// Default timeout for LLM API requests (5 minutes)
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    fn default_web_config() -> WebConfig {
        WebConfig::default()
            .with_timeout(Self::DEFAULT_TIMEOUT)
            .with_connect_timeout(Duration::from_secs(30))
    }

    /// Create a provider that reads its API key from the provider's env var
    pub fn new(preset: &ModelPreset) -> Self {
        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .build();
        Self::from_client(client, preset)
    }

    /// Create a provider with a specific API key
    pub fn with_api_key(preset: &ModelPreset, api_key: &str) -> Self {
        let api_key = api_key.to_string();
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(api_key.clone())))
            },
        );

        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .with_auth_resolver(auth_resolver)
            .build();
        Self::from_client(client, preset)
    }

    fn from_client(client: Client, preset: &ModelPreset) -> Self {
        Self {
            client,
            provider_type: preset.provider,
            model: preset.model.clone(),
            max_tokens: preset.max_tokens,
            temperature: preset.temperature,
        }
    }

    /// Get the provider type
    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    /// Model name with the adapter namespace genai uses to pick the backend
    fn model_spec(&self) -> String {
        format!("{}::{}", self.provider_type.as_str(), self.model)
    }

    fn build_request(messages: &[LlmMessage], tools: &[ToolDefinition]) -> ChatRequest {
        let mut chat_req = ChatRequest::default();

        for msg in messages {
            chat_req = match msg {
                LlmMessage::System { content } => chat_req.append_message(ChatMessage::system(content)),
                LlmMessage::User { content } => chat_req.append_message(ChatMessage::user(content)),
                LlmMessage::Assistant { content } => chat_req.append_message(ChatMessage::assistant(content)),
                LlmMessage::AssistantToolCalls { tool_calls, .. } => {
                    // OpenAI-style APIs need every call of a turn in one assistant message
                    let genai_tool_calls: Vec<ToolCall> = tool_calls
                        .iter()
                        .map(|tc| ToolCall {
                            call_id: tc.call_id.clone(),
                            fn_name: tc.name.clone(),
                            fn_arguments: tc.arguments.clone(),
                            thought_signatures: None,
                        })
                        .collect();
                    chat_req.append_message(genai_tool_calls)
                }
                LlmMessage::ToolResult { call_id, content } => {
                    chat_req.append_message(ToolResponse::new(call_id.clone(), content.clone()))
                }
            };
        }

        if !tools.is_empty() {
            let genai_tools: Vec<Tool> = tools
                .iter()
                .map(|t| {
                    Tool::new(&t.name)
                        .with_description(&t.description)
                        .with_schema(t.parameters.clone())
                })
                .collect();
            chat_req = chat_req.with_tools(genai_tools);
        }

        chat_req
    }
}

#[async_trait]
impl ChatModel for GenAIProvider {
    fn provider(&self) -> &str {
        self.provider_type.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[LlmMessage], tools: &[ToolDefinition]) -> Result<CompletionResult> {
        let chat_req = Self::build_request(messages, tools);
        let options = ChatOptions::default()
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        // Stream to avoid request timeouts on long answers
        let stream_response = match self
            .client
            .exec_chat_stream(&self.model_spec(), chat_req, Some(&options))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let error_msg = format!("GenAI error: {:?}", e);
                log_llm_interaction(&self.model, messages, tools, None, Some(&error_msg));
                tracing::error!(error = ?e, model = %self.model, "LLM request failed");
                return Err(Error::Provider(error_msg));
            }
        };

        let mut content = String::new();
        let mut tool_calls: Vec<PendingToolCall> = Vec::new();
        let mut stream = stream_response.stream;

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    content.push_str(&chunk.content);
                }
                Ok(ChatStreamEvent::ToolCallChunk(tc)) => {
                    // Each ToolCallChunk contains a complete ToolCall
                    let tool_call = tc.tool_call;
                    tool_calls.push(PendingToolCall {
                        call_id: tool_call.call_id,
                        name: tool_call.fn_name,
                        arguments: tool_call.fn_arguments,
                    });
                }
                Ok(ChatStreamEvent::End(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    let error_msg = format!("GenAI stream error: {:?}", e);
                    log_llm_interaction(&self.model, messages, tools, None, Some(&error_msg));
                    tracing::error!(error = ?e, model = %self.model, "LLM stream error");
                    return Err(Error::Provider(error_msg));
                }
            }
        }

        let result = CompletionResult {
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls,
        };

        log_llm_interaction(&self.model, messages, tools, Some(&result), None);
        debug!(
            model = %self.model,
            tool_calls = result.tool_calls.len(),
            chars = result.content.as_ref().map(|c| c.len()).unwrap_or(0),
            "LLM completion finished"
        );

        Ok(result)
    }
}
