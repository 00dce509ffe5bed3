//! Crew Core - sequential multi-agent research crews
//!
//! This crate provides the pieces the `research-crew` CLI is built from:
//! - Agents (role, goal, backstory, tools, model) and the tasks they run
//! - A sequential crew executor with tool calling, rate limiting and retries
//! - Web search tools over SerpAPI, SearchAPI.io and Serper
//! - LLM providers (Anthropic, OpenAI, Groq) through genai
//! - Crew blueprints, transcript chunking and report helpers

pub mod agent;
pub mod blueprint;
pub mod config;
pub mod crew;
pub mod error;
pub mod provider;
pub mod report;
pub mod task;
pub mod tools;
pub mod transcript;
pub mod workflow;

pub use agent::{Agent, AgentBuilder};
pub use blueprint::{builtin_names, Blueprint, InputKind, Vars};
pub use config::{Config, ConfigManager, CrewSettings, ProviderConfig, SearchConfig};
pub use crew::{Crew, CrewEvent, CrewOutput, Process};
pub use error::{Error, Result, ToolError};
pub use provider::{ChatModel, CompletionResult, GenAIProvider, LlmMessage, ModelPool, PendingToolCall, ProviderType};
pub use report::{ReportStats, Section};
pub use task::{Task, TaskOutput};
pub use tools::{standard_registry, Tool, ToolDefinition, ToolOutput, ToolRegistry};
pub use workflow::{TranscriptOutput, Workflow};
