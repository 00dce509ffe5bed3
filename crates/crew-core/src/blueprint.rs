//! Crew blueprints: agents and tasks described as TOML data.
//!
//! A blueprint names its agents (role, goal, backstory, tools, model) and the
//! tasks they run in order. Text fields may contain placeholders that are
//! filled in per run:
//!
//! | placeholder      | value                                 |
//! |------------------|---------------------------------------|
//! | `{topic}`        | the research topic                    |
//! | `{chunk}`        | the transcript chunk being analyzed   |
//! | `{chunk_number}` | 1-based number of that chunk          |
//! | `{total_chunks}` | how many chunks the transcript has    |
//!
//! Four blueprints are compiled in; others can be loaded from disk.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::agent::Agent;
use crate::crew::Crew;
use crate::error::{Error, Result};
use crate::provider::{self, ModelPool};
use crate::report;
use crate::task::Task;
use crate::tools::{search, ToolRegistry};
use crate::transcript::DEFAULT_PARAGRAPHS_PER_CHUNK;

const BUILTINS: &[(&str, &str)] = &[
    ("guest-finder", include_str!("blueprints/guest-finder.toml")),
    ("visual-enhancement", include_str!("blueprints/visual-enhancement.toml")),
    ("history-research", include_str!("blueprints/history-research.toml")),
    ("history-research-lite", include_str!("blueprints/history-research-lite.toml")),
    ("history-crew", include_str!("blueprints/history-crew.toml")),
];

/// What a blueprint takes as input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// A short topic string, one crew run
    Topic,
    /// A transcript, one crew run per chunk
    Transcript,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Preset, provider or provider/model; the configured default when unset
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
    /// Role of the agent running the task
    pub agent: String,
    /// 0-based indices of earlier tasks
    #[serde(default)]
    pub context: Vec<usize>,
}

/// A crew described as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub input: InputKind,
    /// `research`, `guests` or a literal file name
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default = "default_chunk_paragraphs")]
    pub chunk_paragraphs: usize,
    /// Model every agent is rebuilt on when a topic run fails all attempts
    #[serde(default)]
    pub fallback_model: Option<String>,
    pub agents: Vec<AgentSpec>,
    pub tasks: Vec<TaskSpec>,
}

fn default_chunk_paragraphs() -> usize {
    DEFAULT_PARAGRAPHS_PER_CHUNK
}

impl Blueprint {
    /// Parse and validate a TOML blueprint
    pub fn parse(source: &str) -> Result<Self> {
        let blueprint: Blueprint =
            toml::from_str(source).map_err(|e| Error::Blueprint(format!("invalid blueprint: {}", e)))?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source).map_err(|e| Error::Blueprint(format!("{}: {}", path.display(), e)))
    }

    /// A compiled-in blueprint by name
    pub fn builtin(name: &str) -> Result<Self> {
        let (_, source) = BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| {
                Error::Blueprint(format!(
                    "unknown blueprint '{}'. Built-in blueprints: {}",
                    name,
                    builtin_names().join(", ")
                ))
            })?;
        Self::parse(source)
    }

    /// Built-in name first, then a path on disk
    pub fn find(name_or_path: &str) -> Result<Self> {
        if BUILTINS.iter().any(|(n, _)| *n == name_or_path) {
            return Self::builtin(name_or_path);
        }
        let path = Path::new(name_or_path);
        if path.exists() {
            return Self::load(path);
        }
        Self::builtin(name_or_path)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Blueprint("blueprint name must not be empty".into()));
        }
        if self.agents.is_empty() || self.tasks.is_empty() {
            return Err(Error::Blueprint(format!(
                "blueprint '{}' needs at least one agent and one task",
                self.name
            )));
        }
        if self.chunk_paragraphs == 0 {
            return Err(Error::Blueprint("chunk_paragraphs must be at least 1".into()));
        }
        if let Some(fallback) = &self.fallback_model {
            provider::resolve(fallback)
                .map_err(|e| Error::Blueprint(format!("fallback_model '{}': {}", fallback, e)))?;
        }

        let mut roles = HashSet::new();
        for agent in &self.agents {
            for (field, value) in [("role", &agent.role), ("goal", &agent.goal), ("backstory", &agent.backstory)] {
                if value.trim().is_empty() {
                    return Err(Error::Blueprint(format!(
                        "agent '{}' in '{}' has an empty {}",
                        agent.role, self.name, field
                    )));
                }
            }
            if !roles.insert(agent.role.as_str()) {
                return Err(Error::Blueprint(format!("duplicate agent role '{}'", agent.role)));
            }
        }

        for (index, task) in self.tasks.iter().enumerate() {
            if !roles.contains(task.agent.as_str()) {
                return Err(Error::Blueprint(format!(
                    "task {} refers to unknown agent '{}'",
                    index + 1,
                    task.agent
                )));
            }
            Task::new(&task.agent, &task.description, &task.expected_output)
                .with_context(task.context.iter().copied())
                .validate(index)
                .map_err(|e| Error::Blueprint(e.to_string()))?;
        }
        Ok(())
    }

    pub fn roles(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.role.as_str()).collect()
    }

    /// Keys a run needs: provider names for the agents' models and the
    /// environment variables of the search services their tools call.
    ///
    /// `override_spec` replaces every agent's model, as `--model` does.
    pub fn required_keys(&self, override_spec: Option<&str>, default_provider: &str) -> Result<Vec<&'static str>> {
        let mut keys: Vec<&'static str> = Vec::new();
        for agent in &self.agents {
            let spec = override_spec
                .or(agent.model.as_deref())
                .unwrap_or(default_provider);
            let provider = provider::resolve(spec)?.provider.as_str();
            let search = agent.tools.iter().filter_map(|t| search::api_key_env(t));
            for key in std::iter::once(provider).chain(search) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    /// Name of the file the result is saved to
    pub fn output_filename(&self, topic: Option<&str>) -> String {
        let topic = topic.unwrap_or("");
        match self.output_file.as_deref() {
            Some("research") => report::filename_from_topic(topic),
            Some("guests") => report::guest_filename(topic),
            Some(literal) if !literal.trim().is_empty() => literal.to_string(),
            _ => format!("{}_results.txt", self.name.replace('-', "_")),
        }
    }

    /// Instantiate agents and tasks with `vars` filled in
    pub fn build_crew(&self, vars: &Vars, registry: &ToolRegistry, models: &ModelPool) -> Result<Crew> {
        let required = match self.input {
            InputKind::Topic => "topic",
            InputKind::Transcript => "chunk",
        };
        if vars.get(required).is_none_or(|v| v.trim().is_empty()) {
            return Err(Error::Blueprint(format!(
                "blueprint '{}' needs a non-empty '{}'",
                self.name, required
            )));
        }

        let mut agents = Vec::with_capacity(self.agents.len());
        for spec in &self.agents {
            let agent = Agent::builder(vars.render(&spec.role))
                .goal(vars.render(&spec.goal))
                .backstory(vars.render(&spec.backstory))
                .tools(registry.select(spec.tools.as_slice())?)
                .llm(models.get_or_default(spec.model.as_deref())?)
                .build()?;
            debug!(role = agent.role(), model = agent.llm().model(), tools = ?agent.tool_names(), "Built agent");
            agents.push(agent);
        }

        let tasks = self
            .tasks
            .iter()
            .map(|spec| {
                Task::new(
                    vars.render(&spec.agent),
                    vars.render(&spec.description),
                    vars.render(&spec.expected_output),
                )
                .with_context(spec.context.iter().copied())
            })
            .collect();

        Crew::new(agents, tasks)
    }
}

/// Names of the compiled-in blueprints
pub fn builtin_names() -> Vec<&'static str> {
    BUILTINS.iter().map(|(name, _)| *name).collect()
}

/// Placeholder values for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars {
    values: BTreeMap<String, String>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(topic: &str) -> Self {
        Self::new().set("topic", topic.trim())
    }

    pub fn chunk(chunk: &str, number: usize, total: usize) -> Self {
        Self::new()
            .set("chunk", chunk)
            .set("chunk_number", number.to_string())
            .set("total_chunks", total.to_string())
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replace every `{key}` in one pass over `template`.
    ///
    /// Unknown placeholders stay as written, and substituted values are
    /// never expanded again.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let known = after
                .find('}')
                .and_then(|close| self.values.get(&after[..close]).map(|value| (close, value)));
            match known {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
