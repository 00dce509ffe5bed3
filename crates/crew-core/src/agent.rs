//! Agents: a role, a goal, a backstory, the tools the agent may call and
//! the model that does its thinking.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::provider::ChatModel;
use crate::tools::{Tool, ToolDefinition};

/// A configured crew member
#[derive(Clone)]
pub struct Agent {
    role: String,
    goal: String,
    backstory: String,
    tools: Vec<Arc<dyn Tool>>,
    llm: Arc<dyn ChatModel>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("tools", &self.tool_names())
            .field("model", &self.llm.model())
            .finish()
    }
}

impl Agent {
    pub fn builder(role: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            tools: Vec::new(),
            llm: None,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn llm(&self) -> &Arc<dyn ChatModel> {
        &self.llm
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Look up one of this agent's own tools
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// System prompt that puts the model in character
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        );

        if self.tools.is_empty() {
            prompt.push_str("\n\nYou have no tools; answer from your own knowledge and the context provided.");
        } else {
            prompt.push_str("\n\nYou can call these tools when you need current information:\n");
            for tool in &self.tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
            prompt.push_str("Only use a tool when it helps; cite the links you rely on.");
        }

        prompt.push_str(
            "\n\nWhen you are done, reply with your complete final answer only. \
             It must satisfy the expected output you were given.",
        );
        prompt
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    role: String,
    goal: String,
    backstory: String,
    tools: Vec<Arc<dyn Tool>>,
    llm: Option<Arc<dyn ChatModel>>,
}

impl AgentBuilder {
    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn ChatModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Validate and build. Role, goal and backstory must be non-empty and a
    /// model must be set.
    pub fn build(self) -> Result<Agent> {
        let role = collapse_whitespace(&self.role);
        if role.is_empty() {
            return Err(Error::Agent("agent role must not be empty".into()));
        }
        let goal = collapse_whitespace(&self.goal);
        if goal.is_empty() {
            return Err(Error::Agent(format!("agent '{}' has an empty goal", role)));
        }
        let backstory = collapse_whitespace(&self.backstory);
        if backstory.is_empty() {
            return Err(Error::Agent(format!("agent '{}' has an empty backstory", role)));
        }
        let llm = self
            .llm
            .ok_or_else(|| Error::Agent(format!("agent '{}' has no model", role)))?;

        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name().to_string()) {
                return Err(Error::Agent(format!(
                    "agent '{}' lists tool '{}' twice",
                    role,
                    tool.name()
                )));
            }
        }

        Ok(Agent {
            role,
            goal,
            backstory,
            tools: self.tools,
            llm,
        })
    }
}

/// Fold indentation and line breaks from multi-line prompt text into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionResult, LlmMessage};
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ChatModel for Silent {
        fn provider(&self) -> &str {
            "test"
        }

        fn model(&self) -> &str {
            "silent"
        }

        async fn chat(&self, _: &[LlmMessage], _: &[ToolDefinition]) -> Result<CompletionResult> {
            Ok(CompletionResult::default())
        }
    }

    #[test]
    fn test_build_collapses_prompt_whitespace() {
        let agent = Agent::builder("Topic Analyzer")
            .goal("Analyze the topic\n        and find angles")
            .backstory("Expert at breaking down topics.")
            .llm(Arc::new(Silent))
            .build()
            .unwrap();

        assert_eq!(agent.goal(), "Analyze the topic and find angles");
        let prompt = agent.system_prompt();
        assert!(prompt.starts_with("You are Topic Analyzer."));
        assert!(prompt.contains("no tools"));
    }

    #[test]
    fn test_build_rejects_empty_fields() {
        let err = Agent::builder("  ")
            .goal("g")
            .backstory("b")
            .llm(Arc::new(Silent))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Agent(_)));

        let err = Agent::builder("Expert Finder")
            .goal("g")
            .llm(Arc::new(Silent))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("backstory"));

        let err = Agent::builder("Expert Finder")
            .goal("g")
            .backstory("b")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no model"));
    }
}
