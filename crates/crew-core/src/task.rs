//! Tasks: what an agent must do, what the answer should look like and which
//! earlier task outputs it reads as context.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::agent::collapse_whitespace;
use crate::error::{Error, Result};

/// One step of a crew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    pub expected_output: String,
    /// Role of the agent that performs the task
    pub agent: String,
    /// Indices of earlier tasks whose output is handed over as context
    #[serde(default)]
    pub context: Vec<usize>,
}

impl Task {
    pub fn new(
        agent: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl IntoIterator<Item = usize>) -> Self {
        self.context = context.into_iter().collect();
        self
    }

    /// Check required fields and that context only points backwards
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::Task(format!("task {} has an empty description", index + 1)));
        }
        if self.expected_output.trim().is_empty() {
            return Err(Error::Task(format!("task {} has an empty expected output", index + 1)));
        }
        if self.agent.trim().is_empty() {
            return Err(Error::Task(format!("task {} has no agent", index + 1)));
        }
        if let Some(bad) = self.context.iter().find(|&&c| c >= index) {
            return Err(Error::Task(format!(
                "task {} uses task {} as context, but context must come from an earlier task",
                index + 1,
                bad + 1
            )));
        }
        Ok(())
    }

    /// Short one-line label for progress output
    pub fn summary(&self, max: usize) -> String {
        crate::report::truncate_str(&collapse_whitespace(&self.description), max)
    }

    /// User message for the agent: the task, the expected output and the
    /// outputs of the context tasks.
    pub fn render_prompt(&self, completed: &[TaskOutput]) -> String {
        let mut prompt = format!(
            "Current task: {}\n\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.",
            self.description.trim(),
            self.expected_output.trim()
        );

        let context: Vec<&TaskOutput> = self
            .context
            .iter()
            .filter_map(|&i| completed.iter().find(|o| o.task_index == i))
            .collect();

        if !context.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            for output in context {
                prompt.push_str(&format!(
                    "\n### Output of {} (task {})\n{}\n",
                    output.agent_role,
                    output.task_index + 1,
                    output.raw.trim()
                ));
            }
        }

        prompt
    }
}

/// Result of a finished task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task_index: usize,
    pub agent_role: String,
    pub description: String,
    pub raw: String,
    /// Tool calls made while working on the task
    pub tool_calls: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
