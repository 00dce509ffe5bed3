//! The crew: runs a fixed list of tasks once, in order, each with its
//! agent's model and tools.
//!
//! A task is a small tool-calling loop. The agent's model gets the system
//! prompt and the task prompt; whenever it asks for tools the crew runs them
//! and feeds the results back, until the model answers in plain text or the
//! turn budget runs out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::config::CrewSettings;
use crate::error::{Error, Result};
use crate::provider::{CompletionResult, LlmMessage, PendingToolCall};
use crate::report::{truncate_str, AGENT_MARKER};
use crate::task::{Task, TaskOutput};

/// Tool output larger than this is cut before it reaches the model
const MAX_TOOL_RESULT_CHARS: usize = 12_000;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// How tasks are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// Each task once, in declaration order
    #[default]
    Sequential,
}

/// Progress notifications emitted while a crew runs
#[derive(Debug, Clone, PartialEq)]
pub enum CrewEvent {
    /// A transcript chunk is about to be analyzed by a fresh crew
    ChunkStarted {
        number: usize,
        total: usize,
    },
    /// Every attempt failed; the crew is rebuilt on the fallback model
    FallbackStarted {
        model: String,
    },
    TaskStarted {
        index: usize,
        total: usize,
        agent: String,
        description: String,
    },
    ToolStarted {
        index: usize,
        agent: String,
        tool: String,
        input: Value,
    },
    ToolFinished {
        index: usize,
        agent: String,
        tool: String,
        success: bool,
    },
    TaskCompleted {
        index: usize,
        agent: String,
        output: String,
        duration: Duration,
    },
    TaskFailed {
        index: usize,
        agent: String,
        error: String,
    },
}

/// Sliding-window limiter on LLM requests per minute
struct RateLimiter {
    max_per_minute: u32,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self) {
        if self.max_per_minute == 0 {
            return;
        }

        loop {
            let wait_until = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();
                while sent.front().is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW) {
                    sent.pop_front();
                }
                if sent.len() < self.max_per_minute as usize {
                    sent.push_back(now);
                    return;
                }
                match sent.front() {
                    Some(oldest) => *oldest + RATE_WINDOW,
                    None => return,
                }
            };
            debug!(max_rpm = self.max_per_minute, "Rate limit reached, waiting");
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

/// A sequential crew of agents and tasks
pub struct Crew {
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    process: Process,
    max_turns: u32,
    limiter: RateLimiter,
    events: Option<UnboundedSender<CrewEvent>>,
}

impl Crew {
    /// Build a crew, checking that every task names a known agent and only
    /// uses earlier tasks as context.
    pub fn new(agents: Vec<Agent>, tasks: Vec<Task>) -> Result<Self> {
        if agents.is_empty() {
            return Err(Error::Task("a crew needs at least one agent".into()));
        }
        if tasks.is_empty() {
            return Err(Error::Task("a crew needs at least one task".into()));
        }

        let mut roles = HashSet::new();
        for agent in &agents {
            if !roles.insert(agent.role()) {
                return Err(Error::Agent(format!("duplicate agent role '{}'", agent.role())));
            }
        }

        for (index, task) in tasks.iter().enumerate() {
            task.validate(index)?;
            if !roles.contains(task.agent.as_str()) {
                return Err(Error::Task(format!(
                    "task {} is assigned to unknown agent '{}'",
                    index + 1,
                    task.agent
                )));
            }
        }

        let defaults = CrewSettings::default();
        Ok(Self {
            agents,
            tasks,
            process: Process::Sequential,
            max_turns: defaults.max_turns,
            limiter: RateLimiter::new(defaults.max_rpm),
            events: None,
        })
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_max_rpm(mut self, max_rpm: u32) -> Self {
        self.limiter = RateLimiter::new(max_rpm);
        self
    }

    pub fn with_settings(self, settings: &CrewSettings) -> Self {
        self.with_max_turns(settings.max_turns)
            .with_max_rpm(settings.max_rpm)
    }

    /// Send progress events to `sender`
    pub fn with_events(mut self, sender: UnboundedSender<CrewEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn process(&self) -> Process {
        self.process
    }

    fn emit(&self, event: CrewEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is watching; keep running
            let _ = tx.send(event);
        }
    }

    fn agent_for(&self, task: &Task) -> Result<&Agent> {
        self.agents
            .iter()
            .find(|a| a.role() == task.agent)
            .ok_or_else(|| Error::Task(format!("unknown agent '{}'", task.agent)))
    }

    /// Run every task once, in order
    pub async fn kickoff(&self) -> Result<CrewOutput> {
        let total = self.tasks.len();
        let mut completed: Vec<TaskOutput> = Vec::with_capacity(total);
        info!(tasks = total, process = ?self.process, "Crew kickoff");

        for (index, task) in self.tasks.iter().enumerate() {
            let agent = self.agent_for(task)?;
            self.emit(CrewEvent::TaskStarted {
                index,
                total,
                agent: agent.role().to_string(),
                description: task.summary(120),
            });

            let started = Instant::now();
            match self.run_task(index, task, agent, &completed).await {
                Ok((raw, tool_calls)) => {
                    let duration = started.elapsed();
                    info!(task = index + 1, agent = agent.role(), tool_calls, ?duration, "Task completed");
                    self.emit(CrewEvent::TaskCompleted {
                        index,
                        agent: agent.role().to_string(),
                        output: raw.clone(),
                        duration,
                    });
                    completed.push(TaskOutput {
                        task_index: index,
                        agent_role: agent.role().to_string(),
                        description: task.summary(200),
                        raw,
                        tool_calls,
                        duration,
                    });
                }
                Err(e) => {
                    warn!(task = index + 1, agent = agent.role(), error = %e, "Task failed");
                    self.emit(CrewEvent::TaskFailed {
                        index,
                        agent: agent.role().to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        Ok(CrewOutput { tasks: completed })
    }

    /// Kick off up to `max_attempts` times.
    ///
    /// An error or a blank result counts as a failed attempt. Attempt `n`
    /// is followed by a pause of `backoff * n`.
    pub async fn kickoff_with_retry(&self, max_attempts: u32, backoff: Duration) -> Result<CrewOutput> {
        let attempts = max_attempts.max(1);
        let mut last_error = Error::EmptyOutput;

        for attempt in 1..=attempts {
            match self.kickoff().await {
                Ok(output) if !output.is_empty() => return Ok(output),
                Ok(_) => {
                    warn!(attempt, attempts, "Crew returned an empty result");
                    last_error = Error::EmptyOutput;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Crew run failed");
                    last_error = e;
                }
            }

            if attempt < attempts {
                info!(next_attempt = attempt + 1, attempts, "Retrying crew");
                tokio::time::sleep(backoff * attempt).await;
            }
        }

        Err(last_error)
    }

    async fn run_task(
        &self,
        index: usize,
        task: &Task,
        agent: &Agent,
        completed: &[TaskOutput],
    ) -> Result<(String, usize)> {
        let tools = agent.tool_definitions();
        let mut messages = vec![
            LlmMessage::system(agent.system_prompt()),
            LlmMessage::user(task.render_prompt(completed)),
        ];
        let mut tool_calls = 0usize;

        for turn in 1..=self.max_turns {
            self.limiter.acquire().await;
            let result = agent.llm().chat(&messages, &tools).await?;
            debug!(task = index + 1, turn, tool_calls = result.tool_calls.len(), "Model turn");

            if !result.has_tool_calls() {
                if let Some(answer) = final_answer(&result) {
                    return Ok((answer, tool_calls));
                }
                messages.push(LlmMessage::user(
                    "Your reply was empty. Give your complete final answer now.",
                ));
                continue;
            }

            messages.push(LlmMessage::assistant_with_tool_calls(
                result.content.clone(),
                result.tool_calls.clone(),
            ));
            for call in &result.tool_calls {
                tool_calls += 1;
                let text = self.run_tool(index, agent, call).await;
                messages.push(LlmMessage::tool_result(call.call_id.clone(), text));
            }
        }

        // Out of turns: one last request that must be the answer. Tools stay
        // declared because the history already contains tool calls.
        warn!(task = index + 1, max_turns = self.max_turns, "Turn budget used up, asking for final answer");
        messages.push(LlmMessage::user(
            "You have reached the maximum number of steps. Do not call any more tools; \
             give your best complete final answer now.",
        ));
        self.limiter.acquire().await;
        let result = agent.llm().chat(&messages, &tools).await?;
        final_answer(&result)
            .map(|answer| (answer, tool_calls))
            .ok_or_else(|| {
                Error::Task(format!(
                    "agent '{}' gave no final answer within {} turns",
                    agent.role(),
                    self.max_turns
                ))
            })
    }

    /// Run one tool call; failures become text for the model to read
    async fn run_tool(&self, index: usize, agent: &Agent, call: &PendingToolCall) -> String {
        self.emit(CrewEvent::ToolStarted {
            index,
            agent: agent.role().to_string(),
            tool: call.name.clone(),
            input: call.arguments.clone(),
        });
        info!(agent = agent.role(), tool = %call.name, input = %call.arguments, "Using tool");

        let (success, text) = match agent.tool(&call.name) {
            None => (
                false,
                format!(
                    "Error: tool '{}' is not available. Available tools: {}",
                    call.name,
                    agent.tool_names().join(", ")
                ),
            ),
            Some(tool) => match tool.execute(call.arguments.clone()).await {
                Ok(output) if output.success => (true, output.content),
                Ok(output) => (false, format!("Error: {}", output.content)),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool failed");
                    (false, format!("Error: {}", e))
                }
            },
        };

        self.emit(CrewEvent::ToolFinished {
            index,
            agent: agent.role().to_string(),
            tool: call.name.clone(),
            success,
        });
        truncate_str(&text, MAX_TOOL_RESULT_CHARS)
    }
}

fn final_answer(result: &CompletionResult) -> Option<String> {
    result
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Outputs of a finished crew, in task order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewOutput {
    pub tasks: Vec<TaskOutput>,
}

impl CrewOutput {
    /// The last task's answer
    pub fn final_output(&self) -> Option<&str> {
        self.tasks.last().map(|t| t.raw.as_str())
    }

    /// True when no task produced any text
    pub fn is_empty(&self) -> bool {
        self.tasks.iter().all(|t| t.raw.trim().is_empty())
    }

    pub fn total_duration(&self) -> Duration {
        self.tasks.iter().map(|t| t.duration).sum()
    }

    /// Full transcript with one `# Agent:` section per task
    pub fn raw(&self) -> String {
        self.tasks
            .iter()
            .map(|t| {
                format!(
                    "{} {}\n## Task: {}\n\n## Final Answer:\n{}\n",
                    AGENT_MARKER,
                    t.agent_role,
                    t.description,
                    t.raw.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_waits_for_window() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= RATE_WINDOW);
    }

    #[tokio::test]
    async fn test_rate_limiter_disabled() {
        let limiter = RateLimiter::new(0);
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(limiter.sent.lock().await.is_empty());
    }

    #[test]
    fn test_crew_output_raw_sections() {
        let output = CrewOutput {
            tasks: vec![
                TaskOutput {
                    task_index: 0,
                    agent_role: "Topic Analyzer".into(),
                    description: "Analyze urban farming".into(),
                    raw: "Key aspects...\n".into(),
                    tool_calls: 0,
                    duration: Duration::from_secs(1),
                },
                TaskOutput {
                    task_index: 1,
                    agent_role: "Expert Finder".into(),
                    description: "Find guests".into(),
                    raw: "1. Dr. A".into(),
                    tool_calls: 2,
                    duration: Duration::from_secs(2),
                },
            ],
        };

        let raw = output.raw();
        assert!(raw.starts_with("# Agent: Topic Analyzer\n## Task: Analyze urban farming"));
        assert!(raw.contains("## Final Answer:\nKey aspects...\n"));
        assert_eq!(raw.matches("# Agent:").count(), 2);
        assert_eq!(output.final_output(), Some("1. Dr. A"));
        assert_eq!(output.total_duration(), Duration::from_secs(3));
        assert!(!output.is_empty());
    }
}
