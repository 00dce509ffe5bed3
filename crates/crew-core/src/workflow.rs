//! Running a blueprint end to end: one crew for a topic, or one crew per
//! chunk for a transcript.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::blueprint::{Blueprint, InputKind, Vars};
use crate::config::CrewSettings;
use crate::crew::{Crew, CrewEvent, CrewOutput};
use crate::error::{Error, Result};
use crate::provider::ModelPool;
use crate::tools::ToolRegistry;
use crate::transcript::{chunk_header, split_into_chunks};

/// Everything a run needs besides the blueprint and its input
pub struct Workflow {
    registry: ToolRegistry,
    models: ModelPool,
    settings: CrewSettings,
    events: Option<UnboundedSender<CrewEvent>>,
}

/// Result of a transcript run
#[derive(Debug, Clone, Default)]
pub struct TranscriptOutput {
    pub total_chunks: usize,
    /// Successful chunks as (1-based number, output)
    pub chunks: Vec<(usize, CrewOutput)>,
    /// Failed chunks as (1-based number, error message)
    pub failed: Vec<(usize, String)>,
}

impl TranscriptOutput {
    /// All chunk analyses, each under its `CHUNK i/n ANALYSIS:` header
    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .map(|(number, output)| chunk_header(*number, self.total_chunks, &output.raw()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Workflow {
    pub fn new(registry: ToolRegistry, models: ModelPool, settings: CrewSettings) -> Self {
        Self {
            registry,
            models,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, sender: UnboundedSender<CrewEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn crew_for(&self, blueprint: &Blueprint, vars: &Vars, models: &ModelPool) -> Result<Crew> {
        let crew = blueprint
            .build_crew(vars, &self.registry, models)?
            .with_settings(&self.settings);
        Ok(match &self.events {
            Some(tx) => crew.with_events(tx.clone()),
            None => crew,
        })
    }

    fn emit(&self, event: CrewEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Run a topic blueprint, retrying failed or empty runs.
    ///
    /// When every attempt fails and a fallback model is set (on the
    /// blueprint, else in the settings), the crew is rebuilt with every
    /// agent on that model and gets a fresh set of attempts.
    pub async fn run_topic(&self, blueprint: &Blueprint, topic: &str) -> Result<CrewOutput> {
        if blueprint.input != InputKind::Topic {
            return Err(Error::Blueprint(format!("blueprint '{}' expects a transcript", blueprint.name)));
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::Blueprint("research topic must not be empty".into()));
        }

        info!(blueprint = %blueprint.name, topic, "Starting research");
        let vars = Vars::topic(topic);
        let backoff = Duration::from_secs(self.settings.retry_backoff_secs);
        let crew = self.crew_for(blueprint, &vars, &self.models)?;
        let error = match crew.kickoff_with_retry(self.settings.max_attempts, backoff).await {
            Ok(output) => return Ok(output),
            Err(e) => e,
        };

        let fallback = blueprint
            .fallback_model
            .as_deref()
            .or(self.settings.fallback_model.as_deref());
        let Some(fallback) = fallback else {
            return Err(error);
        };
        if matches!(error, Error::Cancelled) {
            return Err(error);
        }

        warn!(error = %error, fallback, "All attempts failed, switching every agent to the fallback model");
        let crew = match self.crew_for(blueprint, &vars, &self.models.with_override(fallback)) {
            Ok(crew) => crew,
            Err(e) => {
                warn!(fallback, error = %e, "Fallback model unavailable");
                return Err(error);
            }
        };
        self.emit(CrewEvent::FallbackStarted {
            model: fallback.to_string(),
        });
        crew.kickoff_with_retry(self.settings.max_attempts, backoff).await
    }

    /// Analyze a transcript chunk by chunk.
    ///
    /// A chunk whose crew fails is logged and skipped. The run only fails when
    /// no chunk produced any output.
    pub async fn run_transcript(&self, blueprint: &Blueprint, transcript: &str) -> Result<TranscriptOutput> {
        if blueprint.input != InputKind::Transcript {
            return Err(Error::Blueprint(format!("blueprint '{}' expects a topic", blueprint.name)));
        }

        let chunks: Vec<String> = split_into_chunks(transcript, blueprint.chunk_paragraphs)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(Error::Blueprint("transcript is empty".into()));
        }

        let total = chunks.len();
        info!(blueprint = %blueprint.name, chunks = total, "Split transcript");
        let mut result = TranscriptOutput {
            total_chunks: total,
            ..Default::default()
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let number = i + 1;
            self.emit(CrewEvent::ChunkStarted { number, total });

            let outcome = match self.crew_for(blueprint, &Vars::chunk(chunk, number, total), &self.models) {
                Ok(crew) => crew.kickoff().await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(output) if !output.is_empty() => result.chunks.push((number, output)),
                Ok(_) => {
                    warn!(chunk = number, total, "Chunk produced no output");
                    result.failed.push((number, Error::EmptyOutput.to_string()));
                }
                Err(e) => {
                    warn!(chunk = number, total, error = %e, "Chunk analysis failed, skipping");
                    result.failed.push((number, e.to_string()));
                }
            }
        }

        if result.chunks.is_empty() {
            return Err(Error::EmptyOutput);
        }
        Ok(result)
    }
}
