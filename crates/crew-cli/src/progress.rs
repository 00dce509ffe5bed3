//! Live progress for crew runs, driven by `CrewEvent`s

use std::time::Duration;

use console::style;
use crew_core::report::truncate_str;
use crew_core::CrewEvent;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Render events until every sender is dropped
pub async fn render(mut events: UnboundedReceiver<CrewEvent>, verbose: bool) {
    let bar = spinner();
    bar.set_message("Assembling crew...");

    while let Some(event) = events.recv().await {
        match event {
            CrewEvent::ChunkStarted { number, total } => {
                bar.println(format!(
                    "\n{}",
                    style(format!("Chunk {}/{}", number, total)).bold().cyan()
                ));
            }
            CrewEvent::FallbackStarted { model } => {
                bar.println(format!(
                    "{} {}",
                    style("↻").yellow().bold(),
                    style(format!("Retrying with every agent on {}", model)).yellow()
                ));
            }
            CrewEvent::TaskStarted { index, total, agent, description } => {
                bar.set_message(format!(
                    "[{}/{}] {} {}",
                    index + 1,
                    total,
                    style(&agent).bold(),
                    style(truncate_str(&description, 60)).dim()
                ));
            }
            CrewEvent::ToolStarted { tool, input, .. } => {
                let args = if verbose {
                    serde_json::to_string(&input).unwrap_or_default()
                } else {
                    input
                        .get("query")
                        .and_then(|q| q.as_str())
                        .map(|q| format!("\"{}\"", truncate_str(q, 60)))
                        .unwrap_or_default()
                };
                bar.println(format!("  {} {} {}", style("[Searching:").dim(), style(&tool).yellow(), style(args).dim()));
            }
            CrewEvent::ToolFinished { tool, success, .. } => {
                if success {
                    bar.println(format!("  {} {}", style("✓").green(), style(format!("{} completed", tool)).dim()));
                } else {
                    bar.println(format!("  {} {}", style("✗").red(), style(format!("{} failed", tool)).dim()));
                }
            }
            CrewEvent::TaskCompleted { agent, output, duration, .. } => {
                bar.println(format!(
                    "{} {} {}",
                    style("✓").green().bold(),
                    style(&agent).green(),
                    style(format!("({:.1}s, {} words)", duration.as_secs_f64(), output.split_whitespace().count())).dim()
                ));
            }
            CrewEvent::TaskFailed { agent, error, .. } => {
                bar.println(format!("{} {}: {}", style("✗").red().bold(), style(&agent).red(), error));
            }
        }
    }

    bar.finish_and_clear();
}
