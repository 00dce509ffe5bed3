//! Research Crew CLI - run multi-agent research crews from the terminal
//!
//! Crews are described by blueprints. Built-in blueprints cover podcast
//! guest finding, transcript visual enhancement and history research.

mod progress;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crew_core::config::{SEARCHAPI_KEY_ENV, SERPAPI_KEY_ENV, SERPER_KEY_ENV};
use crew_core::report::{self, attribute, ReportStats};
use crew_core::tools::search;
use crew_core::{
    builtin_names, standard_registry, Blueprint, ChatModel, ConfigManager, InputKind, ModelPool, ProviderType,
    Workflow,
};

#[derive(Parser)]
#[command(name = "research-crew")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-agent research crews for podcasts and history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crew blueprint
    Run {
        /// Built-in blueprint name or path to a blueprint TOML file
        blueprint: String,

        /// Research topic (for topic blueprints)
        #[arg(short, long)]
        topic: Option<String>,

        /// Transcript file (for transcript blueprints)
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Write the result here instead of the blueprint's default file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// LLM provider for every agent (anthropic, openai, groq)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model for every agent (preset name or provider/model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List built-in blueprints
    List,

    /// Show available tools
    Tools,

    /// Show configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },

    /// Check that configured providers answer
    Check {
        /// Only check this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            cli.verbose,
            rust_log.as_deref(),
            &config_manager.config().general.log_level,
        ))
        .init();

    match cli.command {
        Commands::Run {
            blueprint,
            topic,
            transcript,
            output,
            provider,
            model,
        } => {
            let request = RunRequest {
                blueprint,
                topic,
                transcript,
                output,
                override_spec: override_spec(provider.as_deref(), model.as_deref()),
                verbose: cli.verbose,
            };
            run(&config_manager, request).await?
        }
        Commands::List => list_blueprints()?,
        Commands::Tools => show_tools(&config_manager),
        Commands::Config { init } => {
            if init {
                init_config(&mut config_manager)?;
            }
            show_config(&config_manager);
        }
        Commands::Check { provider } => check_providers(&config_manager, provider.as_deref()).await?,
    }

    Ok(())
}

struct RunRequest {
    blueprint: String,
    topic: Option<String>,
    transcript: Option<PathBuf>,
    output: Option<PathBuf>,
    override_spec: Option<String>,
    verbose: bool,
}

/// Combine `--provider` and `--model` into one model spec
fn override_spec(provider: Option<&str>, model: Option<&str>) -> Option<String> {
    match (provider, model) {
        (Some(provider), Some(model)) if !model.contains('/') && !model.contains("::") => {
            Some(format!("{}/{}", provider, model))
        }
        (_, Some(model)) => Some(model.to_string()),
        (Some(provider), None) => Some(provider.to_string()),
        (None, None) => None,
    }
}

async fn run(config_manager: &ConfigManager, request: RunRequest) -> anyhow::Result<()> {
    let blueprint = Blueprint::find(&request.blueprint)?;
    let config = config_manager.config();

    debug!(blueprint = %blueprint.name, override_spec = ?request.override_spec, "Loaded blueprint");

    let required = blueprint.required_keys(request.override_spec.as_deref(), &config.default_provider)?;
    let missing = config_manager.missing_keys(&required);
    if !missing.is_empty() {
        show_missing_keys(&missing, config_manager.path());
        bail!("missing API keys: {}", missing.join(", "));
    }

    println!("{} {}", style("▶").cyan().bold(), style(&blueprint.title).bold());
    if !blueprint.description.is_empty() {
        println!("  {}", style(&blueprint.description).dim());
    }
    println!();

    // Read the input before anything starts running
    let input = match blueprint.input {
        InputKind::Topic => match request.topic.as_deref() {
            Some(topic) => topic.to_string(),
            None => bail!("blueprint '{}' needs --topic", blueprint.name),
        },
        InputKind::Transcript => match request.transcript.as_deref() {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read transcript {}", path.display()))?,
            None => bail!("blueprint '{}' needs --transcript", blueprint.name),
        },
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let workflow = Workflow::new(
        standard_registry(&config.search),
        ModelPool::from_config(config.clone(), request.override_spec.clone()),
        config.crew.clone(),
    )
    .with_events(tx);
    let renderer = tokio::spawn(progress::render(rx, request.verbose));

    let (text, topic, failed) = match blueprint.input {
        InputKind::Topic => {
            let outcome = tokio::select! {
                result = workflow.run_topic(&blueprint, &input) => result,
                _ = tokio::signal::ctrl_c() => Err(crew_core::Error::Cancelled),
            };
            drop(workflow);
            let _ = renderer.await;
            (outcome?.raw(), Some(input.as_str()), Vec::new())
        }
        InputKind::Transcript => {
            let outcome = tokio::select! {
                result = workflow.run_transcript(&blueprint, &input) => result,
                _ = tokio::signal::ctrl_c() => Err(crew_core::Error::Cancelled),
            };
            drop(workflow);
            let _ = renderer.await;
            let outcome = outcome?;
            (outcome.text(), None, outcome.failed)
        }
    };

    let text = report::clean_output(&text);
    print_report(&blueprint, &text);

    let path = request.output.unwrap_or_else(|| {
        config
            .general
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(blueprint.output_filename(topic))
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = text.len(), "Saved result");

    let stats = ReportStats::of(&text);
    println!();
    println!("{}", style("Summary:").bold());
    println!("  Words:      {}", stats.words);
    println!("  Characters: {}", stats.chars);
    println!("  Sections:   {}", stats.sections);
    for (number, error) in &failed {
        println!("  {} chunk {} skipped: {}", style("✗").red(), number, style(error).dim());
    }
    println!();
    println!("{} Saved to {}", style("✓").green().bold(), style(path.display()).cyan());

    Ok(())
}

fn print_report(blueprint: &Blueprint, text: &str) {
    println!();
    match blueprint.input {
        InputKind::Topic => {
            let sections = attribute(text, &blueprint.roles());
            if sections.is_empty() {
                println!("{}", text);
            }
            for section in sections {
                println!("{}", style(format!("━━ {} ━━", section.agent)).cyan().bold());
                println!("{}", section.body.trim());
                println!();
            }
        }
        InputKind::Transcript => println!("{}", text),
    }
}

fn show_missing_keys(missing: &[&str], config_path: &Path) {
    println!("{}", style("Missing API keys:").red().bold());
    println!();
    for &name in missing {
        let env = match name.parse::<ProviderType>() {
            Ok(provider) => provider.api_key_env(),
            Err(_) => name,
        };
        println!("  {} {}", style("•").red(), style(env).yellow());
    }
    println!();
    println!("  Set them in the environment, a .env file, or {}", style(config_path.display()).cyan());
    println!();
}

fn list_blueprints() -> anyhow::Result<()> {
    println!("{}", style("Built-in Blueprints:").bold());
    println!();

    for name in builtin_names() {
        let blueprint = Blueprint::builtin(name)?;
        let input = match blueprint.input {
            InputKind::Topic => "--topic",
            InputKind::Transcript => "--transcript",
        };
        println!("  {:24} {} {}", style(name).cyan(), blueprint.title, style(format!("({})", input)).dim());
        println!("  {:24} {}", "", style(blueprint.roles().join(" → ")).dim());
    }

    println!();
    println!("Run with: {}", style("research-crew run <blueprint> --topic \"...\"").yellow());
    Ok(())
}

fn show_tools(config_manager: &ConfigManager) {
    println!("{}", style("Available Tools:").bold());
    println!();

    let registry = standard_registry(&config_manager.config().search);
    let mut tools = registry.list();
    tools.sort_by(|a, b| a.name.cmp(&b.name));

    for tool in tools {
        let key = search::api_key_env(&tool.name);
        let status = match key {
            Some(env) if config_manager.missing_keys(&[env]).is_empty() => style("✓").green(),
            Some(_) => style("✗").red(),
            None => style("-").dim(),
        };
        println!(
            "  {} {:22} {} {}",
            status,
            style(&tool.name).cyan(),
            tool.description,
            style(key.map(|k| format!("[{}]", k)).unwrap_or_default()).dim()
        );
    }
}

fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{}****", prefix)
}

fn key_status(key: Option<String>) -> String {
    match key {
        Some(k) => style(mask_key(&k)).green().to_string(),
        None => style("not set").red().to_string(),
    }
}

fn init_config(config_manager: &mut ConfigManager) -> anyhow::Result<()> {
    if config_manager.path().exists() {
        println!("{} Config already exists", style("•").dim());
        return Ok(());
    }
    config_manager.save()?;
    println!("{} Wrote {}", style("✓").green(), style(config_manager.path().display()).cyan());
    println!();
    Ok(())
}

fn show_config(config_manager: &ConfigManager) {
    let config = config_manager.config();

    println!("{}", style("Configuration:").bold());
    println!();
    println!("  Config file: {}", style(config_manager.path().display()).dim());
    println!("  Default provider: {}", style(&config.default_provider).green());
    println!(
        "  Output dir: {}",
        style(
            config
                .general
                .output_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| ".".to_string())
        )
        .dim()
    );
    println!();

    println!("{}", style("Providers:").bold());
    let mut names = config.list_providers();
    names.sort();
    for name in names {
        if let Some(provider) = config.get_provider(name) {
            println!(
                "  {:10} {:32} {}",
                style(name).cyan(),
                provider.model,
                key_status(config.api_key_for(name))
            );
        }
    }
    println!();

    println!("{}", style("Search:").bold());
    let search = &config.search;
    println!("  {:16} {}", SERPAPI_KEY_ENV, key_status(search.serpapi_key()));
    println!("  {:16} {}", SEARCHAPI_KEY_ENV, key_status(search.searchapi_key()));
    println!("  {:16} {}", SERPER_KEY_ENV, key_status(search.serper_key()));
    println!();

    println!("{}", style("Crew:").bold());
    println!("  Max turns per task: {}", config.crew.max_turns);
    println!("  Max requests/min:   {}", config.crew.max_rpm);
    println!("  Attempts:           {}", config.crew.max_attempts);
}

async fn check_providers(config_manager: &ConfigManager, only: Option<&str>) -> anyhow::Result<()> {
    let providers: Vec<ProviderType> = match only {
        Some(name) => vec![name.parse::<ProviderType>().map_err(|e| anyhow::anyhow!(e))?],
        None => ProviderType::ALL.to_vec(),
    };

    println!("{}", style("Provider check:").bold());
    println!();

    for provider in providers {
        let name = provider.as_str();
        if config_manager.get_api_key_for(name).is_none() {
            println!("  {} {:10} {}", style("-").dim(), name, style(format!("{} not set", provider.api_key_env())).dim());
            continue;
        }

        let pool = ModelPool::from_config(config_manager.config().clone(), None);
        let model = match pool.get(name) {
            Ok(model) => model,
            Err(e) => {
                println!("  {} {:10} {}", style("✗").red(), name, e);
                continue;
            }
        };

        let spinner = indicatif::ProgressBar::new_spinner();
        spinner.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Connecting to {}...", name));
        spinner.enable_steady_tick(Duration::from_millis(100));
        let healthy = model.health_check().await;
        spinner.finish_and_clear();

        if healthy {
            println!("  {} {:10} {}", style("✓").green().bold(), name, style(model.model()).dim());
        } else {
            println!("  {} {:10} {}", style("✗").red().bold(), name, style("no response (run with -v for details)").dim());
        }
    }

    Ok(())
}

/// `--verbose` wins, then `RUST_LOG`, then the configured level.
/// Unparseable directives fall back to "warn" so logs don't interleave with
/// progress output.
fn log_filter(verbose: bool, rust_log: Option<&str>, configured: &str) -> EnvFilter {
    if verbose {
        return EnvFilter::new("info,crew_core=debug");
    }
    [rust_log, Some(configured)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .find_map(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_precedence() {
        assert_eq!(log_filter(false, None, "debug").to_string(), "debug");
        assert_eq!(log_filter(false, Some("trace"), "debug").to_string(), "trace");
        assert_eq!(log_filter(false, Some("  "), "error").to_string(), "error");
        assert_eq!(log_filter(false, None, "crew_core=loud").to_string(), "warn");
        assert!(log_filter(true, Some("error"), "error").to_string().contains("crew_core=debug"));
    }

    #[test]
    fn test_override_spec() {
        assert_eq!(override_spec(None, None), None);
        assert_eq!(override_spec(Some("groq"), None).as_deref(), Some("groq"));
        assert_eq!(override_spec(None, Some("haiku")).as_deref(), Some("haiku"));
        assert_eq!(
            override_spec(Some("openai"), Some("gpt-4o-mini")).as_deref(),
            Some("openai/gpt-4o-mini")
        );
        assert_eq!(
            override_spec(Some("openai"), Some("groq/llama-3.1-8b-instant")).as_deref(),
            Some("groq/llama-3.1-8b-instant")
        );
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-abcdef123"), "sk-a****");
        assert_eq!(mask_key("ab"), "ab****");
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::parse_from(["research-crew", "-v", "run", "guest-finder", "--topic", "tea", "-m", "haiku"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { blueprint, topic, model, .. } => {
                assert_eq!(blueprint, "guest-finder");
                assert_eq!(topic.as_deref(), Some("tea"));
                assert_eq!(model.as_deref(), Some("haiku"));
            }
            _ => panic!("expected run"),
        }
    }
}
