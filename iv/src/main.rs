//! Interview - scripted multi-step interview engine
//!
//! CLI entry point for running and inspecting interviews.

use std::fs;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use interview::cli::{Cli, Command, get_log_path};
use interview::config::Config;
use interview::domain::{Meta, Phase, Status};
use interview::prompts::{PromptContext, PromptLoader};
use interview::repl;
use interview::steps::{MAX_CYCLES, prompt_steps};
use tagmatch::{ReferenceData, TagMatcher, normalize};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level is needed before the full config load can log anything
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "Interview loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Chat { session }) => repl::run_interactive(&config, session).await,
        Some(Command::Match { text }) => cmd_match(&config, &text),
        Some(Command::Check) => cmd_check(&config),
        Some(Command::Render { step, phase }) => cmd_render(&config, step, &phase),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn load_reference_data(config: &Config) -> Result<ReferenceData> {
    ReferenceData::load(&config.data.qualifications, &config.data.licenses, &config.data.tags)
}

/// Show how text resolves against the reference data
fn cmd_match(config: &Config, text: &str) -> Result<()> {
    let data = load_reference_data(config)?;
    let matcher = TagMatcher::new(&data);

    println!("{:16} {}", "normalized".bright_cyan(), normalize(text));
    println!("{:16} {:?}", "exact labels".bright_cyan(), matcher.exact_labels(text));
    println!("{:16} {:?}", "license labels".bright_cyan(), matcher.match_license_labels(text));
    println!(
        "{:16} {:?}",
        "qual ids".bright_cyan(),
        matcher.extract_qualification_ids_from_text(text)
    );
    println!("{:16} {:?}", "tag ids".bright_cyan(), matcher.match_tag_ids(text));
    println!("{:16} {:?}", "must-have ids".bright_cyan(), matcher.find_must_have_tag_ids(text));
    Ok(())
}

/// Load everything a chat needs and report what was found
fn cmd_check(config: &Config) -> Result<()> {
    let data = load_reference_data(config)?;
    println!(
        "{} reference data: {} qualifications, {} licenses, {} tags",
        "ok".green(),
        data.qualifications.len(),
        data.licenses.len(),
        data.tags.len()
    );

    let steps = prompt_steps(config.steps.must_have);
    let prompts = PromptLoader::open(&config.prompts.dir, steps.iter().copied())
        .with_context(|| format!("Failed to load prompts from {}", config.prompts.dir.display()))?;
    for step in &steps {
        let source = prompts.source(*step).map(|p| p.display().to_string()).unwrap_or_default();
        println!("{} step {} prompt: {}", "ok".green(), step, source);
    }

    match config.llm.get_api_key() {
        Ok(_) => println!("{} {} key in {}", "ok".green(), config.llm.provider, config.llm.api_key_env),
        Err(e) => println!("{} {}", "missing".yellow(), e),
    }
    Ok(())
}

/// Render a prompt template against an empty context
fn cmd_render(config: &Config, step: u8, phase: &str) -> Result<()> {
    let phase = Phase::from_name(phase).ok_or_else(|| eyre::eyre!("Unknown phase: {}", phase))?;
    let prompts = PromptLoader::open(&config.prompts.dir, [step])?;
    let context = PromptContext::new(
        step,
        phase,
        &Status::default(),
        Meta::at(step, phase),
        "",
        0,
        MAX_CYCLES,
        &[],
        &config.conversation.sufficient_marker,
    );
    println!("{}", prompts.render(&context)?);
    Ok(())
}
