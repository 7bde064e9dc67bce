//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Interview - step/phase interview engine
#[derive(Parser)]
#[command(
    name = "iv",
    about = "Scripted interview that turns free-text answers into structured profile fields",
    version,
    after_help = "Logs are written to: ~/.local/share/interview/logs/interview.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an interactive interview
    Chat {
        /// Session id (a new one is generated when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show how text resolves against the reference data
    Match {
        /// Text to normalize and match
        text: String,
    },

    /// Load reference data and prompt templates, report problems
    Check,

    /// Render a step's prompt template for a phase
    Render {
        /// Step number (2-6)
        #[arg(short, long)]
        step: u8,

        /// Phase (intro, empathy, deepening, generation)
        #[arg(short, long, default_value = "intro")]
        phase: String,
    },
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("interview")
        .join("logs")
        .join("interview.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from(["iv", "-l", "debug", "render", "--step", "3", "--phase", "deepening"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Command::Render { step, phase }) => {
                assert_eq!(step, 3);
                assert_eq!(phase, "deepening");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_session() {
        let cli = Cli::try_parse_from(["iv", "chat", "--session", "abc"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Chat { session: Some(ref s) }) if s == "abc"));
    }

    #[test]
    fn test_log_path_under_interview_dir() {
        assert!(get_log_path().ends_with("interview/logs/interview.log"));
    }
}
