//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::domain::{Meta, Phase, Status, step_topic};
use crate::steps::{ASK_QUALIFICATION, Drill, Interview, TurnRequest, TurnResponse};

/// Result of a slash command
enum SlashResult {
    Continue,
    Quit,
}

/// Interactive interview session
pub struct ReplSession {
    interview: Arc<Interview>,
    session_id: String,
    status: Status,
    meta: Meta,
    /// Options of the last choice prompt, for numeric answers
    drill: Option<Drill>,
}

impl ReplSession {
    /// Create a new REPL session
    pub fn new(interview: Arc<Interview>, session_id: String) -> Self {
        debug!(%session_id, "ReplSession::new: called");
        Self {
            interview,
            session_id,
            status: Status::default(),
            meta: Meta::default(),
            drill: None,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();
        println!("{}", ASK_QUALIFICATION.bright_blue());

        // Create readline editor for proper line editing
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = format!("{} ", format!("[{}]>", self.position()).bright_green());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if !input.is_empty() {
                        let _ = rl.add_history_entry(input);
                    }

                    if input.starts_with('/') {
                        match self.handle_slash_command(input) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    }

                    let message = self.resolve_numbered_choice(input);
                    self.process_user_input(&message).await?;
                    if self.meta.is_complete() {
                        self.print_summary()?;
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Send one turn, then fetch the intro question of every newly entered step
    async fn process_user_input(&mut self, input: &str) -> Result<()> {
        debug!(%input, "process_user_input: called");
        let mut message = input.to_string();
        loop {
            let request = TurnRequest::new(self.session_id.clone(), self.status.clone(), self.meta, message);
            let response = self.interview.turn(request).await?;
            self.show(&response);

            self.status = response.status;
            self.meta = response.meta;
            self.drill = response.drill;

            if self.meta.phase != Some(Phase::Intro) {
                return Ok(());
            }
            message = String::new();
        }
    }

    /// Map "2" to the second option of a pending choice prompt
    fn resolve_numbered_choice(&self, input: &str) -> String {
        let Some(drill) = &self.drill else {
            return input.to_string();
        };
        match input.parse::<usize>() {
            Ok(n) if (1..=drill.options.len()).contains(&n) => drill.options[n - 1].clone(),
            _ => input.to_string(),
        }
    }

    fn show(&self, response: &TurnResponse) {
        if let Some(text) = response.response.as_deref().filter(|t| !t.is_empty()) {
            println!("{}", text.bright_blue());
        }
        if let Some(drill) = &response.drill {
            if drill.retry {
                println!("{}", "Please pick one of the options.".yellow());
            }
            for (i, option) in drill.options.iter().enumerate() {
                println!("  {} {}", format!("{}.", i + 1).yellow(), option);
            }
        }
        for field in &response.degraded {
            println!("{} {}", "degraded:".yellow(), field.dimmed());
        }
        if response.meta.step != self.meta.step {
            println!(
                "{}",
                format!("-- step {} ({}) --", response.meta.step, step_topic(response.meta.step)).dimmed()
            );
        }
    }

    fn position(&self) -> String {
        match self.meta.phase {
            Some(phase) => format!("{}:{}", self.meta.step, phase),
            None => self.meta.step.to_string(),
        }
    }

    /// Print welcome message
    fn print_welcome(&self) {
        println!();
        println!("{}", "Interview".bright_cyan().bold());
        println!("Session: {}", self.session_id);
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/status" | "/s" => {
                match serde_json::to_string_pretty(&self.status) {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("{} {}", "Failed to render status:".red(), e),
                }
                SlashResult::Continue
            }
            "/restart" => {
                self.status = Status::default();
                self.meta = Meta::default();
                self.drill = None;
                println!("{}", "Interview restarted.".dimmed());
                println!("{}", ASK_QUALIFICATION.bright_blue());
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    /// Print help message
    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the interview", "/quit".yellow());
        println!("  {:14} Show collected fields", "/status".yellow());
        println!("  {:14} Start again at step 1", "/restart".yellow());
        println!();
        println!("Answer a choice prompt with the option text or its number.");
        println!();
    }

    fn print_summary(&self) -> Result<()> {
        println!();
        println!("{}", "Interview complete".bright_cyan().bold());
        println!("{}", serde_json::to_string_pretty(&self.status)?);
        Ok(())
    }
}
