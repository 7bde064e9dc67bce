//! Prompt Loader
//!
//! Each LLM-backed step has exactly one template in the prompt directory,
//! named `step<N>_<anything>`. All templates are read and compiled up front so
//! a missing or ambiguous file stops startup instead of a live interview.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Meta, Phase, Status, step_topic};
use crate::state::Exchange;

/// Errors from prompt discovery and rendering
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("No prompt template matching step{step}_* in {dir}")]
    Missing { step: u8, dir: PathBuf },

    #[error("Multiple prompt templates for step {step}: {}", .matches.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    Ambiguous { step: u8, matches: Vec<PathBuf> },

    #[error("Invalid prompt directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to read prompt {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile prompt for step {step}: {source}")]
    Template {
        step: u8,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("Failed to render prompt for step {step}: {source}")]
    Render {
        step: u8,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("No prompt loaded for step {0}")]
    NotLoaded(u8),
}

/// Context for rendering prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub step: u8,
    /// Interview topic of the step (can, will, must_have, ...)
    pub topic: &'static str,
    pub phase: Phase,
    pub status: Status,
    /// Status as pretty JSON, for templates that embed it verbatim
    pub status_json: String,
    pub meta: Meta,
    pub user_message: String,
    /// Completed deepening turns in this step
    pub cycles: u8,
    pub max_cycles: u8,
    /// Earlier exchanges of this step
    pub history: Vec<Exchange>,
    /// Marker the deepening reply emits once the answer is detailed enough
    pub sufficient_marker: String,
    /// Phase booleans for conditional rendering
    pub is_intro: bool,
    pub is_empathy: bool,
    pub is_deepening: bool,
    pub is_generation: bool,
}

impl PromptContext {
    /// Build the context for one phase call
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        step: u8,
        phase: Phase,
        status: &Status,
        meta: Meta,
        user_message: &str,
        cycles: u8,
        max_cycles: u8,
        history: &[Exchange],
        sufficient_marker: &str,
    ) -> Self {
        debug!(%step, %phase, %cycles, history_len = history.len(), "PromptContext::new: called");
        Self {
            step,
            topic: step_topic(step),
            phase,
            status: status.clone(),
            status_json: serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string()),
            meta,
            user_message: user_message.to_string(),
            cycles,
            max_cycles,
            history: history.to_vec(),
            sufficient_marker: sufficient_marker.to_string(),
            is_intro: phase == Phase::Intro,
            is_empathy: phase == Phase::Empathy,
            is_deepening: phase == Phase::Deepening,
            is_generation: phase == Phase::Generation,
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine, one template registered per step
    hbs: Handlebars<'static>,
    /// Source file of each registered template
    sources: BTreeMap<u8, PathBuf>,
}

impl PromptLoader {
    /// Discover, read and compile the template of every given step
    pub fn open(dir: impl AsRef<Path>, steps: impl IntoIterator<Item = u8>) -> Result<Self, PromptError> {
        let dir = dir.as_ref();
        debug!(?dir, "PromptLoader::open: called");

        let mut loader = Self::empty();
        for step in steps {
            let path = find_template(dir, step)?;
            let content = std::fs::read_to_string(&path).map_err(|source| PromptError::Read {
                path: path.clone(),
                source,
            })?;
            loader.register(step, &content, path)?;
        }

        info!(steps = ?loader.sources.keys().collect::<Vec<_>>(), ?dir, "Loaded prompt templates");
        Ok(loader)
    }

    /// A loader with no templates; use [`PromptLoader::register`] to fill it
    pub fn empty() -> Self {
        debug!("PromptLoader::empty: called");
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            hbs,
            sources: BTreeMap::new(),
        }
    }

    /// Compile and register a template for a step
    pub fn register(&mut self, step: u8, content: &str, source: PathBuf) -> Result<(), PromptError> {
        debug!(%step, ?source, "PromptLoader::register: called");
        self.hbs
            .register_template_string(&template_name(step), content)
            .map_err(|e| PromptError::Template {
                step,
                source: Box::new(e),
            })?;
        self.sources.insert(step, source);
        Ok(())
    }

    /// Template file backing a step, if loaded
    pub fn source(&self, step: u8) -> Option<&Path> {
        self.sources.get(&step).map(PathBuf::as_path)
    }

    /// Render the step's template with the given context
    pub fn render(&self, context: &PromptContext) -> Result<String, PromptError> {
        let step = context.step;
        debug!(%step, phase = %context.phase, "PromptLoader::render: called");
        if !self.sources.contains_key(&step) {
            return Err(PromptError::NotLoaded(step));
        }
        self.hbs
            .render(&template_name(step), context)
            .map_err(|e| PromptError::Render {
                step,
                source: Box::new(e),
            })
    }
}

fn template_name(step: u8) -> String {
    format!("step{}", step)
}

/// The single file in `dir` whose name starts with `step<N>_`
fn find_template(dir: &Path, step: u8) -> Result<PathBuf, PromptError> {
    let pattern = format!(
        "{}/step{}_*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        step
    );
    debug!(%pattern, "find_template: called");

    let mut matches: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();

    match matches.len() {
        0 => {
            debug!(%step, "find_template: no match");
            Err(PromptError::Missing {
                step,
                dir: dir.to_path_buf(),
            })
        }
        1 => Ok(matches.remove(0)),
        _ => {
            debug!(%step, count = matches.len(), "find_template: ambiguous");
            Err(PromptError::Ambiguous { step, matches })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context(step: u8, phase: Phase) -> PromptContext {
        PromptContext::new(
            step,
            phase,
            &Status::default(),
            Meta::at(step, phase),
            "ユーザーの回答",
            1,
            3,
            &[],
            "[[SUFFICIENT]]",
        )
    }

    #[test]
    fn test_open_finds_one_template_per_step() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("step2_can.pmt"), "can {{phase}}").unwrap();
        fs::write(temp.path().join("step3_will.pmt"), "will {{phase}}").unwrap();

        let loader = PromptLoader::open(temp.path(), [2, 3]).unwrap();
        assert!(loader.source(2).unwrap().ends_with("step2_can.pmt"));
        assert_eq!(loader.render(&context(3, Phase::Empathy)).unwrap(), "will empathy");
    }

    #[test]
    fn test_step1_prefix_does_not_match_step10() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("step10_extra.pmt"), "x").unwrap();

        let result = PromptLoader::open(temp.path(), [1]);
        assert!(matches!(result, Err(PromptError::Missing { step: 1, .. })));
    }

    #[test]
    fn test_missing_template_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("step2_can.pmt"), "x").unwrap();

        let result = PromptLoader::open(temp.path(), [2, 5]);
        assert!(matches!(result, Err(PromptError::Missing { step: 5, .. })));
    }

    #[test]
    fn test_ambiguous_template_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("step4_a.pmt"), "a").unwrap();
        fs::write(temp.path().join("step4_b.pmt"), "b").unwrap();

        match PromptLoader::open(temp.path(), [4]) {
            Err(PromptError::Ambiguous { step, matches }) => {
                assert_eq!(step, 4);
                assert_eq!(matches.len(), 2);
            }
            other => panic!("expected ambiguous error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_invalid_template_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("step2_can.pmt"), "{{#if}}").unwrap();

        let result = PromptLoader::open(temp.path(), [2]);
        assert!(matches!(result, Err(PromptError::Template { step: 2, .. })));
    }

    #[test]
    fn test_render_phase_booleans_and_no_escaping() {
        let mut loader = PromptLoader::empty();
        loader
            .register(
                2,
                "{{#if is_deepening}}deep {{cycles}}/{{max_cycles}}{{else}}other{{/if}} <{{user_message}}> {{topic}}",
                PathBuf::from("inline"),
            )
            .unwrap();

        let rendered = loader.render(&context(2, Phase::Deepening)).unwrap();
        assert_eq!(rendered, "deep 1/3 <ユーザーの回答> can");
    }

    #[test]
    fn test_render_unloaded_step() {
        let loader = PromptLoader::empty();
        assert!(matches!(
            loader.render(&context(6, Phase::Intro)),
            Err(PromptError::NotLoaded(6))
        ));
    }
}
