//! Default system prompt resolution.
//!
//! Precedence: a readable prompt file, then the inline string, then the
//! built-in prompt. Both file and inline text are normalized: literal `\n`
//! sequences become newlines, surrounding whitespace is trimmed and runs of
//! three or more newlines collapse to one blank line.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::expand_path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided documentation context.
Use only the information from the context to answer questions.
If the context doesn't contain enough information to answer the question, say so clearly.
Provide clear, concise answers and cite the relevant document titles when possible.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPromptSource {
    pub file: Option<String>,
    pub inline: Option<String>,
}

impl SystemPromptSource {
    pub fn inline(prompt: impl Into<String>) -> Self {
        Self { file: None, inline: Some(prompt.into()) }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self { file: Some(path.into()), inline: None }
    }

    /// The configured prompt, or `None` when neither source yields text.
    pub fn resolve(&self) -> Option<String> {
        if let Some(file) = &self.file {
            let path = expand_path(file);
            match std::fs::read_to_string(&path) {
                Ok(raw) => {
                    let prompt = normalize_prompt(&raw);
                    if !prompt.is_empty() {
                        debug!(path = %path.display(), "loaded system prompt file");
                        return Some(prompt);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "system prompt file unreadable, falling back"),
            }
        }
        self.inline.as_deref().map(normalize_prompt).filter(|p| !p.is_empty())
    }

    pub fn resolve_or_default(&self) -> String {
        self.resolve().unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

pub fn normalize_prompt(raw: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern"));
    let unescaped = raw.replace("\\n", "\n");
    blank_runs.replace_all(unescaped.trim(), "\n\n").into_owned()
}
