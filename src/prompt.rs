//! Interactive keyword prompts.
//!
//! A prompt string carries its own answer grammar as a `[kw1/kw2/..]<default>`
//! suffix. Operator input resolves against the keywords by case-insensitive
//! unique-prefix matching; empty input picks the default. Invalid input is
//! re-asked up to [`MAX_PROMPT_ATTEMPTS`] times, and a closed input stream
//! cancels the prompt instead of hanging, so non-interactive invocations fail
//! cleanly.

use std::io::{BufRead, Write};

use mockall::automock;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::error::ProvisionError;

/// Invalid answers tolerated before the prompt gives up.
pub const MAX_PROMPT_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt string has no [keywords]<default> suffix: {0}")]
    Malformed(String),
    #[error("prompt default '{0}' does not resolve to a keyword")]
    InvalidDefault(String),
    #[error("input stream closed while awaiting an answer")]
    Cancelled,
    #[error("no valid answer after {0} attempts")]
    AttemptsExhausted(usize),
    #[error("failed to read operator input: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PromptError> for ProvisionError {
    fn from(e: PromptError) -> Self {
        ProvisionError::Input(e.to_string())
    }
}

/// A parsed keyword prompt: the keyword set and the default answer extracted
/// from the prompt text.
pub struct KeywordPrompt {
    keywords: Vec<String>,
    default: String,
}

impl KeywordPrompt {
    /// Parses the `[kw1/kw2/..]<default>` suffix out of the prompt string.
    /// Fails if the suffix is absent or the default does not itself resolve
    /// via [`KeywordPrompt::try_match`].
    pub fn parse(prompt: &str) -> Result<Self, PromptError> {
        let re = Regex::new(r".*\[(?P<keywords>.*)\]<(?P<default>.*)>$")
            .expect("prompt grammar regex is valid");
        let caps = re
            .captures(prompt)
            .ok_or_else(|| PromptError::Malformed(prompt.to_string()))?;
        let keywords: Vec<String> = caps["keywords"]
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let default = caps["default"].to_string();

        let parsed = KeywordPrompt { keywords, default };
        if parsed.default.is_empty() || parsed.try_match(&parsed.default).is_none() {
            return Err(PromptError::InvalidDefault(parsed.default));
        }
        Ok(parsed)
    }

    /// Resolves operator input to a keyword. Empty input yields the default;
    /// otherwise the input must be a case-insensitive prefix of exactly one
    /// keyword.
    pub fn try_match(&self, input: &str) -> Option<&str> {
        if input.is_empty() {
            return Some(&self.default);
        }
        let lowered = input.to_lowercase();
        let mut matches = self
            .keywords
            .iter()
            .filter(|kw| kw.to_lowercase().starts_with(&lowered));
        match (matches.next(), matches.next()) {
            (Some(kw), None) => Some(kw),
            _ => None,
        }
    }
}

/// Writes `{prompt}:` and reads lines until one resolves, up to
/// `max_attempts` invalid answers. EOF cancels the prompt.
pub fn prompt_for_keyword<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
    max_attempts: usize,
) -> Result<String, PromptError> {
    let parsed = KeywordPrompt::parse(prompt)?;
    for attempt in 0..max_attempts {
        write!(output, "{prompt}:")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(PromptError::Cancelled);
        }
        let answer = line.trim_end_matches(['\r', '\n']);
        if let Some(kw) = parsed.try_match(answer) {
            debug!(answer = kw, attempt, "Prompt resolved");
            return Ok(kw.to_string());
        }
    }
    Err(PromptError::AttemptsExhausted(max_attempts))
}

/// Seam for conflict-resolution decisions so the upsert state machine can be
/// driven by a mock in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Prompter: Send + Sync {
    /// Ask the operator the given keyword prompt and return the resolved
    /// keyword.
    fn resolve(&self, prompt: &str) -> Result<String, ProvisionError>;
}

/// Production prompter over the process's stdin/stdout.
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn resolve(&self, prompt: &str) -> Result<String, ProvisionError> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let keyword = prompt_for_keyword(
            prompt,
            &mut stdin.lock(),
            &mut stdout.lock(),
            MAX_PROMPT_ATTEMPTS,
        )?;
        Ok(keyword)
    }
}
