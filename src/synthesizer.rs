//! SQL Synthesizer
//!
//! Turns a natural-language question into a candidate SQL query by asking the
//! LLM, then strips whatever formatting the model wrapped around it. The
//! result is untrusted until the guard has looked at it.

use crate::error::SynthesisFailure;
use crate::llm::{CompletionClient, LlmError};
use crate::schema::SchemaDescriptor;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are a SQL assistant for SQLite.";

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(
        r"(?s)```(?:[A-Za-z0-9_-]*[ \t]*\n|(?i:sqlite|sql)[ \t]+)?(.*?)```"
    ).unwrap();
}

/// SQL text produced by the LLM, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    text: String,
    raw: String,
}

impl CandidateQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            text: strip_formatting(&raw),
            raw,
        }
    }

    /// Cleaned SQL text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The completion exactly as the model returned it.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

pub struct Synthesizer {
    client: Arc<dyn CompletionClient>,
    schema: Arc<SchemaDescriptor>,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn CompletionClient>, schema: Arc<SchemaDescriptor>) -> Self {
        Self { client, schema }
    }

    pub async fn synthesize(&self, question: &str) -> Result<CandidateQuery, SynthesisFailure> {
        let prompt = build_prompt(question, &self.schema);
        debug!("Synthesis prompt: {}", prompt);

        let raw = self
            .client
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| match e {
                LlmError::Empty => SynthesisFailure::EmptyResponse,
                other => {
                    warn!("Synthesis call failed: {}", other);
                    SynthesisFailure::TransportError(other.to_string())
                }
            })?;

        let candidate = CandidateQuery::new(raw);
        if candidate.text().is_empty() {
            warn!("LLM returned no usable SQL: {:?}", candidate.raw());
            return Err(SynthesisFailure::EmptyResponse);
        }

        info!("Candidate SQL: {}", candidate.text());
        Ok(candidate)
    }
}

pub fn build_prompt(question: &str, schema: &SchemaDescriptor) -> String {
    format!(
        r#"You convert natural language questions into valid SQLite SQL queries.

Your database contains the following tables:

{}

Some rows may have null or invalid data. Write exactly one valid SQLite SELECT query that answers the question.

Only output the raw SQL query. No explanation, no markdown, no code blocks.

Question: "{}""#,
        schema.prompt_fragment(),
        question.trim()
    )
}

/// Remove code fences, stray backticks and surrounding whitespace. When the
/// model wraps a fenced block in prose, the block content wins.
pub fn strip_formatting(raw: &str) -> String {
    let trimmed = raw.trim();

    let inner = match FENCED_BLOCK.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(""),
        None => trimmed.trim_start_matches("```"),
    };

    inner.trim().trim_matches('`').trim().to_string()
}
