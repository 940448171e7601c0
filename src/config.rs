//! Runtime configuration, read from the environment (and `.env`).

use crate::error::{AppError, Result};
use crate::guard::GuardLimits;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub database_path: String,
    pub bind_addr: String,
    pub guard: GuardLimits,
    pub summary_max_rows: usize,
    /// Wall-clock budget for a single store query.
    pub query_timeout: Duration,
}

impl Config {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENROUTER_API_KEY").unwrap_or_default();
        let defaults = GuardLimits::default();

        Ok(Self {
            llm: LlmConfig {
                api_key,
                base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 30u64)?),
            },
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| IN_MEMORY.to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            guard: GuardLimits {
                max_length: parse_or(&lookup, "GUARD_MAX_LENGTH", defaults.max_length)?,
                max_joins: parse_or(&lookup, "GUARD_MAX_JOINS", defaults.max_joins)?,
            },
            summary_max_rows: parse_or(&lookup, "SUMMARY_MAX_ROWS", 100usize)?,
            query_timeout: Duration::from_millis(parse_or(&lookup, "QUERY_TIMEOUT_MS", 5_000u64)?),
        })
    }

    /// The LLM credential is only required by commands that call the model.
    pub fn require_api_key(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "OPENROUTER_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(format!("{} must be a number, got '{}'", key, raw))
        }),
    }
}
