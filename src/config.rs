//! Environment-driven configuration

use crate::error::AgentError;
use crate::memory::CompactionPolicy;
use crate::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_CHINOOK_SQL_URL: &str = "https://raw.githubusercontent.com/lerocha/chinook-database/master/ChinookDatabase/DataSources/Chinook_Sqlite.sql";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_MAX_STEPS: usize = 25;
/// `EnvFilter` directive the binaries use when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Model endpoint settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Omitted from requests when unset; reasoning models reject it
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub chinook_sql_url: String,
    pub compaction: CompactionPolicy,
    pub max_steps: usize,
    pub api_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            chinook_sql_url: DEFAULT_CHINOOK_SQL_URL.to_string(),
            compaction: CompactionPolicy::default(),
            max_steps: DEFAULT_MAX_STEPS,
            api_port: 8080,
        }
    }
}

impl AgentConfig {
    /// Build configuration from the process environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let llm = LlmConfig {
            api_key: optional_trimmed_env("OPENAI_API_KEY").unwrap_or_default(),
            base_url: optional_trimmed_env("LLM_BASE_URL")
                .unwrap_or(defaults.llm.base_url)
                .trim_end_matches('/')
                .to_string(),
            model: optional_trimmed_env("LLM_MODEL").unwrap_or(defaults.llm.model),
            temperature: match optional_trimmed_env("LLM_TEMPERATURE") {
                Some(_) => Some(parse_env("LLM_TEMPERATURE", 0.0f32)?),
                None => defaults.llm.temperature,
            },
            timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 60u64)?),
        };

        let api_port = match optional_trimmed_env("PORT").or_else(|| optional_trimmed_env("API_PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| AgentError::ConfigError(format!("invalid port '{}'", raw)))?,
            None => defaults.api_port,
        };

        let max_steps: usize = parse_env("AGENT_MAX_STEPS", defaults.max_steps)?;
        if max_steps == 0 {
            return Err(AgentError::ConfigError(
                "AGENT_MAX_STEPS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            llm,
            chinook_sql_url: optional_trimmed_env("CHINOOK_SQL_URL")
                .unwrap_or(defaults.chinook_sql_url),
            compaction: CompactionPolicy::from_retain_count(parse_env("SUMMARY_RETAIN_MESSAGES", 1usize)?),
            max_steps,
            api_port,
        })
    }
}

fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AgentError::ConfigError(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.llm.model, "gpt-5-nano");
        assert_eq!(config.llm.temperature, None);
        assert_eq!(config.max_steps, 25);
        assert_eq!(config.compaction, CompactionPolicy::RetainRecent(1));
        assert!(config.chinook_sql_url.ends_with("Chinook_Sqlite.sql"));
        assert_eq!(DEFAULT_LOG_FILTER, "info");
    }

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: usize = parse_env("MUSIC_AGENT_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        env::set_var("MUSIC_AGENT_TEST_BAD_NUMBER", "lots");
        let result: Result<usize> = parse_env("MUSIC_AGENT_TEST_BAD_NUMBER", 1);
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
        env::remove_var("MUSIC_AGENT_TEST_BAD_NUMBER");
    }
}
