//! Configuration loading from environment variables.
//!
//! Values are validated early so startup fails fast with actionable errors.

use crate::chunker::ChunkStrategy;
use crate::error::AppError;
use std::env;

pub const DEFAULT_CHUNK_LIMIT: usize = 500;
pub const MAX_CHUNK_LIMIT: usize = 100_000;
pub const DEFAULT_TRANSLATE_PARALLELISM: usize = 1;
pub const MAX_TRANSLATE_PARALLELISM: usize = 8;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

/// Connection settings for the upstream chat completion service.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer credential sent upstream. Never logged.
    pub api_key: String,
    /// Model identifier placed in every completion request.
    pub model: String,
    /// Sampling temperature in range `[0.0, 2.0]`.
    pub temperature: f32,
    /// Optional per-request timeout; unset keeps the HTTP client default.
    pub timeout_secs: Option<u64>,
}

/// Runtime configuration for the HTTP server and translation relay.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `127.0.0.1`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Optional bearer token required by all endpoints.
    pub api_key: Option<String>,
    /// Upstream completion service settings.
    pub completion: CompletionConfig,
    /// Maximum chunk size in characters.
    pub chunk_limit: usize,
    /// How input text is split into chunks.
    pub chunk_strategy: ChunkStrategy,
    /// Number of chunks translated concurrently within one request.
    pub translate_parallelism: usize,
    /// Treat replies without a `Translated Text:` label as upstream failures.
    pub strict_extraction: bool,
}

impl AppConfig {
    /// Builds configuration from environment variables.
    ///
    /// Variables:
    /// - `HOST` (default `127.0.0.1`)
    /// - `PORT` (default `3000`)
    /// - `API_KEY` (optional inbound bearer token)
    /// - `OPENAI_API_KEY` (required)
    /// - `COMPLETION_BASE_URL` (default `https://api.openai.com/v1`)
    /// - `COMPLETION_MODEL` (default `gpt-3.5-turbo`)
    /// - `COMPLETION_TEMPERATURE` (default `0.5`, range `[0.0, 2.0]`)
    /// - `COMPLETION_TIMEOUT_SECS` (optional)
    /// - `CHUNK_LIMIT` (default `500`, min `1`, max `100000`)
    /// - `CHUNK_STRATEGY` (`chars` or `words`, default `chars`)
    /// - `TRANSLATE_PARALLELISM` (default `1`, min `1`, max `8`)
    /// - `STRICT_EXTRACTION` (default `false`)
    pub fn from_env() -> Result<Self, AppError> {
        let host = env_str("HOST", "127.0.0.1");
        let port = env_u16("PORT", 3000)?;

        let upstream_key = env_opt("OPENAI_API_KEY").ok_or_else(|| {
            AppError::internal(
                "OPENAI_API_KEY is not set; the relay cannot reach the completion service",
            )
        })?;
        let temperature = env_temperature("COMPLETION_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        let timeout_secs = match env_opt("COMPLETION_TIMEOUT_SECS") {
            Some(raw) => {
                Some(parse_usize_bounded("COMPLETION_TIMEOUT_SECS", &raw, 1, 3600)? as u64)
            }
            None => None,
        };

        let completion = CompletionConfig {
            base_url: env_str("COMPLETION_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            api_key: upstream_key,
            model: env_str("COMPLETION_MODEL", "gpt-3.5-turbo"),
            temperature,
            timeout_secs,
        };

        let chunk_limit =
            env_usize_bounded("CHUNK_LIMIT", DEFAULT_CHUNK_LIMIT, 1, MAX_CHUNK_LIMIT)?;
        let chunk_strategy = parse_chunk_strategy(&env_str("CHUNK_STRATEGY", "chars"))?;
        let translate_parallelism = env_usize_bounded(
            "TRANSLATE_PARALLELISM",
            DEFAULT_TRANSLATE_PARALLELISM,
            1,
            MAX_TRANSLATE_PARALLELISM,
        )?;

        Ok(Self {
            host,
            port,
            api_key: env_opt("API_KEY"),
            completion,
            chunk_limit,
            chunk_strategy,
            translate_parallelism,
            strict_extraction: env_bool("STRICT_EXTRACTION", false)?,
        })
    }
}

fn parse_chunk_strategy(raw: &str) -> Result<ChunkStrategy, AppError> {
    ChunkStrategy::parse(raw).ok_or_else(|| {
        AppError::internal(format!(
            "invalid CHUNK_STRATEGY={raw:?}; expected chars or words"
        ))
    })
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_bool(name, &raw)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_temperature(name: &str, default: f32) -> Result<f32, AppError> {
    match env_opt(name) {
        Some(raw) => parse_temperature(name, &raw),
        None => Ok(default),
    }
}

fn parse_temperature(name: &str, raw: &str) -> Result<f32, AppError> {
    let value = raw.trim().parse::<f32>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected float"))
    })?;
    if !value.is_finite() || !(0.0..=2.0).contains(&value) {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected a value in range [0.0, 2.0]"
        )));
    }
    Ok(value)
}

fn env_usize_bounded(
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_usize_bounded(name, &raw, min, max)
}

fn parse_usize_bounded(name: &str, raw: &str, min: usize, max: usize) -> Result<usize, AppError> {
    let trimmed = raw.trim();
    let parsed = trimmed.parse::<usize>().map_err(|_| {
        AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        ))
    })?;
    if parsed < min || parsed > max {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        )));
    }
    Ok(parsed)
}
