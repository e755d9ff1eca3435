//! Backend abstraction for chat completion services.
//!
//! The relay depends on the [`Completer`] trait instead of a concrete HTTP
//! client, which keeps prompt handling decoupled from the wire protocol.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::AppError;

pub mod openai;

/// Backend contract implemented by text completion services.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Sends `prompt` as a single user message and returns the reply text.
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;

    /// Model identifier reported by health endpoints.
    fn model(&self) -> &str;
}

/// Builds the configured completion backend.
pub fn build_backend(cfg: &AppConfig) -> Result<Arc<dyn Completer>, AppError> {
    Ok(Arc::new(openai::OpenAiCompleter::new(cfg.completion.clone())?))
}
