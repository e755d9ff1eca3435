//! Chunked translation and language detection over a completion backend.
//!
//! A request is split into chunks, each chunk is sent to the backend with its
//! own prompt, and the extracted translations are joined in chunk order.
//! Chunks may be in flight concurrently up to the configured parallelism;
//! the buffered stream yields results in submission order, not completion
//! order.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::backend::Completer;
use crate::chunker::{chunk_text, ChunkStrategy};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::prompt::{
    build_detection_prompt, build_translation_prompt, extract_detected_language,
    extract_translated_text,
};

pub const INVALID_INPUT_MESSAGE: &str = "Invalid input data.";
pub const TRANSLATION_FAILED_MESSAGE: &str = "Translation failed. Please try again.";
pub const DETECT_TEXT_REQUIRED_MESSAGE: &str = "Text is required for language detection.";
pub const DETECTION_FAILED_MESSAGE: &str = "Could not detect language. Please try again later.";
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Body of `POST /translate`. Missing fields deserialize as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranslationRequest {
    pub text: String,
    pub target: String,
}

/// Body of `POST /detect-language`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectionRequest {
    pub text: String,
}

/// Response of `POST /translate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    /// Per-chunk translations joined by single spaces in chunk order.
    pub translated_text: String,
    /// First detected source language, or `"unknown"`.
    pub detected_lang: String,
}

/// Response of `POST /detect-language`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    /// Trimmed model reply, unvalidated.
    pub language: String,
}

/// Chunking and extraction settings applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Maximum chunk size in characters.
    pub chunk_limit: usize,
    /// How request text is split into chunks.
    pub chunk_strategy: ChunkStrategy,
    /// Chunks in flight at once for a single request.
    pub parallelism: usize,
    /// Fail the request when a reply lacks the `Translated Text:` label.
    pub strict_extraction: bool,
}

impl RelaySettings {
    /// Copies the relay-relevant fields out of the runtime configuration.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            chunk_limit: cfg.chunk_limit,
            chunk_strategy: cfg.chunk_strategy,
            parallelism: cfg.translate_parallelism,
            strict_extraction: cfg.strict_extraction,
        }
    }
}

struct ChunkOutcome {
    translated: String,
    detected: Option<String>,
}

/// Mediates between HTTP handlers and the completion backend.
pub struct Relay {
    backend: Arc<dyn Completer>,
    settings: RelaySettings,
}

impl Relay {
    /// Wraps `backend` with the given chunking and extraction settings.
    pub fn new(backend: Arc<dyn Completer>, settings: RelaySettings) -> Self {
        Self { backend, settings }
    }

    /// Model identifier of the underlying backend.
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Detects the source language and translates `req.text` into `req.target`.
    ///
    /// Only empty fields are rejected; whitespace is relayed as given.
    /// Any backend failure aborts the whole request; no partial result is
    /// returned. A reply without a `Translated Text:` label contributes an
    /// empty string unless strict extraction is enabled.
    pub async fn translate(
        &self,
        req: &TranslationRequest,
    ) -> Result<TranslationResult, AppError> {
        let target = req.target.as_str();
        if req.text.is_empty() || target.is_empty() {
            return Err(AppError::invalid_request(INVALID_INPUT_MESSAGE));
        }

        let chunks = chunk_text(
            &req.text,
            self.settings.chunk_limit,
            self.settings.chunk_strategy,
        );
        debug!(
            chunks = chunks.len(),
            strategy = self.settings.chunk_strategy.as_str(),
            target = %target,
            "translating request"
        );

        let chunk_count = chunks.len();
        let outcomes: Vec<ChunkOutcome> = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, chunk)| async move { self.translate_chunk(idx, &chunk, target).await })
            .buffered(self.settings.parallelism.max(1))
            .try_collect()
            .await
            .map_err(|err| {
                error!(error = %err, chunks = chunk_count, "translation failed");
                err.with_public_message(TRANSLATION_FAILED_MESSAGE)
            })?;

        let detected_lang = outcomes
            .iter()
            .find_map(|outcome| outcome.detected.clone())
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
        let translated_text = outcomes
            .into_iter()
            .map(|outcome| outcome.translated)
            .collect::<Vec<_>>()
            .join(" ");

        Ok(TranslationResult {
            translated_text,
            detected_lang,
        })
    }

    async fn translate_chunk(
        &self,
        idx: usize,
        chunk: &str,
        target: &str,
    ) -> Result<ChunkOutcome, AppError> {
        let prompt = build_translation_prompt(chunk, target);
        let reply = self.backend.complete(&prompt).await?;

        let translated = match extract_translated_text(&reply) {
            Some(text) => text,
            None if self.settings.strict_extraction => {
                return Err(AppError::upstream(format!(
                    "reply for chunk {} has no Translated Text label",
                    idx + 1
                )));
            }
            None => {
                warn!(
                    chunk = idx + 1,
                    reply_chars = reply.chars().count(),
                    "reply has no Translated Text label; using empty translation"
                );
                String::new()
            }
        };

        Ok(ChunkOutcome {
            translated,
            detected: extract_detected_language(&reply),
        })
    }

    /// Asks the backend to identify the language of `text` and returns its
    /// trimmed reply verbatim.
    pub async fn detect_language(&self, text: &str) -> Result<DetectionResult, AppError> {
        if text.is_empty() {
            return Err(AppError::invalid_request(DETECT_TEXT_REQUIRED_MESSAGE));
        }

        let reply = self
            .backend
            .complete(&build_detection_prompt(text))
            .await
            .map_err(|err| {
                error!(error = %err, "language detection failed");
                err.with_public_message(DETECTION_FAILED_MESSAGE)
            })?;

        Ok(DetectionResult {
            language: reply.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// Echoes each chunk back upper-cased, sleeping longer for earlier calls
    /// so concurrent chunks complete in reverse order.
    struct EchoCompleter {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        stagger: bool,
    }

    impl EchoCompleter {
        fn new(stagger: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                stagger,
            }
        }
    }

    fn chunk_from_prompt(prompt: &str) -> String {
        let start = prompt.find("Input: \"").expect("input marker") + "Input: \"".len();
        let end = prompt.find("\"\nTarget Language:").expect("target marker");
        prompt[start..end].to_string()
    }

    #[async_trait]
    impl Completer for EchoCompleter {
        async fn complete(&self, prompt: &str) -> Result<String, AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.stagger {
                let delay_ms = 60u64.saturating_sub(call as u64 * 20);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            let chunk = chunk_from_prompt(prompt);
            Ok(format!(
                "Detected Language: English\nTranslated Text: {}",
                chunk.trim().to_uppercase()
            ))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    /// Returns the same reply for every prompt.
    struct FixedCompleter(&'static str);

    #[async_trait]
    impl Completer for FixedCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    /// Succeeds for the first `ok_calls` prompts, then fails.
    struct FailingCompleter {
        ok_calls: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Completer for FailingCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, AppError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.ok_calls {
                Ok("Translated Text: ok".to_string())
            } else {
                Err(AppError::upstream("connection reset by peer"))
            }
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    fn settings(chunk_limit: usize, parallelism: usize) -> RelaySettings {
        RelaySettings {
            chunk_limit,
            chunk_strategy: ChunkStrategy::Chars,
            parallelism,
            strict_extraction: false,
        }
    }

    fn request(text: &str, target: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            target: target.to_string(),
        }
    }

    #[tokio::test]
    async fn single_chunk_reply_is_parsed() {
        let relay = Relay::new(
            Arc::new(FixedCompleter(
                "Detected Language: English\nTranslated Text: Bonjour",
            )),
            settings(500, 1),
        );

        let result = relay.translate(&request("Hello", "fr")).await.unwrap();
        assert_eq!(
            result,
            TranslationResult {
                translated_text: "Bonjour".to_string(),
                detected_lang: "English".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn empty_fields_are_rejected_before_calling_backend() {
        let backend = Arc::new(EchoCompleter::new(false));
        let relay = Relay::new(backend.clone(), settings(500, 1));

        for (text, target) in [("", "fr"), ("Hello", ""), ("", "")] {
            let err = relay.translate(&request(text, target)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(ref m) if m == INVALID_INPUT_MESSAGE));
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whitespace_only_text_is_relayed() {
        let backend = Arc::new(EchoCompleter::new(false));
        let relay = Relay::new(backend.clone(), settings(500, 1));

        let result = relay.translate(&request("   ", "fr")).await.unwrap();

        assert_eq!(result.translated_text, "");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(backend.prompts.lock().unwrap()[0].contains("Input: \"   \""));
    }

    #[tokio::test]
    async fn translation_runs_on_a_spawned_task() {
        let relay = Arc::new(Relay::new(
            Arc::new(EchoCompleter::new(false)),
            settings(2, 2),
        ));
        let req = request("abcdef", "fr");

        let handle = tokio::spawn(async move { relay.translate(&req).await });
        let result = handle.await.expect("join").unwrap();

        assert_eq!(result.translated_text, "AB CD EF");
    }

    #[tokio::test]
    async fn chunks_are_translated_sequentially_and_joined_in_order() {
        let backend = Arc::new(EchoCompleter::new(false));
        let relay = Relay::new(backend.clone(), settings(5, 1));

        let result = relay
            .translate(&request("aaaa bbbb cccc", "de"))
            .await
            .unwrap();

        assert_eq!(result.translated_text, "AAAA BBBB CCCC");
        assert_eq!(result.detected_lang, "English");

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Input: \"aaaa \""));
        assert!(prompts[1].contains("Input: \"bbbb \""));
        assert!(prompts[2].contains("Input: \"cccc\""));
        assert!(prompts.iter().all(|p| p.contains("Target Language: de")));
    }

    #[tokio::test]
    async fn parallel_translation_keeps_chunk_order() {
        let backend = Arc::new(EchoCompleter::new(true));
        let relay = Relay::new(backend.clone(), settings(3, 3));

        let result = relay.translate(&request("ab cd ef", "es")).await.unwrap();

        assert_eq!(result.translated_text, "AB CD EF");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn word_strategy_collapses_whitespace() {
        let backend = Arc::new(EchoCompleter::new(false));
        let relay = Relay::new(
            backend.clone(),
            RelaySettings {
                chunk_strategy: ChunkStrategy::Words,
                ..settings(10, 1)
            },
        );

        let result = relay
            .translate(&request("one   two\nthree four", "it"))
            .await
            .unwrap();

        assert_eq!(result.translated_text, "ONE TWO THREE FOUR");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_label_yields_empty_translation() {
        let relay = Relay::new(
            Arc::new(FixedCompleter("I could not translate that.")),
            settings(500, 1),
        );

        let result = relay.translate(&request("Hello", "fr")).await.unwrap();
        assert_eq!(result.translated_text, "");
        assert_eq!(result.detected_lang, UNKNOWN_LANGUAGE);
    }

    #[tokio::test]
    async fn strict_extraction_reports_missing_label() {
        let relay = Relay::new(
            Arc::new(FixedCompleter("I could not translate that.")),
            RelaySettings {
                strict_extraction: true,
                ..settings(500, 1)
            },
        );

        let err = relay.translate(&request("Hello", "fr")).await.unwrap_err();
        assert!(
            matches!(err, AppError::Upstream { ref message, .. } if message == TRANSLATION_FAILED_MESSAGE)
        );
    }

    #[tokio::test]
    async fn backend_failure_aborts_whole_request() {
        let backend = Arc::new(FailingCompleter {
            ok_calls: 1,
            calls: AtomicUsize::new(0),
        });
        let relay = Relay::new(backend.clone(), settings(2, 1));

        let err = relay.translate(&request("aabbcc", "fr")).await.unwrap_err();

        match err {
            AppError::Upstream { message, detail } => {
                assert_eq!(message, TRANSLATION_FAILED_MESSAGE);
                assert!(detail.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The third chunk is never sent once the second fails.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detection_returns_trimmed_reply_verbatim() {
        let relay = Relay::new(
            Arc::new(FixedCompleter("  The text is written in Spanish.\n")),
            settings(500, 1),
        );

        let result = relay.detect_language("Hola amigo").await.unwrap();
        assert_eq!(result.language, "The text is written in Spanish.");
    }

    #[tokio::test]
    async fn detection_requires_text_and_maps_failures() {
        let relay = Relay::new(
            Arc::new(FailingCompleter {
                ok_calls: 0,
                calls: AtomicUsize::new(0),
            }),
            settings(500, 1),
        );

        let err = relay.detect_language("").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(ref m) if m == DETECT_TEXT_REQUIRED_MESSAGE));

        let err = relay.detect_language("Hola").await.unwrap_err();
        assert!(
            matches!(err, AppError::Upstream { ref message, .. } if message == DETECTION_FAILED_MESSAGE)
        );
    }
}
