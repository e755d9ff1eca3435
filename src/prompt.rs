//! Prompt construction and reply field extraction.
//!
//! The completion service answers in free-form text, so the translation
//! prompt pins a labeled reply format and the labels are pulled back out
//! with case-insensitive regular expressions.

use std::sync::OnceLock;

use regex::Regex;

static TRANSLATED_TEXT_REGEX: OnceLock<Regex> = OnceLock::new();
static DETECTED_LANGUAGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn translated_text_regex() -> &'static Regex {
    TRANSLATED_TEXT_REGEX
        .get_or_init(|| Regex::new(r"(?i)Translated Text:\s*(.+)").expect("valid regex"))
}

fn detected_language_regex() -> &'static Regex {
    DETECTED_LANGUAGE_REGEX
        .get_or_init(|| Regex::new(r"(?i)Detected Language:\s*(.+)").expect("valid regex"))
}

/// Builds the detect-and-translate instruction for one chunk.
///
/// The chunk is embedded verbatim between double quotes.
pub fn build_translation_prompt(chunk: &str, target: &str) -> String {
    format!(
        "Detect the source language of the following text and translate it to the target language:\n\
         Input: \"{chunk}\"\n\
         Target Language: {target}\n\
         \n\
         Output the detected source language and the translated text using exactly this format:\n\
         Detected Language: <source language>\n\
         Translated Text: <translation on a single line>"
    )
}

/// Builds the language identification instruction.
pub fn build_detection_prompt(text: &str) -> String {
    format!("Please detect the language of the following text: \"{text}\"")
}

/// Returns the value of the first `Translated Text:` line, if any.
pub fn extract_translated_text(reply: &str) -> Option<String> {
    extract_field(translated_text_regex(), reply)
}

/// Returns the value of the first `Detected Language:` line, if any.
pub fn extract_detected_language(reply: &str) -> Option<String> {
    extract_field(detected_language_regex(), reply)
}

fn extract_field(re: &Regex, reply: &str) -> Option<String> {
    let value = re.captures(reply)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
