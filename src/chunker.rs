//! Splits input text into bounded, ordered chunks for the completion service.
//!
//! Limits are measured in Unicode scalar values, so a chunk boundary never
//! lands inside a multi-byte character.

/// How [`chunk_text`] decides chunk boundaries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum ChunkStrategy {
    /// Fixed-width character slices. Concatenating chunks reproduces the input exactly.
    #[default]
    Chars,
    /// Whole words joined by single spaces. Joining chunks with `" "` reproduces
    /// the input with whitespace runs collapsed, except that a word longer than
    /// the limit is hard split and comes back with spaces between its pieces.
    Words,
}

impl ChunkStrategy {
    /// Parses a configuration value such as `"chars"` or `"words"`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chars" | "characters" => Some(Self::Chars),
            "words" => Some(Self::Words),
            _ => None,
        }
    }

    /// Returns the configuration spelling used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chars => "chars",
            Self::Words => "words",
        }
    }
}

/// Splits `text` into non-empty chunks of at most `limit` characters.
///
/// A `limit` of zero is treated as one.
pub fn chunk_text(text: &str, limit: usize, strategy: ChunkStrategy) -> Vec<String> {
    let limit = limit.max(1);
    match strategy {
        ChunkStrategy::Chars => chunk_by_chars(text, limit),
        ChunkStrategy::Words => chunk_by_words(text, limit),
    }
}

fn chunk_by_chars(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut count = 0usize;

    for (idx, _) in text.char_indices() {
        if count == limit {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(text[start..].to_string());
    }

    chunks
}

fn chunk_by_words(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            // Oversized words are hard split so every chunk honors the limit.
            chunks.extend(chunk_by_chars(word, limit));
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if needed > limit {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
