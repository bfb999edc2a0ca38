//! Conversation title derivation.
//!
//! A short non-streamed completion asks the active model to label the
//! opening message. Best-effort: every failure yields `None`.

use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::domain::CompletionRequest;
use crate::ports::{DiscardTokens, InferenceEngine};

const QUOTES: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

/// Whether the opening message is long enough to be worth titling.
pub fn wants_title(opening: &str, config: &GenerationConfig) -> bool {
    opening.trim().chars().count() > config.title_min_chars
}

/// Prompt asking for a label of `opening`, truncated to the context cap.
pub fn title_prompt(opening: &str, config: &GenerationConfig) -> String {
    let context: String = opening.trim().chars().take(config.title_context_chars).collect();
    format!(
        "Write a title of at most {} words for a conversation that starts with the \
         message below. Reply with the title only.\n\nMessage: {context}\n\nTitle:",
        config.title_max_words
    )
}

/// Normalize raw model output into a title.
///
/// Keeps the first non-empty line, drops a `Title:` prefix, strips
/// surrounding quotes and trailing periods, and caps the word count.
pub fn clean_title(raw: &str, max_words: usize) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix("Title:")
        .or_else(|| line.strip_prefix("title:"))
        .unwrap_or(line)
        .trim();

    let unquoted = line.trim_matches(QUOTES).trim();
    let unquoted = unquoted.trim_end_matches('.').trim_matches(QUOTES).trim();

    let title = unquoted
        .split_whitespace()
        .take(max_words.max(1))
        .collect::<Vec<_>>()
        .join(" ");
    let title = title.trim_end_matches('.').to_string();

    (!title.is_empty()).then_some(title)
}

/// Ask `engine` for a title. Errors are logged and swallowed.
pub async fn derive_title(
    engine: &dyn InferenceEngine,
    opening: &str,
    config: &GenerationConfig,
) -> Option<String> {
    let mut request = CompletionRequest::prompt(
        title_prompt(opening, config),
        config.title_max_tokens,
        config.title_temperature,
    );
    request.stop = config.stop_markers.clone();
    request.stop.push("\n".to_string());

    match engine.complete(request, &mut DiscardTokens).await {
        Ok(raw) => {
            let title = clean_title(&raw, config.title_max_words);
            debug!(target: "soliloquy.generation", raw = %raw, title = ?title, "Derived title");
            title
        }
        Err(err) => {
            warn!(target: "soliloquy.generation", error = %err, "Title generation failed");
            None
        }
    }
}
