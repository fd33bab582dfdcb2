//! Removal of reasoning markup that some models emit ahead of their answer.

use std::sync::LazyLock;

use regex::Regex;

use crate::runtime::types::CompletionError;

/// Paired reasoning blocks, matched non-greedily up to the nearest closer.
static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)",
        r"<think>.*?</think>",
        r"|<thinking>.*?</thinking>",
        r"|<reasoning>.*?</reasoning>",
        r"|\*\*thinking\*\*.*?\*\*/thinking\*\*",
        r"|\*\*思考\*\*.*?\*\*/思考\*\*",
        r"|【thinking】.*?【/thinking】",
        r"|【思考】.*?【/思考】",
        r"|\[thinking\].*?\[/thinking\]",
        r"|\[思考\].*?\[/思考\]",
    ))
    .expect("reasoning block pattern is valid")
});

/// Unpaired open/close tags left behind by truncated output.
static STRAY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:think|thinking|reasoning)>").expect("stray tag pattern is valid")
});

/// Three or more line breaks, ignoring horizontal whitespace between them.
static EXCESS_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n(?:[ \t\r]*\n){2,}").expect("blank line pattern is valid")
});

/// Strip reasoning markup from `raw`, collapse runs of blank lines and trim.
///
/// Fails with [`CompletionError::EmptyAfterSanitize`] when nothing is left,
/// so the sequencer treats an all-reasoning reply as a failed attempt.
pub fn sanitize(raw: &str) -> Result<String, CompletionError> {
    let text = REASONING_BLOCK.replace_all(raw, "");
    let text = STRAY_TAG.replace_all(&text, "");
    let text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n");
    let text = text.trim();

    if text.is_empty() {
        return Err(CompletionError::EmptyAfterSanitize);
    }
    Ok(text.to_owned())
}
