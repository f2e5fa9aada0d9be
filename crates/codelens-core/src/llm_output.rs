//! Helpers for untrusted chat-model output.
//!
//! Model replies are plain text that may or may not contain the JSON the
//! prompt asked for. These helpers only locate candidate JSON text; decoding
//! and validation stay with the caller.

/// Strip a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
///
/// Text without a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// The outermost `open ... close` slice of `text`, if any.
///
/// Used when a model wraps the requested JSON in prose.
pub fn extract_delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_variants() {
        assert_eq!(strip_code_fence("[1, 2]"), "[1, 2]");
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("  ```\n{\"a\": 1}\n```  "), "{\"a\": 1}");
        // Unterminated fence keeps the body
        assert_eq!(strip_code_fence("```json\n[0]"), "[0]");
    }

    #[test]
    fn test_extract_delimited() {
        assert_eq!(
            extract_delimited("Ranking: [2, 0, 1] as requested", '[', ']'),
            Some("[2, 0, 1]")
        );
        assert_eq!(extract_delimited("no json here", '{', '}'), None);
        assert_eq!(extract_delimited("] backwards [", '[', ']'), None);
    }
}
