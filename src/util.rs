//! Shared utility functions.

/// Truncate a string to at most `max_bytes`, respecting char boundaries.
///
/// Payload caps throughout the engine (essential findings, knowledge
/// summaries, prior-knowledge digests) go through this helper so a cap can
/// never split a multi-byte character.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
