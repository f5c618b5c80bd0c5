use uuid::Uuid;

/// Unique identifier for a registered identity (user).
pub type IdentityId = Uuid;

/// Unique identifier for a conversation session.
pub type SessionId = Uuid;

/// Clip text to at most `max_chars` characters on a char boundary.
///
/// Applied before embedding and before writing condensed turn records, so a
/// runaway message cannot bloat the memory store.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_chars_short_text_untouched() {
        assert_eq!(clip_chars("hello", 10), "hello");
    }

    #[test]
    fn test_clip_chars_truncates() {
        assert_eq!(clip_chars("hello world", 5), "hello");
    }

    #[test]
    fn test_clip_chars_multibyte_boundary() {
        // Must not panic mid-codepoint
        assert_eq!(clip_chars("héllo", 2), "hé");
    }
}
