//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token.
//! This approximation is accurate within ~10% for BPE tokenizers on
//! English text and keeps budget arithmetic deterministic in tests.

use crate::message::Message;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Render messages the way they are measured: `name:\ncontent\n\n` each.
pub fn pack_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> String {
    let mut text = String::new();
    for message in messages {
        text.push_str(&message.name);
        text.push_str(":\n");
        text.push_str(message.content.trim());
        text.push_str("\n\n");
    }
    text
}

/// Estimate tokens for a set of messages as packed by [`pack_messages`].
pub fn estimate_messages_tokens<'a>(messages: impl IntoIterator<Item = &'a Message>) -> usize {
    estimate_tokens(&pack_messages(messages))
}

/// Truncate `text` to roughly `max_tokens`, keeping the head and tail halves
/// around a marker that reports how much was cut.
pub fn truncate(text: &str, max_tokens: usize) -> String {
    let total = estimate_tokens(text);
    if total <= max_tokens {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let half = (max_tokens / 2) * CHARS_PER_TOKEN;
    let head: String = chars[..half.min(chars.len())].iter().collect();
    let tail_start = chars.len().saturating_sub(half);
    let tail: String = chars[tail_start..].iter().collect();
    let removed = total - max_tokens;

    format!(
        "{head}\n\n#####\n\n[Maximal message size reached: {removed} tokens truncated]\n\n#####\n\n{tail}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 4 chars, 8 bytes
        assert_eq!(estimate_tokens("éèàù"), 1);
    }

    #[test]
    fn packing_uses_name_and_trimmed_content() {
        let msgs = vec![Message::user("Bob", "  hi  "), Message::assistant("Agent", "yo")];
        assert_eq!(pack_messages(&msgs), "Bob:\nhi\n\nAgent:\nyo\n\n");
        // "Bob:\nhi\n\n" = 9 chars, "Agent:\nyo\n\n" = 11 chars → 20 chars = 5 tokens
        assert_eq!(estimate_messages_tokens(&msgs), 5);
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate("short text", 100), "short text");
    }

    #[test]
    fn long_text_keeps_head_and_tail() {
        let text = format!("{}{}", "a".repeat(400), "z".repeat(400));
        let out = truncate(&text, 10);
        assert!(out.starts_with(&"a".repeat(20)));
        assert!(out.ends_with(&"z".repeat(20)));
        assert!(out.contains("190 tokens truncated"));
    }
}
