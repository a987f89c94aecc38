//! Free-text chunking for text documents.

use cairn_core::token::{CHARS_PER_TOKEN, estimate_tokens};

/// Sentence-like break points, tried in order at each position.
pub const DELIMITERS: [&str; 7] = ["\n", ". ", "! ", "? ", "... ", ": ", "; "];

/// A chunk of source text and its character range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Greedily pack sentences into chunks of at most `max_tokens`.
///
/// Chunks are trimmed and never empty. A single sentence longer than the
/// limit is cut at character boundaries.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_tokens = max_tokens.max(1);
    let max_bytes_hint = max_tokens * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_end = 0;
    let mut tokens = 0;

    for (start, end) in sentences(text)
        .into_iter()
        .flat_map(|(s, e)| bounded(text, s, e, max_tokens, max_bytes_hint))
    {
        let sentence_tokens = estimate_tokens(&text[start..end]);
        if tokens + sentence_tokens > max_tokens && chunk_end > chunk_start {
            push_trimmed(text, chunk_start, chunk_end, &mut chunks);
            chunk_start = start;
            tokens = 0;
        }
        chunk_end = end;
        tokens += sentence_tokens;
    }
    push_trimmed(text, chunk_start, chunk_end, &mut chunks);
    chunks
}

/// Byte ranges of the sentences in `text`, delimiters included.
fn sentences(text: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < text.len() {
        if let Some(delimiter) = DELIMITERS.iter().find(|d| text[i..].starts_with(**d)) {
            i += delimiter.len();
            out.push((start, i));
            start = i;
        } else {
            i += text[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    if start < text.len() {
        out.push((start, text.len()));
    }
    out
}

/// Split an oversized sentence into pieces of at most `max_chars` characters.
fn bounded(
    text: &str,
    start: usize,
    end: usize,
    max_tokens: usize,
    max_chars: usize,
) -> Vec<(usize, usize)> {
    let sentence = &text[start..end];
    if estimate_tokens(sentence) <= max_tokens {
        return vec![(start, end)];
    }

    let mut pieces = Vec::new();
    let mut piece_start = start;
    for (count, (offset, _)) in sentence.char_indices().enumerate() {
        if count > 0 && count % max_chars == 0 {
            pieces.push((piece_start, start + offset));
            piece_start = start + offset;
        }
    }
    pieces.push((piece_start, end));
    pieces
}

fn push_trimmed(text: &str, start: usize, end: usize, chunks: &mut Vec<Chunk>) {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let byte_start = start + (slice.len() - slice.trim_start().len());
    let char_start = text[..byte_start].chars().count();
    chunks.push(Chunk {
        start: char_start,
        end: char_start + trimmed.chars().count(),
        text: trimmed.to_string(),
    });
}
