//! Character offset helpers for text nodes
//!
//! Offsets inside text nodes are counted in `char`s. Caret stepping moves
//! by extended grapheme clusters so a combining sequence is never split.

use unicode_segmentation::UnicodeSegmentation;

/// Number of chars in a string
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of a char offset, clamped to the end of the string
pub fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Slice a string by char offsets
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let start = byte_index(text, start);
    let end = byte_index(text, end).max(start);
    &text[start..end]
}

/// Char offset of the grapheme boundary following `char_offset`
pub fn next_grapheme_boundary(text: &str, char_offset: usize) -> usize {
    let rest = &text[byte_index(text, char_offset)..];
    match rest.graphemes(true).next() {
        Some(grapheme) => char_offset + grapheme.chars().count(),
        None => char_offset,
    }
}

/// Char offset of the grapheme boundary preceding `char_offset`
pub fn previous_grapheme_boundary(text: &str, char_offset: usize) -> usize {
    let head = &text[..byte_index(text, char_offset)];
    match head.graphemes(true).next_back() {
        Some(grapheme) => char_offset.saturating_sub(grapheme.chars().count()),
        None => char_offset,
    }
}
