//! Character-window chunking of document text into overlapping segments.
//!
//! Chunk boundaries are a pure function of the input text and the
//! (chunk_chars, overlap_chars) parameters, so re-chunking identical input
//! always yields identical chunks.

/// Default chunk window in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 500;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 50;

/// Split text into whitespace-trimmed character windows.
///
/// Each window is `chunk_chars` characters long (the final window may be
/// shorter), and consecutive windows share `overlap_chars` characters.
/// Windows that are empty after trimming are skipped. Empty input yields
/// no chunks. Counts are in characters, not bytes, so multi-byte UTF-8
/// input never splits inside a code point.
///
/// # Examples
///
/// ```
/// use chunkfuse::chunking::chunk_text;
///
/// let chunks = chunk_text("hello world", 500, 50);
/// assert_eq!(chunks, vec!["hello world".to_string()]);
///
/// assert!(chunk_text("", 500, 50).is_empty());
/// ```
pub fn chunk_text(
    text: &str,
    chunk_chars: usize,
    overlap_chars: usize,
) -> Vec<String> {
    if text.is_empty() || chunk_chars == 0 {
        return Vec::new();
    }

    // Map of char index -> byte index for O(1) window slicing.
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = char_to_byte.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < char_count {
        let end = (start + chunk_chars).min(char_count);

        let window = &text[char_to_byte[start]..char_to_byte[end]];
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == char_count {
            break;
        }

        // Restart inside the previous window to keep the overlap region.
        // The step must advance by at least one char to terminate.
        let next = end.saturating_sub(overlap_chars);
        start = next.max(start + 1);
    }

    chunks
}
