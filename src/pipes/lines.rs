//! Splits a byte stream into lines, bounding the length of any one line.

use super::{MAX_LINE_LENGTH, TRUNCATION_MARKER};

/// Incremental line splitter for one output stream.
///
/// A pending line that grows past [`MAX_LINE_LENGTH`] is emitted at that
/// length with [`TRUNCATION_MARKER`] appended, and the remainder is carried
/// forward prefixed with the marker.
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::with_max(MAX_LINE_LENGTH)
    }

    pub fn with_max(max: usize) -> Self {
        Self {
            pending: Vec::new(),
            max: max.max(TRUNCATION_MARKER.len() + 4),
        }
    }

    /// Feed a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(at) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..at]);
            self.truncate_into(&mut lines);
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
            rest = &rest[at + 1..];
        }

        self.pending.extend_from_slice(rest);
        self.truncate_into(&mut lines);
        lines
    }

    /// Take the unterminated tail, if any.
    pub fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn truncate_into(&mut self, lines: &mut Vec<String>) {
        while self.pending.len() > self.max {
            let cut = char_boundary(&self.pending, self.max);
            let mut head = String::from_utf8_lossy(&self.pending[..cut]).into_owned();
            head.push_str(TRUNCATION_MARKER);
            lines.push(head);

            let mut carried = Vec::with_capacity(self.pending.len() - cut + TRUNCATION_MARKER.len());
            carried.extend_from_slice(TRUNCATION_MARKER.as_bytes());
            carried.extend_from_slice(&self.pending[cut..]);
            self.pending = carried;
        }
    }
}

/// Largest cut point `<= at` that does not split a UTF-8 sequence. Falls back
/// to `at` when the bytes there are not UTF-8 at all.
fn char_boundary(bytes: &[u8], at: usize) -> usize {
    let mut cut = at;
    while cut > at.saturating_sub(3) && cut < bytes.len() && (bytes[cut] & 0xC0) == 0x80 {
        cut -= 1;
    }
    if cut == 0 || (cut < bytes.len() && (bytes[cut] & 0xC0) == 0x80) {
        at
    } else {
        cut
    }
}
