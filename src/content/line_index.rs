//! Per-file table of line start offsets
//!
//! Offsets count characters (Unicode scalar values), not bytes. `\n`, `\r\n`
//! and a lone `\r` all terminate a line.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        let mut chars = text.chars().peekable();
        let mut offset = 0;

        while let Some(ch) = chars.next() {
            offset += 1;
            match ch {
                '\n' => starts.push(offset),
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                        offset += 1;
                    }
                    starts.push(offset);
                }
                _ => {}
            }
        }

        Self { starts, len: offset }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Total length of the text in characters
    pub fn text_len(&self) -> usize {
        self.len
    }

    /// Offset of the first character of 0-based `line`
    ///
    /// Lines past the end resolve to the end of the text.
    pub fn line_start_offset(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(self.len)
    }
}
