/// Zero-based line and byte column within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinePosition {
    pub line: usize,
    pub column: usize,
}

/// Maps between byte offsets and line positions for one text.
///
/// Lines are separated by `\n`; a trailing newline starts an empty last line.
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Create a new LineIndex with pre-computed line starts
    pub fn new(text: &'a str) -> Self {
        let line_starts = compute_line_starts(text);
        Self { text, line_starts }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the byte offset of a line start
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Byte offset of the end of a line, excluding its newline.
    pub fn line_end(&self, line: usize) -> Option<usize> {
        if line + 1 < self.line_starts.len() {
            Some(self.line_starts[line + 1] - 1)
        } else if line < self.line_starts.len() {
            Some(self.text.len())
        } else {
            None
        }
    }

    /// Text of a line without its newline.
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        let start = self.line_start(line)?;
        let end = self.line_end(line)?;
        self.text.get(start..end)
    }

    pub fn line_of_offset(&self, offset: usize) -> usize {
        // Binary search for the line containing this offset
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        }
    }

    pub fn offset_to_position(&self, offset: usize) -> Option<LinePosition> {
        if offset > self.text.len() {
            return None;
        }
        let line = self.line_of_offset(offset);
        let line_start = self.line_start(line)?;
        Some(LinePosition {
            line,
            column: offset - line_start,
        })
    }

    /// Convert a line position to a byte offset, clamping columns past the line end.
    pub fn position_to_offset(&self, position: LinePosition) -> Option<usize> {
        let line_start = self.line_start(position.line)?;
        let line_end = self.line_end(position.line)?;
        Some((line_start + position.column).min(line_end))
    }
}

/// Compute line start offsets for efficient position mapping
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    let mut offset = 0;

    for ch in text.chars() {
        offset += ch.len_utf8();
        if ch == '\n' {
            line_starts.push(offset);
        }
    }

    line_starts
}
