use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open byte range `[start, end)` in a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} after end {end}");
        Self { start, end }
    }

    /// An empty range, i.e. a caret.
    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// True if the ranges share at least one position, counting touching endpoints.
    pub fn intersects_or_touches(&self, other: &OffsetRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn union(&self, other: &OffsetRange) -> OffsetRange {
        OffsetRange::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn shift(&self, delta: isize) -> OffsetRange {
        OffsetRange::new(
            self.start.saturating_add_signed(delta),
            self.end.saturating_add_signed(delta),
        )
    }
}

impl From<(usize, usize)> for OffsetRange {
    fn from((start, end): (usize, usize)) -> Self {
        // Deserialized input may be reversed; keep the invariant instead of panicking.
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }
}

impl From<OffsetRange> for (usize, usize) {
    fn from(range: OffsetRange) -> Self {
        (range.start, range.end)
    }
}

impl From<std::ops::Range<usize>> for OffsetRange {
    fn from(range: std::ops::Range<usize>) -> Self {
        OffsetRange::from((range.start, range.end))
    }
}

impl fmt::Display for OffsetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
