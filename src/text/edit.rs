//! Offset-based text edits and their algebra.
//!
//! An [`Edit`] is a sorted set of non-overlapping [`Replacement`]s over one text.
//! All offsets are UTF-8 byte offsets and must fall on char boundaries of the
//! text the edit is applied to.
//!
//! Normalization rules applied by every constructor:
//! - replacements are sorted by start offset
//! - replacements sharing an endpoint are merged into one
//! - structural no-ops (empty range, empty text) are dropped
//!
//! [`Edit::compose`] joins two sequential edits into one edit over the first
//! edit's input. It never needs the base text: every position the composed edit
//! touches is either covered by the first edit's inserted text or by the second
//! edit's replacements.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;

use super::range::OffsetRange;
use crate::error::{NesError, NesResult};

/// How an offset sitting exactly on an insertion point is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Stay before text inserted at the offset.
    Left,
    /// Move past text inserted at the offset.
    Right,
}

/// Replace the bytes in `range` with `new_text`.
///
/// Serialized as a `[start, end, newText]` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize, String)", into = "(usize, usize, String)")]
pub struct Replacement {
    pub range: OffsetRange,
    pub new_text: String,
}

impl Replacement {
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            range: OffsetRange::new(start, end),
            new_text: new_text.into(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::new(offset, offset, text)
    }

    pub fn delete(range: OffsetRange) -> Self {
        Self {
            range,
            new_text: String::new(),
        }
    }

    /// Empty range and empty text: applying it changes nothing.
    pub fn is_noop(&self) -> bool {
        self.range.is_empty() && self.new_text.is_empty()
    }

    /// Change in text length caused by this replacement.
    pub fn delta(&self) -> isize {
        self.new_text.len() as isize - self.range.len() as isize
    }

    /// Check that the replacement fits `base`.
    pub fn validate(&self, base: &str) -> NesResult<()> {
        if self.range.end > base.len() {
            return Err(NesError::invalid_edit(format!(
                "replacement {} exceeds text length {}",
                self.range,
                base.len()
            )));
        }
        if !base.is_char_boundary(self.range.start) || !base.is_char_boundary(self.range.end) {
            return Err(NesError::invalid_edit(format!(
                "replacement {} splits a character",
                self.range
            )));
        }
        Ok(())
    }

    pub fn apply(&self, base: &str) -> NesResult<String> {
        Edit::single(self.clone()).apply(base)
    }

    /// Shrink the replacement by dropping text it would leave unchanged at
    /// either end.
    pub fn remove_common_affixes(&self, base: &str) -> NesResult<Replacement> {
        self.validate(base)?;
        let old = &base[self.range.start..self.range.end];
        let new = self.new_text.as_str();
        let prefix = common_prefix_len(old, new);
        let suffix = common_suffix_len(&old[prefix..], &new[prefix..]);
        Ok(Replacement::new(
            self.range.start + prefix,
            self.range.end - suffix,
            &new[prefix..new.len() - suffix],
        ))
    }
}

impl From<(usize, usize, String)> for Replacement {
    fn from((start, end, new_text): (usize, usize, String)) -> Self {
        Self {
            range: OffsetRange::from((start, end)),
            new_text,
        }
    }
}

impl From<Replacement> for (usize, usize, String) {
    fn from(replacement: Replacement) -> Self {
        (
            replacement.range.start,
            replacement.range.end,
            replacement.new_text,
        )
    }
}

/// A normalized set of replacements over a single text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Replacement>", into = "Vec<Replacement>")]
pub struct Edit {
    replacements: Vec<Replacement>,
}

impl Edit {
    /// Build an edit, rejecting overlapping replacements.
    pub fn new(mut replacements: Vec<Replacement>) -> NesResult<Self> {
        replacements.sort_by_key(|r| (r.range.start, r.range.end));
        for pair in replacements.windows(2) {
            if pair[0].range.end > pair[1].range.start {
                return Err(NesError::invalid_edit(format!(
                    "replacements {} and {} overlap",
                    pair[0].range, pair[1].range
                )));
            }
        }
        Ok(Self::from_sorted(replacements))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(replacement: Replacement) -> Self {
        Self::from_sorted(vec![replacement])
    }

    /// Normalize replacements that are already sorted and non-overlapping.
    fn from_sorted(replacements: Vec<Replacement>) -> Self {
        let mut normalized: Vec<Replacement> = Vec::with_capacity(replacements.len());
        for replacement in replacements {
            if replacement.is_noop() {
                continue;
            }
            match normalized.last_mut() {
                Some(last) if last.range.end == replacement.range.start => {
                    last.range.end = replacement.range.end;
                    last.new_text.push_str(&replacement.new_text);
                }
                _ => normalized.push(replacement),
            }
        }
        debug_assert!(
            normalized
                .windows(2)
                .all(|pair| pair[0].range.end < pair[1].range.start)
        );
        Self {
            replacements: normalized,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn into_replacements(self) -> Vec<Replacement> {
        self.replacements
    }

    /// Check that every replacement fits `base`.
    pub fn validate(&self, base: &str) -> NesResult<()> {
        self.replacements.iter().try_for_each(|r| r.validate(base))
    }

    pub fn apply(&self, base: &str) -> NesResult<String> {
        self.validate(base)?;
        let mut result = String::with_capacity(
            base.len()
                .saturating_add_signed(self.replacements.iter().map(Replacement::delta).sum::<isize>()),
        );
        let mut cursor = 0;
        for replacement in &self.replacements {
            result.push_str(&base[cursor..replacement.range.start]);
            result.push_str(&replacement.new_text);
            cursor = replacement.range.end;
        }
        result.push_str(&base[cursor..]);
        Ok(result)
    }

    /// Ranges the replacements occupy in the edited text.
    pub fn new_ranges(&self) -> Vec<OffsetRange> {
        let mut delta: isize = 0;
        self.replacements
            .iter()
            .map(|r| {
                let start = r.range.start.saturating_add_signed(delta);
                delta += r.delta();
                OffsetRange::new(start, start + r.new_text.len())
            })
            .collect()
    }

    /// Map an offset of the original text into the edited text.
    ///
    /// Returns `None` when the offset lies strictly inside a replaced range.
    pub fn map_offset(&self, offset: usize, bias: Bias) -> Option<usize> {
        let mut delta: isize = 0;
        for r in &self.replacements {
            if r.range.end < offset || (r.range.end == offset && !r.range.is_empty()) {
                delta += r.delta();
                continue;
            }
            if r.range.is_empty() && r.range.start == offset {
                if bias == Bias::Right {
                    delta += r.delta();
                }
                continue;
            }
            if r.range.start < offset {
                return None;
            }
            break;
        }
        Some(offset.saturating_add_signed(delta))
    }

    /// Combine `self` followed by `next` into one edit over `self`'s input.
    ///
    /// `next` is expressed in the offset space of `self`'s output.
    pub fn compose(&self, next: &Edit) -> Edit {
        if self.is_empty() {
            return next.clone();
        }
        if next.is_empty() {
            return self.clone();
        }

        let mut spans: Vec<Span<'_>> = Vec::with_capacity(self.len() + next.len());
        let mut delta: isize = 0;
        for r in &self.replacements {
            let start = r.range.start.saturating_add_signed(delta);
            spans.push(Span {
                range: OffsetRange::new(start, start + r.new_text.len()),
                text: &r.new_text,
                delta: r.delta(),
                from_first: true,
            });
            delta += r.delta();
        }
        spans.extend(next.replacements.iter().map(|r| Span {
            range: r.range,
            text: &r.new_text,
            delta: 0,
            from_first: false,
        }));
        spans.sort_by_key(|span| (span.range.start, span.range.end));

        let mut composed = Vec::new();
        let mut delta_before: isize = 0;
        let mut cluster: Vec<Span<'_>> = Vec::new();
        let mut cluster_end = 0;
        for span in spans {
            if !cluster.is_empty() && span.range.start > cluster_end {
                composed.push(compose_cluster(&cluster, &mut delta_before));
                cluster.clear();
            }
            cluster_end = if cluster.is_empty() {
                span.range.end
            } else {
                cluster_end.max(span.range.end)
            };
            cluster.push(span);
        }
        if !cluster.is_empty() {
            composed.push(compose_cluster(&cluster, &mut delta_before));
        }

        Self::from_sorted(composed)
    }

    /// The edit that turns the result of applying `self` to `base` back into `base`.
    pub fn invert(&self, base: &str) -> NesResult<Edit> {
        self.validate(base)?;
        let mut delta: isize = 0;
        let inverted = self
            .replacements
            .iter()
            .map(|r| {
                let start = r.range.start.saturating_add_signed(delta);
                delta += r.delta();
                Replacement::new(
                    start,
                    start + r.new_text.len(),
                    &base[r.range.start..r.range.end],
                )
            })
            .collect();
        Ok(Self::from_sorted(inverted))
    }

    /// Compute a minimal character-level edit turning `before` into `after`.
    pub fn diff(before: &str, after: &str) -> Edit {
        let prefix = common_prefix_len(before, after);
        let suffix = common_suffix_len(&before[prefix..], &after[prefix..]);
        let old_mid = &before[prefix..before.len() - suffix];
        let new_mid = &after[prefix..after.len() - suffix];
        if old_mid.is_empty() && new_mid.is_empty() {
            return Edit::empty();
        }
        if old_mid.is_empty() || new_mid.is_empty() {
            return Edit::single(Replacement::new(
                prefix,
                prefix + old_mid.len(),
                new_mid,
            ));
        }

        let diff = TextDiff::from_chars(old_mid, new_mid);
        let mut replacements = Vec::new();
        let mut pending: Option<Replacement> = None;
        let mut old_pos = prefix;
        for change in diff.iter_all_changes() {
            let value = change.value();
            match change.tag() {
                ChangeTag::Equal => {
                    replacements.extend(pending.take());
                    old_pos += value.len();
                }
                ChangeTag::Delete => {
                    let pending = pending.get_or_insert_with(|| Replacement::insert(old_pos, ""));
                    old_pos += value.len();
                    pending.range.end = old_pos;
                }
                ChangeTag::Insert => {
                    pending
                        .get_or_insert_with(|| Replacement::insert(old_pos, ""))
                        .new_text
                        .push_str(value);
                }
            }
        }
        replacements.extend(pending);
        Self::from_sorted(replacements)
    }

    /// Collapse the edit into one replacement spanning all of its replacements.
    pub fn to_single_replacement(&self, base: &str) -> NesResult<Option<Replacement>> {
        self.validate(base)?;
        let (Some(first), Some(last)) = (self.replacements.first(), self.replacements.last())
        else {
            return Ok(None);
        };
        let mut text = String::new();
        let mut cursor = first.range.start;
        for r in &self.replacements {
            text.push_str(&base[cursor..r.range.start]);
            text.push_str(&r.new_text);
            cursor = r.range.end;
        }
        Ok(Some(Replacement::new(first.range.start, last.range.end, text)))
    }

    pub fn to_json(&self) -> String {
        // Serializing plain tuples of numbers and strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> NesResult<Edit> {
        Ok(serde_json::from_str(json)?)
    }
}

impl TryFrom<Vec<Replacement>> for Edit {
    type Error = NesError;

    fn try_from(replacements: Vec<Replacement>) -> Result<Self, Self::Error> {
        Edit::new(replacements)
    }
}

impl From<Edit> for Vec<Replacement> {
    fn from(edit: Edit) -> Self {
        edit.replacements
    }
}

impl From<Replacement> for Edit {
    fn from(replacement: Replacement) -> Self {
        Edit::single(replacement)
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Combine `first` and `second` applied in sequence. See [`Edit::compose`].
pub fn compose(first: &Edit, second: &Edit) -> Edit {
    first.compose(second)
}

/// A replacement of either edit, positioned in the intermediate text.
struct Span<'a> {
    range: OffsetRange,
    text: &'a str,
    delta: isize,
    from_first: bool,
}

/// Turn a connected run of spans into one replacement over the original text.
fn compose_cluster(cluster: &[Span<'_>], delta_before: &mut isize) -> Replacement {
    let start = cluster.iter().map(|s| s.range.start).min().unwrap_or(0);
    let end = cluster.iter().map(|s| s.range.end).max().unwrap_or(start);
    let cluster_delta: isize = cluster.iter().map(|s| s.delta).sum();

    let firsts: Vec<&Span<'_>> = cluster.iter().filter(|s| s.from_first).collect();
    let mut text = String::new();
    let mut pos = start;
    for second in cluster.iter().filter(|s| !s.from_first) {
        push_first_text(&mut text, &firsts, pos, second.range.start);
        text.push_str(second.text);
        pos = second.range.end;
    }
    push_first_text(&mut text, &firsts, pos, end);

    let original = Replacement::new(
        start.saturating_add_signed(-*delta_before),
        end.saturating_add_signed(-(*delta_before + cluster_delta)),
        text,
    );
    *delta_before += cluster_delta;
    original
}

/// Append the first edit's inserted text that covers `[from, to)` of the
/// intermediate text.
fn push_first_text(out: &mut String, firsts: &[&Span<'_>], from: usize, to: usize) {
    if from >= to {
        return;
    }
    for span in firsts {
        let start = from.max(span.range.start);
        let end = to.min(span.range.end);
        if start < end {
            out.push_str(&span.text[start - span.range.start..end - span.range.start]);
        }
    }
}

/// Length in bytes of the longest common prefix, on a char boundary.
pub(crate) fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((index, _), _)| index)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Length in bytes of the longest common suffix, on a char boundary.
pub(crate) fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(ca, cb)| ca == cb)
        .map(|(ca, _)| ca.len_utf8())
        .sum()
}
