//! Line-granular edits.
//!
//! Backends usually think in whole lines. A [`LineReplacement`] replaces the
//! zero-based, end-exclusive line range `line_range` with `new_lines`. An empty
//! range inserts lines before `line_range.start`; a range starting at the line
//! count appends after the last line.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::edit::{Edit, Replacement};
use super::position::LineIndex;
use crate::error::{NesError, NesResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineReplacement {
    pub line_range: Range<usize>,
    pub new_lines: Vec<String>,
}

impl LineReplacement {
    pub fn new<S: Into<String>>(
        line_range: Range<usize>,
        new_lines: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            line_range,
            new_lines: new_lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Translate into a byte-offset replacement over `index`'s text.
    pub fn to_replacement(&self, index: &LineIndex<'_>) -> NesResult<Replacement> {
        let line_count = index.line_count();
        let Range { start, end } = self.line_range.clone();
        if start > end || end > line_count {
            return Err(NesError::invalid_edit(format!(
                "line range {start}..{end} does not fit {line_count} lines"
            )));
        }
        let text_len = index.text().len();
        let line_start = |line: usize| index.line_start(line).unwrap_or(text_len);

        if end < line_count {
            let new_text: String = self.new_lines.iter().map(|l| format!("{l}\n")).collect();
            return Ok(Replacement::new(line_start(start), line_start(end), new_text));
        }

        if start == line_count {
            if self.new_lines.is_empty() {
                return Ok(Replacement::insert(text_len, ""));
            }
            return Ok(Replacement::insert(
                text_len,
                format!("\n{}", self.new_lines.join("\n")),
            ));
        }

        // Replacing through the last line: the final line has no newline to consume.
        if self.new_lines.is_empty() && start > 0 {
            return Ok(Replacement::new(line_start(start) - 1, text_len, ""));
        }
        Ok(Replacement::new(
            line_start(start),
            text_len,
            self.new_lines.join("\n"),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    replacements: Vec<LineReplacement>,
}

impl LineEdit {
    pub fn new(mut replacements: Vec<LineReplacement>) -> NesResult<Self> {
        replacements.sort_by_key(|r| (r.line_range.start, r.line_range.end));
        for pair in replacements.windows(2) {
            if pair[0].line_range.end > pair[1].line_range.start {
                return Err(NesError::invalid_edit(format!(
                    "line ranges {:?} and {:?} overlap",
                    pair[0].line_range, pair[1].line_range
                )));
            }
        }
        Ok(Self { replacements })
    }

    pub fn single(replacement: LineReplacement) -> Self {
        Self {
            replacements: vec![replacement],
        }
    }

    pub fn replacements(&self) -> &[LineReplacement] {
        &self.replacements
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn to_edit(&self, base: &str) -> NesResult<Edit> {
        let index = LineIndex::new(base);
        let replacements = self
            .replacements
            .iter()
            .map(|r| r.to_replacement(&index))
            .collect::<NesResult<Vec<_>>>()?;
        Edit::new(replacements)
    }

    /// Widen every replacement of `edit` to the whole lines it touches.
    pub fn from_edit(edit: &Edit, base: &str) -> NesResult<Self> {
        edit.validate(base)?;
        let index = LineIndex::new(base);
        let mut replacements = Vec::new();
        let mut group: Vec<&Replacement> = Vec::new();
        let mut group_end_line = 0;

        for r in edit.replacements() {
            let first_line = index.line_of_offset(r.range.start);
            let last_line = index.line_of_offset(r.range.end);
            if !group.is_empty() && first_line > group_end_line {
                replacements.push(widen_group(&group, &index)?);
                group.clear();
            }
            group_end_line = if group.is_empty() {
                last_line
            } else {
                group_end_line.max(last_line)
            };
            group.push(r);
        }
        if !group.is_empty() {
            replacements.push(widen_group(&group, &index)?);
        }
        Ok(Self { replacements })
    }
}

fn widen_group(group: &[&Replacement], index: &LineIndex<'_>) -> NesResult<LineReplacement> {
    let text = index.text();
    let (Some(first), Some(last)) = (group.first(), group.last()) else {
        return Err(NesError::invalid_edit("empty replacement group"));
    };
    let first_line = index.line_of_offset(first.range.start);
    let last_line = index.line_of_offset(last.range.end);
    let region_start = index.line_start(first_line).unwrap_or(text.len());
    let region_end = index.line_end(last_line).unwrap_or(text.len());

    let mut content = String::new();
    let mut cursor = region_start;
    for r in group {
        content.push_str(&text[cursor..r.range.start]);
        content.push_str(&r.new_text);
        cursor = r.range.end;
    }
    content.push_str(&text[cursor.min(region_end)..region_end]);

    Ok(LineReplacement::new(
        first_line..last_line + 1,
        content.split('\n'),
    ))
}
