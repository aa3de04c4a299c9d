use similar::{Algorithm, DiffTag, capture_diff_slices, group_diff_ops};
use std::fmt::Write;

/// Lines of context kept around each change.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Render a line diff of `before` -> `after` in unified style.
///
/// Lines are split on `\n` so a trailing newline shows up as an empty last
/// line. Hunk headers use one-based line numbers.
pub fn render_line_diff(before: &str, after: &str, context: usize) -> String {
    if before == after {
        return String::new();
    }
    let old: Vec<&str> = before.split('\n').collect();
    let new: Vec<&str> = after.split('\n').collect();
    let ops = capture_diff_slices(Algorithm::Myers, &old, &new);

    let mut out = String::new();
    for group in group_diff_ops(ops, context) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let new_start = first.new_range().start;
        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            old_start + 1,
            last.old_range().end - old_start,
            new_start + 1,
            last.new_range().end - new_start
        );
        for op in &group {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => push_lines(&mut out, ' ', &old[old_range]),
                DiffTag::Delete => push_lines(&mut out, '-', &old[old_range]),
                DiffTag::Insert => push_lines(&mut out, '+', &new[new_range]),
                DiffTag::Replace => {
                    push_lines(&mut out, '-', &old[old_range]);
                    push_lines(&mut out, '+', &new[new_range]);
                }
            }
        }
    }
    out
}

fn push_lines(out: &mut String, sign: char, lines: &[&str]) {
    for line in lines {
        out.push(sign);
        out.push_str(line);
        out.push('\n');
    }
}
