//! The post-parse refinement pass.
//!
//! Authors indent template bodies so the source reads well; rendered
//! output must not depend on that.  Refinement runs once per template,
//! right after parsing, and rewrites the plain-text leaves so the
//! output is the same however deeply the source was nested:
//!
//! 1. indentation stripping — up to `depth * 4` leading spaces per
//!    line (a tab counts as 4); anything deeper is content;
//! 2. comment-line collapse — a comment alone on its line leaves no
//!    blank line behind;
//! 3. boundary trimming — the blank lines (or single spaces) that the
//!    `{` and `}` of a block inevitably create are discarded.

use crate::templateexpression::{MessageExpression, TemplateExpression};

/// Refine a text-template body in place.  The body's direct children
/// are one block deep.
pub fn refine_template_body(body: &mut Vec<TemplateExpression>) {
    refine_block(body, 1);
}

/// Refine a messages-template body in place.
pub fn refine_messages_body(body: &mut Vec<MessageExpression>) {
    refine_message_block(body, 1);
}

fn refine_block(children: &mut Vec<TemplateExpression>, depth: usize) {
    for child in children.iter_mut() {
        match child {
            TemplateExpression::IfBlock {
                body, else_body, ..
            } => {
                refine_block(body, depth + 1);
                if let Some(else_body) = else_body {
                    refine_else(else_body, depth);
                }
            }
            TemplateExpression::ForLoop { body, .. } => refine_block(body, depth + 1),
            _ => {}
        }
    }

    for child in children.iter_mut() {
        if let TemplateExpression::Text { text } = child {
            *text = strip_indentation(text, depth);
        }
    }

    collapse_comments(children);
    merge_text(children);

    if let Some(TemplateExpression::Text { text }) = children.first_mut() {
        trim_leading(text);
    }
    if let Some(TemplateExpression::Text { text }) = children.last_mut() {
        trim_trailing(text);
    }
    merge_text(children);
}

/// An `else if` chain stays at the depth of its sibling `if`.
fn refine_else(else_body: &mut Vec<TemplateExpression>, depth: usize) {
    if let [TemplateExpression::IfBlock {
        body, else_body, ..
    }] = else_body.as_mut_slice()
    {
        refine_block(body, depth + 1);
        if let Some(inner) = else_body {
            refine_else(inner, depth);
        }
    } else {
        refine_block(else_body, depth + 1);
    }
}

fn refine_message_block(children: &mut Vec<MessageExpression>, depth: usize) {
    for child in children.iter_mut() {
        match child {
            MessageExpression::Entry { body, .. } => refine_block(body, depth + 1),
            MessageExpression::IfBlock {
                body, else_body, ..
            } => {
                refine_message_block(body, depth + 1);
                if let Some(else_body) = else_body {
                    refine_message_else(else_body, depth);
                }
            }
            MessageExpression::ForLoop { body, .. } => {
                refine_message_block(body, depth + 1)
            }
            _ => {}
        }
    }
}

fn refine_message_else(else_body: &mut Vec<MessageExpression>, depth: usize) {
    if let [MessageExpression::IfBlock {
        body, else_body, ..
    }] = else_body.as_mut_slice()
    {
        refine_message_block(body, depth + 1);
        if let Some(inner) = else_body {
            refine_message_else(inner, depth);
        }
    } else {
        refine_message_block(else_body, depth + 1);
    }
}

/// Remove up to `depth * 4` leading spaces from every line start
/// within `text`.  The first segment is not a line start here; the
/// newline that precedes it lives in an earlier sibling or not at all.
fn strip_indentation(text: &str, depth: usize) -> String {
    let limit = depth * 4;
    let mut segments = text.split('\n');
    let mut out = String::with_capacity(text.len());
    if let Some(first) = segments.next() {
        out.push_str(first);
    }
    for segment in segments {
        out.push('\n');
        out.push_str(strip_up_to(segment, limit));
    }
    out
}

fn strip_up_to(line: &str, limit: usize) -> &str {
    let mut used = 0;
    let mut bytes = 0;
    for c in line.chars() {
        used += match c {
            ' ' => 1,
            '\t' => 4,
            _ => break,
        };
        if used > limit {
            break;
        }
        bytes += c.len_utf8();
    }
    &line[bytes..]
}

/// Remove comment nodes.  A comment alone on its source line (blank to
/// its left back to a newline, blank to its right up to a newline)
/// also takes the left-hand line break with it, so the line vanishes.
fn collapse_comments(children: &mut Vec<TemplateExpression>) {
    let mut i = 0;
    while i < children.len() {
        if !matches!(children[i], TemplateExpression::Comment) {
            i += 1;
            continue;
        }
        let left_blank = i > 0
            && matches!(&children[i - 1], TemplateExpression::Text { text }
                if text.trim_end_matches([' ', '\t']).ends_with('\n'));
        let right_blank = i + 1 < children.len()
            && matches!(&children[i + 1], TemplateExpression::Text { text }
                if text.trim_start_matches([' ', '\t']).starts_with('\n')
                    || text.trim_start_matches([' ', '\t']).starts_with("\r\n"));
        if left_blank && right_blank {
            if let TemplateExpression::Text { text } = &mut children[i - 1] {
                drop_trailing_newline(text);
            }
        }
        children.remove(i);
    }
}

fn drop_trailing_newline(text: &mut String) {
    while text.ends_with(' ') || text.ends_with('\t') {
        text.pop();
    }
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
}

/// Discard a blank first line with its newline; a first line with
/// content sheds the single space the `{` contributed.
fn trim_leading(text: &mut String) {
    match text.find('\n') {
        Some(end) if text[..end].trim().is_empty() => {
            text.drain(..=end);
        }
        _ => {
            if text.starts_with(' ') {
                text.remove(0);
            }
        }
    }
}

/// Discard the content of a blank last line, keeping its newline; a
/// last line with content sheds the single space before the `}`.
fn trim_trailing(text: &mut String) {
    match text.rfind('\n') {
        Some(pos) if text[pos + 1..].chars().all(|c| c == ' ' || c == '\t') => {
            text.truncate(pos + 1);
        }
        _ => {
            if text.ends_with(' ') {
                text.pop();
            }
        }
    }
}

fn merge_text(children: &mut Vec<TemplateExpression>) {
    let mut i = 0;
    while i < children.len() {
        let empty = matches!(&children[i], TemplateExpression::Text { text } if text.is_empty());
        if empty {
            children.remove(i);
            continue;
        }
        if i + 1 < children.len() {
            if let (
                TemplateExpression::Text { .. },
                TemplateExpression::Text { text: next },
            ) = {
                let (a, b) = children.split_at_mut(i + 1);
                (&a[i], &mut b[0])
            } {
                let tail = std::mem::take(next);
                if let TemplateExpression::Text { text } = &mut children[i] {
                    text.push_str(&tail);
                }
                children.remove(i + 1);
                continue;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::templateexpression::template_block;

    fn refined(source: &str) -> Vec<TemplateExpression> {
        let (rest, mut body) = template_block(source).expect("parse");
        assert_eq!(rest, "");
        refine_template_body(&mut body);
        body
    }

    fn text_of(body: &[TemplateExpression]) -> String {
        body.iter()
            .map(|child| match child {
                TemplateExpression::Text { text } => text.as_str(),
                _ => "§",
            })
            .collect()
    }

    #[test]
    fn single_line_block_sheds_its_padding() {
        assert_eq!(text_of(&refined("{ Hello }")), "Hello");
    }

    #[test]
    fn brace_lines_disappear() {
        assert_eq!(text_of(&refined("{\n    Hello\n}")), "Hello\n");
    }

    #[test]
    fn indentation_is_stripped_per_depth() {
        let body = refined("{\n    Hello\n    @if x {\n        Deep\n    }\n}");
        match &body[1] {
            TemplateExpression::IfBlock { body, .. } => {
                assert_eq!(text_of(body), "Deep\n");
            }
            other => panic!("expected if, got {:?}", other),
        }
        assert_eq!(text_of(&body), "Hello\n§\n");
    }

    #[test]
    fn extra_indentation_is_content() {
        assert_eq!(
            text_of(&refined("{\n    keep:\n        indented\n}")),
            "keep:\n    indented\n",
        );
    }

    #[test]
    fn tabs_count_as_four() {
        assert_eq!(text_of(&refined("{\n\tHello\n}")), "Hello\n");
    }

    #[test]
    fn comment_only_line_vanishes() {
        assert_eq!(
            text_of(&refined("{\nline1\n@* note *@\nline2\n}")),
            "line1\nline2\n",
        );
        assert_eq!(
            text_of(&refined("{\nline1\n@// note\nline2\n}")),
            "line1\nline2\n",
        );
    }

    #[test]
    fn inline_comment_keeps_its_line() {
        assert_eq!(
            text_of(&refined("{\nline1 @* note *@\nline2\n}")),
            "line1 \nline2\n",
        );
    }

    #[test]
    fn leading_comment_line_vanishes() {
        assert_eq!(text_of(&refined("{\n@// header\nHello\n}")), "Hello\n");
    }

    #[test]
    fn adjacent_text_is_merged() {
        let body = refined("{ a@@b }");
        assert_eq!(body.len(), 1);
        assert_eq!(text_of(&body), "a@b");
    }
}
