//! Parser result plumbing and positioned parse errors.

use nom::error::{VerboseError, VerboseErrorKind};
use nom::{Err, IResult};
use std::io::Write;
use thiserror::Error;

/// Parser result, with verbose error.
pub type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// A broad classification of parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnterminatedString,
    UnterminatedComment,
    UnexpectedEof,
    UnknownOperator,
    UnexpectedToken,
}

/// A parse failure with its position in the source.
///
/// `offset` is a byte offset; `line` and `column` are 1-based, columns
/// counted in characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    /// Condense a nom error into one positioned error, keeping the
    /// innermost contextual expectation.
    pub fn from_nom(source: &str, error: Err<VerboseError<&str>>) -> Self {
        let (rest, message) = match &error {
            Err::Failure(VerboseError { errors }) | Err::Error(VerboseError { errors }) => errors
                .iter()
                .find_map(|(rest, kind)| get_message(kind).map(|msg| (*rest, msg)))
                .or_else(|| {
                    errors
                        .first()
                        .map(|(rest, kind)| (*rest, format!("unexpected input ({:?})", kind)))
                })
                .unwrap_or((source, "unknown parse error".to_string())),
            Err::Incomplete(_) => ("", "unexpected end of input".to_string()),
        };
        let offset = source.len() - rest.len();
        let (line, column) = line_column(source, offset);
        ParseError {
            kind: classify(&message, rest),
            offset,
            line,
            column,
            message,
        }
    }
}

fn classify(message: &str, rest: &str) -> ParseErrorKind {
    if message.contains("unterminated string") {
        ParseErrorKind::UnterminatedString
    } else if message.contains("unterminated block comment") {
        ParseErrorKind::UnterminatedComment
    } else if message.contains("unknown operator") {
        ParseErrorKind::UnknownOperator
    } else if rest.is_empty() {
        ParseErrorKind::UnexpectedEof
    } else {
        ParseErrorKind::UnexpectedToken
    }
}

fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = bytecount::count(before.as_bytes(), b'\n') + 1;
    let line_start = before.rfind('\n').map_or(0, |at| at + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Write every contextual message of a parse failure with a caret
/// pointing into the offending line, one `prefix`ed block per message.
pub fn show_errors(
    out: &mut impl Write,
    source: &str,
    error: &Err<VerboseError<&str>>,
    prefix: &str,
) {
    match error {
        Err::Failure(VerboseError { errors }) | Err::Error(VerboseError { errors }) => {
            for (rest, err) in errors.iter().rev() {
                if let Some(message) = get_message(err) {
                    let pos = source.len() - rest.len();
                    show_error(out, source, pos, &message, prefix);
                }
            }
        }
        Err::Incomplete(needed) => {
            let msg = format!("Incomplete: {:?}", needed);
            show_error(out, source, 0, &msg, prefix);
        }
    }
}

fn get_message(err: &VerboseErrorKind) -> Option<String> {
    match err {
        VerboseErrorKind::Context(msg) => Some((*msg).into()),
        VerboseErrorKind::Char(ch) => Some(format!("Expected {:?}", ch)),
        VerboseErrorKind::Nom(_err) => None,
    }
}

fn show_error(out: &mut impl Write, source: &str, pos: usize, msg: &str, prefix: &str) {
    let (line_no, pos_in_line) = line_column(source, pos);
    let line_start = source[..pos].rfind('\n').map_or(0, |at| at + 1);
    let line = source[line_start..].split('\n').next().unwrap_or("");
    writeln!(
        out,
        "{prefix}{:>4}:{}\n\
         {prefix}     {:>pos$} {}",
        line_no,
        line,
        "^",
        msg,
        pos = pos_in_line,
        prefix = prefix,
    )
    .unwrap();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn positions_are_one_based() {
        assert_eq!(line_column("abc", 0), (1, 1));
        assert_eq!(line_column("abc\ndef", 5), (2, 2));
    }

    #[test]
    fn classification() {
        assert_eq!(
            classify("unterminated string literal", "x"),
            ParseErrorKind::UnterminatedString,
        );
        assert_eq!(
            classify("unterminated block comment", ""),
            ParseErrorKind::UnterminatedComment,
        );
        assert_eq!(classify("expected '}'", ""), ParseErrorKind::UnexpectedEof);
        assert_eq!(classify("expected '}'", "x"), ParseErrorKind::UnexpectedToken);
    }
}
