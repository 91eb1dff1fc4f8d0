//! Bracketed, comma-separated lists.
//!
//! Argument lists, constant array and object literals and `@metadata`
//! blocks all share the same surface: an opening delimiter, items
//! separated by commas (a trailing comma is allowed), a closing
//! delimiter.  The lists differ in their delimiters, their items and
//! what may pad them (`@metadata` allows comments between entries), so
//! the parser takes all three and reports a failed separator with the
//! name of the construct it was scanning.

use crate::parseresult::PResult;
use nom::character::complete::char;
use nom::error::{VerboseError, VerboseErrorKind};
use nom::Err;

/// Parse `open`, then items separated by commas, then `close`.
///
/// Each loop turn skips `pad` and tries `close` first, so an empty
/// list and a trailing comma both just work.  An item that fails where
/// one is required reports the item parser's own error; a missing
/// separator reports `expectation` at the offending position.
pub fn comma_list<'a, O, I, P>(
    open: char,
    mut item: I,
    close: char,
    mut pad: P,
    expectation: &'static str,
) -> impl FnMut(&'a str) -> PResult<'a, Vec<O>>
where
    I: FnMut(&'a str) -> PResult<'a, O>,
    P: FnMut(&'a str) -> PResult<'a, ()>,
{
    move |input| {
        let (mut rest, _) = char(open)(input)?;
        let mut items = Vec::new();
        loop {
            let (padded, ()) = pad(rest)?;
            if let Some(after) = padded.strip_prefix(close) {
                return Ok((after, items));
            }
            let (after_item, value) = item(padded)?;
            items.push(value);
            let (padded, ()) = pad(after_item)?;
            if let Some(after) = padded.strip_prefix(',') {
                rest = after;
            } else if let Some(after) = padded.strip_prefix(close) {
                return Ok((after, items));
            } else {
                return Err(Err::Error(VerboseError {
                    errors: vec![(padded, VerboseErrorKind::Context(expectation))],
                }));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::comma_list;
    use crate::expression::identifier;
    use nom::character::complete::multispace0;
    use nom::combinator::value;
    use nom::error::VerboseErrorKind;
    use nom::Err;

    fn names(input: &str) -> super::PResult<Vec<&str>> {
        comma_list(
            '[',
            identifier,
            ']',
            value((), multispace0),
            "expected ',' or ']' in name list",
        )(input)
    }

    #[test]
    fn plain_list() {
        assert_eq!(names("[x, y, z]"), Ok(("", vec!["x", "y", "z"])));
    }

    #[test]
    fn trailing_comma() {
        assert_eq!(names("[x, y,]"), Ok(("", vec!["x", "y"])));
    }

    #[test]
    fn empty_even_with_padding() {
        assert_eq!(names("[]rest"), Ok(("rest", vec![])));
        assert_eq!(names("[  ]"), Ok(("", vec![])));
    }

    #[test]
    fn newlines_are_padding() {
        assert_eq!(names("[\n  x,\n  y,\n]"), Ok(("", vec!["x", "y"])));
    }

    #[test]
    fn missing_separator_names_the_construct() {
        match names("[x y]") {
            Err(Err::Error(e)) => {
                assert_eq!(
                    e.errors[0],
                    ("y]", VerboseErrorKind::Context("expected ',' or ']' in name list")),
                );
            }
            other => panic!("expected a separator error, got {:?}", other),
        }
    }

    #[test]
    fn item_errors_win_over_separator_errors() {
        // After a comma an item is required; its own error surfaces.
        assert!(matches!(names("[x,,]"), Err(Err::Error(_))));
    }

    #[test]
    fn unclosed_at_eof() {
        assert!(names("[x, y").is_err());
    }
}
