//! Skippable tokens: whitespace and the two comment forms.
//!
//! Between grammar productions the parser elides ASCII whitespace,
//! `@// …` line comments, and `@* … *@` block comments.  Inside plain
//! template text, comments are parsed as statements instead, so the
//! refinement pass can collapse the line they occupied.

use crate::parseresult::PResult;
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag};
use nom::character::complete::multispace1;
use nom::combinator::{map, opt, value};
use nom::error::{VerboseError, VerboseErrorKind};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::Err;

pub fn spacelike(input: &str) -> PResult<()> {
    map(many0(alt((comment, map(multispace1, |_| ())))), |_| ())(input)
}

pub fn comment(input: &str) -> PResult<()> {
    alt((block_comment, line_comment))(input)
}

/// `@// …` to end of line; the newline itself is not consumed.
pub fn line_comment(input: &str) -> PResult<()> {
    value((), preceded(tag("@//"), opt(is_not("\n\r"))))(input)
}

pub fn block_comment(input: &str) -> PResult<()> {
    preceded(tag("@*"), comment_tail)(input)
}

/// The rest of a block comment, after the opening `@*`: everything up
/// to and including the first `*@`.  Block comments do not nest — any
/// `*@` closes — and a comment that never closes is a hard failure.
pub fn comment_tail(input: &str) -> PResult<()> {
    let mut rest = input;
    while let Some(star) = rest.find('*') {
        if rest[star + 1..].starts_with('@') {
            return Ok((&rest[star + 2..], ()));
        }
        rest = &rest[star + 1..];
    }
    Err(Err::Failure(VerboseError {
        errors: vec![(
            input,
            VerboseErrorKind::Context("unterminated block comment"),
        )],
    }))
}

#[cfg(test)]
mod test {
    use super::{comment, spacelike};
    use nom::error::{ErrorKind, VerboseError, VerboseErrorKind};
    use nom::Err;

    #[test]
    fn comment1() {
        assert_eq!(comment("@* a simple comment *@"), Ok(("", ())));
    }
    #[test]
    fn comment2() {
        let space_before = " @* comment *@";
        assert_eq!(
            comment(space_before),
            Err(Err::Error(VerboseError {
                errors: vec![(space_before, VerboseErrorKind::Nom(ErrorKind::Tag))],
            })),
        )
    }
    #[test]
    fn comment3() {
        assert_eq!(comment("@* comment *@ & stuff"), Ok((" & stuff", ())));
    }
    #[test]
    fn comment4() {
        assert_eq!(
            comment("@* comment *@ and @* another *@"),
            Ok((" and @* another *@", ())),
        );
    }
    #[test]
    fn comment5() {
        assert_eq!(comment("@* comment containing * and @ *@"), Ok(("", ())));
    }
    #[test]
    fn comment6() {
        assert_eq!(comment("@*** peculiar comment ***@***"), Ok(("***", ())));
    }

    #[test]
    fn line_comment_stops_before_newline() {
        assert_eq!(comment("@// note\nrest"), Ok(("\nrest", ())));
    }
    #[test]
    fn line_comment_at_eof() {
        assert_eq!(comment("@// note"), Ok(("", ())));
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        assert!(matches!(comment("@* runs off"), Err(Err::Failure(_))));
    }

    #[test]
    fn spacelike_empty() {
        assert_eq!(spacelike(""), Ok(("", ())));
    }
    #[test]
    fn spacelike_simple() {
        assert_eq!(spacelike(" "), Ok(("", ())));
    }
    #[test]
    fn spacelike_long() {
        assert_eq!(
            spacelike(
                "\n\
                 @* a comment on a line by itself *@\n\
                 @// and a line comment\n\
                 \t\t   \n\n\r\n\
                 @*another comment*@    something else"
            ),
            Ok(("something else", ())),
        );
    }
}
