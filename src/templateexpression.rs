//! Statement-level ASTs and parsers for template bodies.
//!
//! Text templates and messages templates have parallel statement
//! families: [`TemplateExpression`] nodes render to a string,
//! [`MessageExpression`] nodes render to a sequence of role-tagged
//! messages.  The parsers here produce raw trees; the [`crate::refine`]
//! pass normalizes whitespace before a template is compiled.

use crate::expression::{expression, identifier, string_literal, word, Const, Expr};
use crate::parseresult::PResult;
use crate::spacelike::{comment, spacelike};
use nom::branch::alt;
use nom::bytes::complete::{is_a, is_not, tag};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{cut, fail, map, not, opt, value};
use nom::error::context;
use nom::multi::many_till;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};

/// One statement of a text-template body.
///
/// `Let` and `Assign` are non-renderable: they produce no output, and
/// the sequential renderer swallows the line break they occupied.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateExpression {
    Comment,
    Text {
        text: String,
    },
    Expression {
        expr: Expr,
        format: Option<String>,
    },
    IfBlock {
        expr: Expr,
        body: Vec<TemplateExpression>,
        else_body: Option<Vec<TemplateExpression>>,
    },
    ForLoop {
        name: String,
        expr: Expr,
        body: Vec<TemplateExpression>,
    },
    CallTemplate {
        name: Expr,
        with: Option<Expr>,
    },
    Let {
        name: String,
        expr: Expr,
    },
    Assign {
        name: String,
        expr: Expr,
    },
}

impl TemplateExpression {
    pub fn text(text: impl Into<String>) -> Self {
        TemplateExpression::Text { text: text.into() }
    }
}

/// One statement of a messages-template body.
///
/// An `Entry` wraps a text-template sub-tree in a role expression;
/// control statements carry message bodies of their own.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageExpression {
    Entry {
        role: Expr,
        body: Vec<TemplateExpression>,
    },
    IfBlock {
        expr: Expr,
        body: Vec<MessageExpression>,
        else_body: Option<Vec<MessageExpression>>,
    },
    ForLoop {
        name: String,
        expr: Expr,
        body: Vec<MessageExpression>,
    },
    CallTemplate {
        name: Expr,
        with: Option<Expr>,
    },
    Let {
        name: String,
        expr: Expr,
    },
    Assign {
        name: String,
        expr: Expr,
    },
}

/// One text statement: escapes, comments, control statements,
/// expression output, or a run of plain text.
pub fn template_expression(input: &str) -> PResult<TemplateExpression> {
    alt((
        value(TemplateExpression::text("@"), tag("@@")),
        value(TemplateExpression::text("{"), tag("@{")),
        value(TemplateExpression::text("}"), tag("@}")),
        value(TemplateExpression::Comment, comment),
        if_statement,
        foreach_statement,
        while_reserved,
        let_statement,
        render_statement,
        assign_statement,
        output_statement,
        map(is_not("@{}"), TemplateExpression::text),
    ))(input)
}

/// `while` is a reserved keyword; there is no loop form behind it yet.
fn while_reserved<T>(input: &str) -> PResult<T> {
    preceded(
        pair(char('@'), word("while")),
        cut(context("the `while` statement is reserved", fail)),
    )(input)
}

/// A `{ … }` block of text statements.
pub fn template_block(input: &str) -> PResult<Vec<TemplateExpression>> {
    preceded(
        context("expected \"{\"", char('{')),
        map(
            many_till(
                context("error in template statement starting here", template_expression),
                char('}'),
            ),
            |(body, _)| body,
        ),
    )(input)
}

fn if_statement(input: &str) -> PResult<TemplateExpression> {
    preceded(pair(tag("@if"), multispace1), if_tail)(input)
}

fn if_tail(input: &str) -> PResult<TemplateExpression> {
    map(
        tuple((
            context("expected conditional expression", expression),
            preceded(multispace0, template_block),
            opt(else_tail),
        )),
        |(expr, body, else_body)| TemplateExpression::IfBlock {
            expr,
            body,
            else_body,
        },
    )(input)
}

fn else_tail(input: &str) -> PResult<Vec<TemplateExpression>> {
    preceded(
        delimited(multispace0, word("else"), multispace0),
        alt((
            // An `else if` chain nests as a single-statement else body.
            map(preceded(pair(word("if"), multispace1), if_tail), |chain| {
                vec![chain]
            }),
            template_block,
        )),
    )(input)
}

fn foreach_statement(input: &str) -> PResult<TemplateExpression> {
    preceded(
        pair(tag("@foreach"), multispace1),
        map(
            tuple((
                context("expected loop variable name", map(identifier, String::from)),
                delimited(multispace1, context("expected \"in\"", word("in")), multispace1),
                context("expected iterable expression", expression),
                preceded(multispace0, template_block),
            )),
            |(name, _, expr, body)| TemplateExpression::ForLoop { name, expr, body },
        ),
    )(input)
}

fn let_statement(input: &str) -> PResult<TemplateExpression> {
    map(let_binding, |(name, expr)| TemplateExpression::Let {
        name,
        expr,
    })(input)
}

/// `@let name = expr`, shared by both statement families.
fn let_binding(input: &str) -> PResult<(String, Expr)> {
    preceded(
        pair(tag("@let"), multispace1),
        separated_pair(
            context("expected variable name", map(identifier, String::from)),
            delimited(multispace0, context("expected \"=\"", char('=')), multispace0),
            context("expected expression", expression),
        ),
    )(input)
}

fn render_statement(input: &str) -> PResult<TemplateExpression> {
    map(render_call, |(name, with)| TemplateExpression::CallTemplate {
        name,
        with,
    })(input)
}

/// `@render name-expr [with ctx-expr]`, shared by both families.
fn render_call(input: &str) -> PResult<(Expr, Option<Expr>)> {
    preceded(
        pair(tag("@render"), multispace1),
        pair(
            context("expected template name expression", expression),
            opt(preceded(
                tuple((multispace1, word("with"), multispace1)),
                context("expected context expression", expression),
            )),
        ),
    )(input)
}

fn assign_statement(input: &str) -> PResult<TemplateExpression> {
    map(assignment, |(name, expr)| TemplateExpression::Assign {
        name,
        expr,
    })(input)
}

/// `@name = expr` (but not `@name == expr`, which is output).
fn assignment(input: &str) -> PResult<(String, Expr)> {
    map(
        tuple((
            preceded(char('@'), map(identifier, String::from)),
            delimited(
                multispace0,
                terminated(char('='), not(char('='))),
                multispace0,
            ),
            context("expected expression", expression),
        )),
        |(name, _, expr)| (name, expr),
    )(input)
}

fn output_statement(input: &str) -> PResult<TemplateExpression> {
    map(
        preceded(char('@'), pair(expression, opt(format_spec))),
        |(expr, format)| TemplateExpression::Expression { expr, format },
    )(input)
}

/// `:format` after an output expression: a quoted string or a short
/// unquoted token.
fn format_spec(input: &str) -> PResult<String> {
    preceded(
        char(':'),
        alt((
            string_literal,
            map(
                is_a("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.#,+-/%_"),
                String::from,
            ),
        )),
    )(input)
}

/// One message statement.  Messages bodies carry no plain text, so
/// whitespace and comments between statements are skippable.
pub(crate) fn message_statement(input: &str) -> PResult<MessageExpression> {
    alt((
        entry_statement,
        computed_entry,
        msg_if_statement,
        msg_foreach_statement,
        while_reserved,
        map(let_binding, |(name, expr)| MessageExpression::Let { name, expr }),
        map(render_call, |(name, with)| MessageExpression::CallTemplate {
            name,
            with,
        }),
        map(assignment, |(name, expr)| MessageExpression::Assign {
            name,
            expr,
        }),
    ))(input)
}

/// A `{ … }` block of message statements.
pub fn message_block(input: &str) -> PResult<Vec<MessageExpression>> {
    preceded(
        context("expected \"{\"", char('{')),
        map(
            many_till(
                preceded(
                    spacelike,
                    context("error in message statement starting here", message_statement),
                ),
                preceded(spacelike, char('}')),
            ),
            |(body, _)| body,
        ),
    )(input)
}

/// `@system message { … }` and the other fixed-role entries.  `tool`
/// parses but is rejected when rendered.
fn entry_statement(input: &str) -> PResult<MessageExpression> {
    map(
        tuple((
            preceded(
                char('@'),
                alt((word("system"), word("user"), word("assistant"), word("tool"))),
            ),
            delimited(multispace1, word("message"), multispace0),
            context("expected message body", template_block),
        )),
        |(role, _, body)| MessageExpression::Entry {
            role: Expr::Const(Const::Str(role.to_string())),
            body,
        },
    )(input)
}

/// `@message { @role expr … }` with a computed role.
fn computed_entry(input: &str) -> PResult<MessageExpression> {
    preceded(
        pair(tag("@message"), multispace0),
        preceded(
            context("expected \"{\"", char('{')),
            map(
                pair(
                    preceded(
                        spacelike,
                        preceded(
                            pair(tag("@role"), multispace1),
                            context("expected role expression", expression),
                        ),
                    ),
                    map(
                        many_till(
                            context(
                                "error in template statement starting here",
                                template_expression,
                            ),
                            char('}'),
                        ),
                        |(body, _)| body,
                    ),
                ),
                |(role, body)| MessageExpression::Entry { role, body },
            ),
        ),
    )(input)
}

fn msg_if_statement(input: &str) -> PResult<MessageExpression> {
    preceded(pair(tag("@if"), multispace1), msg_if_tail)(input)
}

fn msg_if_tail(input: &str) -> PResult<MessageExpression> {
    map(
        tuple((
            context("expected conditional expression", expression),
            preceded(multispace0, message_block),
            opt(msg_else_tail),
        )),
        |(expr, body, else_body)| MessageExpression::IfBlock {
            expr,
            body,
            else_body,
        },
    )(input)
}

fn msg_else_tail(input: &str) -> PResult<Vec<MessageExpression>> {
    preceded(
        delimited(multispace0, word("else"), multispace0),
        alt((
            map(preceded(pair(word("if"), multispace1), msg_if_tail), |chain| {
                vec![chain]
            }),
            message_block,
        )),
    )(input)
}

fn msg_foreach_statement(input: &str) -> PResult<MessageExpression> {
    preceded(
        pair(tag("@foreach"), multispace1),
        map(
            tuple((
                context("expected loop variable name", map(identifier, String::from)),
                delimited(multispace1, context("expected \"in\"", word("in")), multispace1),
                context("expected iterable expression", expression),
                preceded(multispace0, message_block),
            )),
            |(name, _, expr, body)| MessageExpression::ForLoop { name, expr, body },
        ),
    )(input)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::BinaryOp;

    #[test]
    fn if_boolean_var() {
        assert_eq!(
            template_expression("@if cond { something }"),
            Ok((
                "",
                TemplateExpression::IfBlock {
                    expr: Expr::var("cond"),
                    body: vec![TemplateExpression::text(" something ")],
                    else_body: None,
                },
            )),
        )
    }

    #[test]
    fn if_compare() {
        assert_eq!(
            template_expression("@if x == 17 { something }"),
            Ok((
                "",
                TemplateExpression::IfBlock {
                    expr: Expr::Binary {
                        op: BinaryOp::Eq,
                        left: Box::new(Expr::var("x")),
                        right: Box::new(Expr::Const(Const::Number(17.0))),
                    },
                    body: vec![TemplateExpression::text(" something ")],
                    else_body: None,
                },
            )),
        )
    }

    #[test]
    fn if_else() {
        assert_eq!(
            template_expression("@if ok { a } else { b }"),
            Ok((
                "",
                TemplateExpression::IfBlock {
                    expr: Expr::var("ok"),
                    body: vec![TemplateExpression::text(" a ")],
                    else_body: Some(vec![TemplateExpression::text(" b ")]),
                },
            )),
        )
    }

    #[test]
    fn else_if_chains_into_else_body() {
        let parsed = template_expression("@if a { x } else if b { y } else { z }")
            .unwrap()
            .1;
        match parsed {
            TemplateExpression::IfBlock { else_body, .. } => {
                let chain = else_body.unwrap();
                assert_eq!(chain.len(), 1);
                assert!(matches!(chain[0], TemplateExpression::IfBlock { .. }));
            }
            other => panic!("not an if: {:?}", other),
        }
    }

    #[test]
    fn stray_else_is_text() {
        assert_eq!(
            template_expression("@if a { x } else nothing"),
            Ok((
                " else nothing",
                TemplateExpression::IfBlock {
                    expr: Expr::var("a"),
                    body: vec![TemplateExpression::text(" x ")],
                    else_body: None,
                },
            )),
        )
    }

    #[test]
    fn foreach_loop() {
        assert_eq!(
            template_expression("@foreach item in items { x }"),
            Ok((
                "",
                TemplateExpression::ForLoop {
                    name: "item".into(),
                    expr: Expr::var("items"),
                    body: vec![TemplateExpression::text(" x ")],
                },
            )),
        )
    }

    #[test]
    fn let_statement_parses() {
        assert_eq!(
            template_expression("@let x = 'shadowed'"),
            Ok((
                "",
                TemplateExpression::Let {
                    name: "x".into(),
                    expr: Expr::Const(Const::Str("shadowed".into())),
                },
            )),
        )
    }

    #[test]
    fn assignment_parses() {
        assert_eq!(
            template_expression("@x = 2"),
            Ok((
                "",
                TemplateExpression::Assign {
                    name: "x".into(),
                    expr: Expr::Const(Const::Number(2.0)),
                },
            )),
        )
    }

    #[test]
    fn equality_output_is_not_assignment() {
        assert_eq!(
            template_expression("@x == 2"),
            Ok((
                "",
                TemplateExpression::Expression {
                    expr: Expr::Binary {
                        op: BinaryOp::Eq,
                        left: Box::new(Expr::var("x")),
                        right: Box::new(Expr::Const(Const::Number(2.0))),
                    },
                    format: None,
                },
            )),
        )
    }

    #[test]
    fn render_with_context() {
        assert_eq!(
            template_expression("@render 'inner' with items"),
            Ok((
                "",
                TemplateExpression::CallTemplate {
                    name: Expr::Const(Const::Str("inner".into())),
                    with: Some(Expr::var("items")),
                },
            )),
        )
    }

    #[test]
    fn output_with_format() {
        assert_eq!(
            template_expression("@price:0.00!"),
            Ok((
                "!",
                TemplateExpression::Expression {
                    expr: Expr::var("price"),
                    format: Some("0.00".into()),
                },
            )),
        )
    }

    #[test]
    fn colon_before_space_stays_text() {
        // `: ` after an expression is prose, not a format.
        assert_eq!(
            template_expression("@name: hello"),
            Ok((
                ": hello",
                TemplateExpression::Expression {
                    expr: Expr::var("name"),
                    format: None,
                },
            )),
        )
    }

    #[test]
    fn escapes() {
        assert_eq!(
            template_expression("@@"),
            Ok(("", TemplateExpression::text("@"))),
        );
        assert_eq!(
            template_expression("@{"),
            Ok(("", TemplateExpression::text("{"))),
        );
    }

    #[test]
    fn plain_text_stops_at_markers() {
        assert_eq!(
            template_expression("hello @name"),
            Ok(("@name", TemplateExpression::text("hello "))),
        );
    }

    #[test]
    fn while_is_reserved() {
        assert!(matches!(
            template_expression("@while x { }"),
            Err(nom::Err::Failure(_)),
        ));
        // Words that merely start with it are ordinary expressions.
        assert!(matches!(
            template_expression("@whiletta"),
            Ok(("", TemplateExpression::Expression { .. })),
        ));
    }

    #[test]
    fn comment_becomes_node() {
        assert_eq!(
            template_expression("@* note *@rest"),
            Ok(("rest", TemplateExpression::Comment)),
        );
        assert_eq!(
            template_expression("@// note\nrest"),
            Ok(("\nrest", TemplateExpression::Comment)),
        );
    }

    #[test]
    fn fixed_role_entry() {
        let (rest, entry) = message_statement("@system message { Be helpful. }").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            entry,
            MessageExpression::Entry {
                role: Expr::Const(Const::Str("system".into())),
                body: vec![TemplateExpression::text(" Be helpful. ")],
            },
        );
    }

    #[test]
    fn computed_role_entry() {
        let (rest, entry) =
            message_statement("@message { @role 'user' Hello, i am @name! }").unwrap();
        assert_eq!(rest, "");
        match entry {
            MessageExpression::Entry { role, body } => {
                assert_eq!(role, Expr::Const(Const::Str("user".into())));
                assert_eq!(body[0], TemplateExpression::text(" Hello, i am "));
            }
            other => panic!("not an entry: {:?}", other),
        }
    }

    #[test]
    fn message_foreach() {
        let source = "@foreach name in names { @message { @role 'user' Hi @name } }";
        let (rest, parsed) = message_statement(source).unwrap();
        assert_eq!(rest, "");
        assert!(matches!(parsed, MessageExpression::ForLoop { .. }));
    }
}
