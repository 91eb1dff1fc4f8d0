//! The expression sub-language: AST, parser and evaluation.
//!
//! Expressions appear after `@` in template bodies, in `@if`
//! conditions, `@foreach` sources, `@let` bindings and `@render`
//! arguments.  Parse-time constants are kept as [`Const`] (plain data,
//! shareable between threads along with the compiled template) and only
//! lifted into runtime [`Value`]s during evaluation.

use crate::comma_list::comma_list;
use crate::error::{RenderResult, RuntimeError};
use crate::parseresult::PResult;
use crate::scope::ContextAccessor;
use crate::value::{format_number, BinaryOp, Dict, UnaryOp, Value};
use itertools::Itertools;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while_m_n};
use nom::character::complete::{char, digit1, multispace0, space0};
use nom::combinator::{cut, map, map_res, not, opt, recognize, value};
use nom::error::context;
use nom::multi::fold_many0;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::Err;
use std::fmt;
use std::rc::Rc;

/// A constant recognised by the parser: literals, constant arrays and
/// constant objects with bare-identifier keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Const>),
    Object(Vec<(String, Const)>),
}

impl Const {
    /// Lift the constant into a runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            Const::Null => Value::Null,
            Const::Bool(b) => Value::Bool(*b),
            Const::Number(n) => Value::Number(*n),
            Const::Str(s) => Value::Str(s.clone()),
            Const::Array(items) => {
                Value::Array(Rc::new(items.iter().map(Const::to_value).collect()))
            }
            Const::Object(entries) => Value::Object(Rc::new(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Dict>(),
            )),
        }
    }

    /// The string payload, for metadata values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Const::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Const::Null => out.write_str("null"),
            Const::Bool(b) => write!(out, "{}", b),
            Const::Number(n) => out.write_str(&format_number(*n)),
            Const::Str(s) => write!(out, "'{}'", s.replace('\'', "''")),
            Const::Array(items) => write!(out, "[{}]", items.iter().format(", ")),
            Const::Object(entries) => write!(
                out,
                "{{{}}}",
                entries
                    .iter()
                    .format_with(", ", |(k, v), f| f(&format_args!("{}: {}", k, v))),
            ),
        }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Const),
    /// The `ctx` keyword: the context accessor itself.
    ContextRef,
    Property {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    MethodCall {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// Sugar for `ctx.name`.
    pub fn var(name: &str) -> Expr {
        Expr::Property {
            target: Box::new(Expr::ContextRef),
            name: name.to_string(),
        }
    }

    /// Evaluate against a scope, producing a value or a runtime error.
    ///
    /// `&&` and `||` evaluate both operands (no short-circuit); the
    /// ternary evaluates only the chosen branch.
    pub fn eval(&self, scope: &ContextAccessor) -> RenderResult<Value> {
        match self {
            Expr::Const(c) => Ok(c.to_value()),
            Expr::ContextRef => Ok(Value::Scope(scope.clone())),
            Expr::Property { target, name } => target.eval(scope)?.property(name),
            Expr::Index { target, index } => {
                let target = target.eval(scope)?;
                let index = index.eval(scope)?;
                target.index(&index)
            }
            Expr::MethodCall { target, name, args } => {
                let receiver = target.eval(scope)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(scope)?);
                }
                match receiver {
                    Value::Scope(scope) => scope.call(name, &values),
                    other => Err(RuntimeError::MethodNotSupported {
                        name: name.clone(),
                        kind: other.kind(),
                    }),
                }
            }
            Expr::Unary { op, operand } => operand.eval(scope)?.unary(*op),
            Expr::Binary { op, left, right } => {
                let left = left.eval(scope)?;
                let right = right.eval(scope)?;
                left.binary(*op, &right)
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if cond.eval(scope)?.truthy() {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Ternary { .. } => 1,
            Expr::Binary { op, .. } => match op {
                BinaryOp::Or => 2,
                BinaryOp::And => 3,
                BinaryOp::Eq | BinaryOp::Ne => 4,
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
                BinaryOp::Add | BinaryOp::Sub => 6,
                BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 7,
            },
            Expr::Unary { .. } => 8,
            _ => 9,
        }
    }

    fn fmt_prec(&self, out: &mut fmt::Formatter, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(out, "({})", self)
        } else {
            match self {
                Expr::Const(c) => write!(out, "{}", c),
                Expr::ContextRef => out.write_str("ctx"),
                Expr::Property { target, name } => {
                    target.fmt_prec(out, 9)?;
                    write!(out, ".{}", name)
                }
                Expr::Index { target, index } => {
                    target.fmt_prec(out, 9)?;
                    write!(out, "[{}]", index)
                }
                Expr::MethodCall { target, name, args } => {
                    target.fmt_prec(out, 9)?;
                    write!(out, ".{}({})", name, args.iter().format(", "))
                }
                Expr::Unary { op, operand } => {
                    out.write_str(op.symbol())?;
                    operand.fmt_prec(out, 8)
                }
                Expr::Binary { op, left, right } => {
                    let prec = self.precedence();
                    left.fmt_prec(out, prec)?;
                    write!(out, " {} ", op.symbol())?;
                    right.fmt_prec(out, prec + 1)
                }
                Expr::Ternary {
                    cond,
                    then,
                    otherwise,
                } => {
                    cond.fmt_prec(out, 2)?;
                    write!(out, " ? {} : {}", then, otherwise)
                }
            }
        }
    }
}

/// The canonical text form; reparsing it yields an equivalent tree.
impl fmt::Display for Expr {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_prec(out, 0)
    }
}

/// A name: ascii letter or underscore, then letters, digits and
/// underscores.
pub fn identifier(input: &str) -> PResult<&str> {
    recognize(pair(
        take_while_m_n(1, 1, |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn ident_char(input: &str) -> PResult<&str> {
    take_while_m_n(1, 1, |c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// A reserved word, not immediately followed by more identifier
/// characters.
pub fn word<'a>(w: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag(w), not(ident_char))
}

fn number(input: &str) -> PResult<f64> {
    map_res(
        recognize(pair(digit1, opt(preceded(char('.'), digit1)))),
        str::parse::<f64>,
    )(input)
}

/// A single-quoted string literal; `''` is an escaped quote.  A started
/// literal that never closes is a hard failure.
pub fn string_literal(input: &str) -> PResult<String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut text = String::new();
    loop {
        if let Some(after) = rest.strip_prefix("''") {
            text.push('\'');
            rest = after;
        } else if let Some(after) = rest.strip_prefix('\'') {
            return Ok((after, text));
        } else {
            match rest.chars().next() {
                Some(c) => {
                    text.push(c);
                    rest = &rest[c.len_utf8()..];
                }
                None => {
                    return Err(Err::Failure(nom::error::VerboseError {
                        errors: vec![(
                            input,
                            nom::error::VerboseErrorKind::Context("unterminated string literal"),
                        )],
                    }))
                }
            }
        }
    }
}

/// A constant: literal, constant array, or constant object.
pub fn constant(input: &str) -> PResult<Const> {
    alt((
        value(Const::Bool(true), word("true")),
        value(Const::Bool(false), word("false")),
        value(Const::Null, word("null")),
        map(number, Const::Number),
        map(string_literal, Const::Str),
        map(
            comma_list('[', constant, ']', pad, "expected ',' or ']' in array literal"),
            Const::Array,
        ),
        map(
            comma_list(
                '{',
                object_entry,
                '}',
                pad,
                "expected ',' or '}' in object literal",
            ),
            Const::Object,
        ),
    ))(input)
}

fn object_entry(input: &str) -> PResult<(String, Const)> {
    separated_pair(
        map(identifier, String::from),
        delimited(multispace0, char(':'), multispace0),
        constant,
    )(input)
}

/// The padding allowed inside expression-level lists.
fn pad(input: &str) -> PResult<()> {
    value((), multispace0)(input)
}

fn call_args(input: &str) -> PResult<Vec<Expr>> {
    comma_list('(', expression, ')', pad, "expected ',' or ')' in argument list")(input)
}

fn primary(input: &str) -> PResult<Expr> {
    alt((
        map(constant, Expr::Const),
        value(Expr::ContextRef, word("ctx")),
        // A bare call is sugar for a call on the context.
        map(pair(identifier, call_args), |(name, args)| {
            Expr::MethodCall {
                target: Box::new(Expr::ContextRef),
                name: name.to_string(),
                args,
            }
        }),
        // A bare name is sugar for a context property.
        map(identifier, Expr::var),
        delimited(
            terminated(char('('), multispace0),
            expression,
            preceded(multispace0, context("expected ')'", cut(char(')')))),
        ),
    ))(input)
}

enum Postfix {
    Member(String, Option<Vec<Expr>>),
    Index(Expr),
}

fn postfix(input: &str) -> PResult<Expr> {
    let (input, first) = primary(input)?;
    fold_many0(
        alt((
            map(
                pair(
                    preceded(char('.'), map(identifier, String::from)),
                    opt(call_args),
                ),
                |(name, args)| Postfix::Member(name, args),
            ),
            map(
                delimited(
                    terminated(char('['), multispace0),
                    expression,
                    preceded(multispace0, char(']')),
                ),
                Postfix::Index,
            ),
        )),
        move || first.clone(),
        |target, post| match post {
            Postfix::Member(name, None) => Expr::Property {
                target: Box::new(target),
                name,
            },
            Postfix::Member(name, Some(args)) => Expr::MethodCall {
                target: Box::new(target),
                name,
                args,
            },
            Postfix::Index(index) => Expr::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
        },
    )(input)
}

fn unary(input: &str) -> PResult<Expr> {
    alt((
        map(
            pair(
                alt((
                    value(UnaryOp::Not, char('!')),
                    value(UnaryOp::Negate, char('-')),
                    value(UnaryOp::Plus, char('+')),
                )),
                preceded(space0, unary),
            ),
            |(op, operand)| Expr::Unary {
                op,
                operand: Box::new(operand),
            },
        ),
        postfix,
    ))(input)
}

fn binary(expr: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(expr),
        right: Box::new(right),
    }
}

fn multiplicative(input: &str) -> PResult<Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(
            delimited(
                space0,
                alt((
                    value(BinaryOp::Mul, char('*')),
                    value(BinaryOp::Div, char('/')),
                    value(BinaryOp::Rem, char('%')),
                )),
                space0,
            ),
            unary,
        ),
        move || first.clone(),
        |left, (op, right)| binary(left, op, right),
    )(input)
}

fn additive(input: &str) -> PResult<Expr> {
    let (input, first) = multiplicative(input)?;
    fold_many0(
        pair(
            delimited(
                space0,
                alt((
                    value(BinaryOp::Add, char('+')),
                    value(BinaryOp::Sub, char('-')),
                )),
                space0,
            ),
            multiplicative,
        ),
        move || first.clone(),
        |left, (op, right)| binary(left, op, right),
    )(input)
}

fn relational(input: &str) -> PResult<Expr> {
    let (input, first) = additive(input)?;
    fold_many0(
        pair(
            delimited(
                space0,
                alt((
                    value(BinaryOp::Le, tag("<=")),
                    value(BinaryOp::Lt, tag("<")),
                    value(BinaryOp::Ge, tag(">=")),
                    value(BinaryOp::Gt, tag(">")),
                )),
                space0,
            ),
            additive,
        ),
        move || first.clone(),
        |left, (op, right)| binary(left, op, right),
    )(input)
}

fn equality(input: &str) -> PResult<Expr> {
    let (input, first) = relational(input)?;
    fold_many0(
        pair(
            delimited(
                space0,
                alt((
                    value(BinaryOp::Eq, tag("==")),
                    value(BinaryOp::Ne, tag("!=")),
                )),
                space0,
            ),
            relational,
        ),
        move || first.clone(),
        |left, (op, right)| binary(left, op, right),
    )(input)
}

fn logical_and(input: &str) -> PResult<Expr> {
    let (input, first) = equality(input)?;
    fold_many0(
        pair(delimited(space0, tag("&&"), space0), equality),
        move || first.clone(),
        |left, (_, right)| binary(left, BinaryOp::And, right),
    )(input)
}

fn logical_or(input: &str) -> PResult<Expr> {
    let (input, first) = logical_and(input)?;
    fold_many0(
        pair(delimited(space0, tag("||"), space0), logical_and),
        move || first.clone(),
        |left, (_, right)| binary(left, BinaryOp::Or, right),
    )(input)
}

/// A full expression: the conditional operator over the binary tower.
///
/// An isolated `?` that never finds a matching `:` is treated as plain
/// text after the expression, so prose like `Ready, @name?` keeps
/// working.
pub fn expression(input: &str) -> PResult<Expr> {
    let (after_cond, cond) = logical_or(input)?;
    let probe: PResult<char> = delimited(space0, char('?'), space0)(after_cond);
    let tail = match probe {
        Ok((rest, _)) => expression(rest).and_then(|(rest, then)| {
            let (rest, _) = delimited(space0, char(':'), space0)(rest)?;
            let (rest, otherwise) = expression(rest)?;
            Ok((rest, (then, otherwise)))
        }),
        Err(e) => Err(e),
    };
    match tail {
        Ok((rest, (then, otherwise))) => Ok((
            rest,
            Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        )),
        Err(Err::Failure(e)) => Err(Err::Failure(e)),
        Err(_) => Ok((after_cond, cond)),
    }
}
