//! The tree-walking renderer.
//!
//! Text statements render to a `String`, message statements to a
//! sequence of [`Message`]s.  Two pieces of line discipline keep the
//! output stable however statements are laid out in the source:
//!
//! * sequential stitching — a statement that renders nothing (a
//!   `@let`, a false `@if`) swallows the line break it occupied;
//! * block normalization — a non-empty `@if` or `@foreach` body ends
//!   with a newline, so block statements compose by line.

use crate::error::{RenderResult, RuntimeError};
use crate::message::{Message, Role};
use crate::scope::ContextAccessor;
use crate::template::Template;
use crate::templateexpression::{MessageExpression, TemplateExpression};
use crate::library::TemplateLibrary;
use std::sync::Arc;
use tracing::trace;

impl TemplateExpression {
    pub(crate) fn render(&self, scope: &ContextAccessor) -> RenderResult<String> {
        match self {
            TemplateExpression::Comment => Ok(String::new()),
            TemplateExpression::Text { text } => Ok(text.clone()),
            TemplateExpression::Expression { expr, format } => {
                expr.eval(scope)?.to_text(format.as_deref())
            }
            TemplateExpression::IfBlock {
                expr,
                body,
                else_body,
            } => {
                let chosen = if expr.eval(scope)?.truthy() {
                    Some(body)
                } else {
                    else_body.as_ref()
                };
                let mut out = match chosen {
                    Some(branch) => {
                        scope.push_frame()?;
                        let result = render_sequence(branch, scope);
                        scope.pop_frame()?;
                        result?
                    }
                    None => String::new(),
                };
                ensure_trailing_newline(&mut out);
                Ok(out)
            }
            TemplateExpression::ForLoop { name, expr, body } => {
                let items = expr.eval(scope)?.iterate()?;
                scope.push_frame()?;
                let mut out = String::new();
                let mut failure = None;
                for item in items {
                    // The loop variable lives in the loop frame, so it
                    // does not leak past the loop.
                    scope.declare(name.clone(), item);
                    match render_sequence(body, scope) {
                        Ok(piece) => {
                            if !piece.is_empty() {
                                out.push_str(&piece);
                                ensure_trailing_newline(&mut out);
                            }
                        }
                        Err(error) => {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                scope.pop_frame()?;
                match failure {
                    Some(error) => Err(error),
                    None => Ok(out),
                }
            }
            TemplateExpression::CallTemplate { name, with } => {
                let name = name.eval(scope)?.to_text(None)?;
                let template = resolve_template(scope, &name)?;
                match &*template {
                    Template::Prompt(prompt) => match with {
                        Some(expr) => prompt.render(expr.eval(scope)?),
                        None => {
                            // No context expression: the current
                            // accessor is reused, frames and all.  The
                            // frame consumed here bounds recursive
                            // template chains.
                            scope.push_frame()?;
                            let result = render_sequence(prompt.body(), scope);
                            scope.pop_frame()?;
                            Ok(result?.trim_end().to_string())
                        }
                    },
                    Template::Plaintext(plain) => Ok(plain.content().to_string()),
                    Template::Messages(_) => Err(RuntimeError::TemplateKindMismatch {
                        expected: "text",
                        actual: "messages",
                    }),
                }
            }
            TemplateExpression::Let { name, expr } => {
                let value = expr.eval(scope)?;
                scope.declare(name.clone(), value);
                Ok(String::new())
            }
            TemplateExpression::Assign { name, expr } => {
                let value = expr.eval(scope)?;
                scope.rebind(name, value)?;
                Ok(String::new())
            }
        }
    }
}

/// Concatenate child outputs, letting statements that render nothing
/// swallow the line break they occupied: when the accumulator ends
/// with a newline it is stripped, otherwise the next child's leading
/// newline is dropped instead.
pub(crate) fn render_sequence(
    children: &[TemplateExpression],
    scope: &ContextAccessor,
) -> RenderResult<String> {
    let mut out = String::new();
    let mut swallow_newline = false;
    for child in children {
        let piece = child.render(scope)?;
        if piece.is_empty() {
            if !strip_trailing_newline(&mut out) {
                swallow_newline = true;
            }
            continue;
        }
        if swallow_newline {
            out.push_str(strip_leading_newline(&piece));
        } else {
            out.push_str(&piece);
        }
        swallow_newline = false;
    }
    Ok(out)
}

impl MessageExpression {
    pub(crate) fn render(&self, scope: &ContextAccessor) -> RenderResult<Vec<Message>> {
        match self {
            MessageExpression::Entry { role, body } => {
                let role = Role::from_name(&role.eval(scope)?.to_text(None)?)?;
                let content = render_sequence(body, scope)?.trim_end().to_string();
                trace!(role = role.as_str(), "rendered message entry");
                Ok(vec![Message::new(role, content)])
            }
            MessageExpression::IfBlock {
                expr,
                body,
                else_body,
            } => {
                let chosen = if expr.eval(scope)?.truthy() {
                    Some(body)
                } else {
                    else_body.as_ref()
                };
                match chosen {
                    Some(branch) => {
                        scope.push_frame()?;
                        let result = render_message_sequence(branch, scope);
                        scope.pop_frame()?;
                        result
                    }
                    None => Ok(Vec::new()),
                }
            }
            MessageExpression::ForLoop { name, expr, body } => {
                let items = expr.eval(scope)?.iterate()?;
                scope.push_frame()?;
                let mut out = Vec::new();
                let mut failure = None;
                for item in items {
                    scope.declare(name.clone(), item);
                    match render_message_sequence(body, scope) {
                        Ok(mut messages) => out.append(&mut messages),
                        Err(error) => {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                scope.pop_frame()?;
                match failure {
                    Some(error) => Err(error),
                    None => Ok(out),
                }
            }
            MessageExpression::CallTemplate { name, with } => {
                let name = name.eval(scope)?.to_text(None)?;
                let template = resolve_template(scope, &name)?;
                match &*template {
                    Template::Messages(messages) => match with {
                        Some(expr) => messages.render(expr.eval(scope)?),
                        None => {
                            scope.push_frame()?;
                            let result = render_message_sequence(messages.body(), scope);
                            scope.pop_frame()?;
                            result
                        }
                    },
                    other => Err(RuntimeError::TemplateKindMismatch {
                        expected: "messages",
                        actual: other.kind(),
                    }),
                }
            }
            MessageExpression::Let { name, expr } => {
                let value = expr.eval(scope)?;
                scope.declare(name.clone(), value);
                Ok(Vec::new())
            }
            MessageExpression::Assign { name, expr } => {
                let value = expr.eval(scope)?;
                scope.rebind(name, value)?;
                Ok(Vec::new())
            }
        }
    }
}

pub(crate) fn render_message_sequence(
    children: &[MessageExpression],
    scope: &ContextAccessor,
) -> RenderResult<Vec<Message>> {
    let mut out = Vec::new();
    for child in children {
        out.append(&mut child.render(scope)?);
    }
    Ok(out)
}

/// `@render` looks in the accessor's own library first, then in the
/// process-wide shared library.
fn resolve_template(scope: &ContextAccessor, name: &str) -> RenderResult<Arc<Template>> {
    if let Some(library) = scope.library() {
        if let Some(found) = library.try_retrieve_named(name, &[]) {
            return Ok(found);
        }
    }
    if let Some(found) = TemplateLibrary::shared().try_retrieve_named(name, &[]) {
        return Ok(found);
    }
    Err(RuntimeError::TemplateNotFound(format!("`{}`", name)))
}

fn ensure_trailing_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn strip_trailing_newline(out: &mut String) -> bool {
    if out.ends_with('\n') {
        out.pop();
        if out.ends_with('\r') {
            out.pop();
        }
        true
    } else {
        false
    }
}

fn strip_leading_newline(piece: &str) -> &str {
    piece
        .strip_prefix("\r\n")
        .or_else(|| piece.strip_prefix('\n'))
        .unwrap_or(piece)
}
