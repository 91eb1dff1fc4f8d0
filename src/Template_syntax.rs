// This module is only a chapter of the documentation.
//! This module describes the template syntax used by llt.
//!
//! A source file contains any number of top-level template
//! declarations, separated by whitespace and comments:
//!
//! ```text
//! @* Comments look like this (or @// run to end of line). *@
//!
//! @template greeting {
//!     @metadata { lang: 'en' }
//!     Greetings, @name!
//! }
//!
//! @messages template interview {
//!     @system message { You are a polite interviewer. }
//!     @message { @role 'user' Hello, i am @name! }
//! }
//! ```
//!
//! A `@template` body renders to a string; a `@messages template`
//! body renders to a sequence of role-tagged chat messages.  The name
//! after the keyword is optional and becomes the template's
//! `Identifier` metadata.  The `@metadata` block recognises the keys
//! `lang`, `model` and `model_family`; unknown keys are ignored.
//!
//! The curly brackets `{` and `}` delimit blocks.  To use them in
//! template text, escape them as `@{` and `@}`; a literal `@` is
//! written `@@`.
#![allow(non_snake_case)]

pub mod a_Value_expressions {
    //! A value expression can be as simple as `@name` to output a
    //! field of the context, but arbitrary expressions are allowed.
    //!
    //! # Value expressions
    //!
    //! A bare name is shorthand for a context lookup: `@name` means
    //! `@ctx.name`, where `ctx` is the rendering context — local
    //! variables first, then the caller's context value.  Properties,
    //! indexes and function calls chain freely:
    //!
    //! ```text
    //! <p>The user @user.name has @length(user.items) items;
    //! the first is @user.items[0].</p>
    //! ```
    //!
    //! Literals are numbers (`42`, `3.14`), single-quoted strings
    //! (`'it''s'` escapes a quote by doubling it), `true`, `false`,
    //! `null`, constant arrays `[1, 2, 3]` and constant objects
    //! `{retries: 3}`.
    //!
    //! Operators, loosest to tightest: the conditional
    //! `cond ? then : else`, `||`, `&&`, `==` and `!=`, the
    //! comparisons, `+` and `-`, `*`, `/` and `%`, and the prefix
    //! operators `!`, `-` and `+`.  Note that `&&` and `||` evaluate
    //! *both* operands; there is no short-circuiting.
    //!
    //! An output expression may carry a format after a colon:
    //! `@price:0.00`, `@enabled:yes/no`, `@name:upper`.
}

pub mod b_Conditionals_and_loops {
    //! Branch on any expression; every value has a truthiness.
    //!
    //! # Conditionals
    //!
    //! ```text
    //! @if age > 18 { You are an adult. } else { You are too young! }
    //! ```
    //!
    //! `else if` chains work as expected.  `null`, `false`, zero and
    //! empty strings, arrays and objects are false; everything else is
    //! true.
    //!
    //! # Loops
    //!
    //! ```text
    //! @foreach item in items {
    //!     - @item
    //! }
    //! ```
    //!
    //! The source must be an array, an object (its values are
    //! iterated) or the context over one.  The loop variable is scoped
    //! to the loop; referring to it afterwards is an error.
    //!
    //! # Variables
    //!
    //! `@let x = expr` binds a variable in the current block;
    //! `@x = expr` reassigns the nearest enclosing binding.  A binding
    //! statement on its own source line leaves no blank line behind.
}

pub mod c_Calling_other_templates {
    //! Templates compose by name through `@render`.
    //!
    //! ```text
    //! @render 'header'
    //! @render 'item_list' with user.items
    //! ```
    //!
    //! The name expression is looked up among the templates declared
    //! in the same source first, then in the process-wide shared
    //! library.  Without `with`, the called template sees the calling
    //! context unchanged; with it, the expression's value becomes the
    //! called template's context.  A text context requires a text (or
    //! plaintext) template; a messages context requires a messages
    //! template.
}

pub mod d_Messages_templates {
    //! A messages template emits `{role, text}` pairs instead of one
    //! string.
    //!
    //! ```text
    //! @messages template t {
    //!     @system message { Keep answers short. }
    //!     @foreach name in names {
    //!         @message { @role 'user' Hello, i am @name! }
    //!     }
    //! }
    //! ```
    //!
    //! `@system message { … }`, `@user message { … }` and
    //! `@assistant message { … }` wrap a text body in a fixed role;
    //! `@message { @role expr … }` computes the role.  Accepted roles
    //! are `system`, `user` and `assistant`; `tool` is reserved and
    //! currently rejected when rendered.  Conditionals, loops, `@let`
    //! and `@render` work between messages just as they do in text.
}

pub mod e_Whitespace_and_indentation {
    //! Rendered output does not depend on how the source is indented.
    //!
    //! After parsing, each template body is refined once: up to four
    //! leading spaces per block level are stripped from every line (a
    //! tab counts as four), the blank lines created by `{` and `}`
    //! are discarded, and a comment alone on its line vanishes with
    //! its line.  Indentation beyond the block level is kept, so
    //! deliberately indented content survives.
    //!
    //! Blocks compose by line: a non-empty `@if` or `@foreach` body
    //! always ends with a line break, and a statement that renders
    //! nothing swallows the line break it occupied.  The end of a
    //! rendered template is trimmed of trailing whitespace.
}
