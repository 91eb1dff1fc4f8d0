//! llt is a template language and rendering engine for composing
//! prompts and multi-turn chat transcripts for large language models.
//!
//! Template authors interleave literal prose with embedded
//! expressions, conditionals, iteration, variable bindings and calls
//! to other templates.  At runtime the engine evaluates a compiled
//! template against a caller-supplied context value and produces
//! either a formatted plain-text string (a *text template*) or an
//! ordered sequence of role-tagged chat messages (a *messages
//! template*).
//!
//! The template syntax, which borrows its `@`-prefixed statement style
//! from the Razor family of template languages, is documented in [the
//! _Template syntax_ module](Template_syntax/index.html).  A sample
//! template may look like this:
//!
//! ```text
//! @template greeting {
//!     @metadata { lang: 'en' }
//!     Greetings, @name!
//!     @if age > 18 { You are an adult. } else { You are too young! }
//!     @foreach item in items {
//!         - @item
//!     }
//! }
//! ```
//!
//! # Quick start
//!
//! Parse a source text and render a template against a context value;
//! any `serde_json::Value` works as a context:
//!
//! ```
//! use llt::parse_str;
//! use serde_json::json;
//!
//! let templates = parse_str("@template hello { Hello, @name! }").unwrap();
//! let hello = templates.prompt("hello").unwrap();
//! let out = hello.render(json!({ "name": "Andrew" })).unwrap();
//! assert_eq!(out, "Hello, Andrew!");
//! ```
//!
//! Messages templates produce role-tagged entries instead:
//!
//! ```
//! use llt::{parse_str, Role};
//! use serde_json::json;
//!
//! let templates = parse_str(
//!     "@messages template chat {\n\
//!      @system message { Be brief. }\n\
//!      @message { @role 'user' Hi, i am @name! }\n\
//!      }",
//! )
//! .unwrap();
//! let chat = templates.messages("chat").unwrap();
//! let rendered = chat.render(json!({ "name": "Rob" })).unwrap();
//! assert_eq!(rendered.len(), 2);
//! assert_eq!(rendered[0].role, Role::System);
//! assert_eq!(rendered[1].content, "Hi, i am Rob!");
//! ```
//!
//! # Libraries and metadata
//!
//! Templates carry metadata (identifier, language, target model, …)
//! and register themselves in a [`TemplateLibrary`], which resolves a
//! retrieval request by intersecting metadata constraints, optionally
//! applying per-type fallback schemes such as the built-in language
//! fallback:
//!
//! ```
//! use llt::{lang, parse_str};
//!
//! let templates = parse_str(
//!     "@template greeting { @metadata { lang: 'en' } Hello! }",
//! )
//! .unwrap();
//! let library = templates.library();
//!
//! // No French template, but English is a fine substitute.
//! let found = library
//!     .retrieve_named_with_fallback("greeting", &[lang("fr")])
//!     .unwrap();
//! assert_eq!(found.name(), Some("greeting"));
//! ```
//!
//! A compiled template is immutable and may be rendered concurrently
//! from any number of threads; every `render` call evaluates against
//! its own [`ContextAccessor`].  Library mutation and retrieval are
//! serialised by one library-wide lock.  The process-wide
//! [`TemplateLibrary::shared`] library is consulted as a fallback when
//! `@render` cannot find a template among its siblings.

mod comma_list;
mod error;
mod expression;
mod functions;
mod language;
mod library;
mod message;
mod metadata;
mod parseresult;
mod refine;
mod render;
mod scope;
mod spacelike;
mod template;
mod templateexpression;
mod value;
pub mod Template_syntax;

pub use crate::error::{RenderResult, RuntimeError};
pub use crate::expression::{Const, Expr};
pub use crate::functions::FunctionSet;
pub use crate::language::{LanguageCode, LanguageFallback};
pub use crate::library::{ImportError, TemplateLibrary, TemplateParser, DEFAULT_LANGUAGE};
pub use crate::message::{Message, Role};
pub use crate::metadata::{
    ident, lang, model, model_family, FallbackScheme, Identifier, Language, Metadata,
    MetadataCollection, MetadataKey, MetadataRef, TargetModel, TargetModelFamily,
};
pub use crate::parseresult::{show_errors, ParseError, ParseErrorKind};
pub use crate::scope::{ContextAccessor, MAX_FRAME_DEPTH};
pub use crate::template::{
    parse_str, MessagesTemplate, PlaintextTemplate, PromptTemplate, Template, TemplateSet,
};
pub use crate::value::{BinaryOp, Dict, HostObject, UnaryOp, Value};
