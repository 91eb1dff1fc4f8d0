//! The runtime error taxonomy.
//!
//! Everything that can go wrong while evaluating a template or querying a
//! library is a [`RuntimeError`].  The engine never catches these itself;
//! they propagate to whoever called `render` (or `retrieve`).

use thiserror::Error;

/// Result alias used throughout the evaluator.
pub type RenderResult<T> = std::result::Result<T, RuntimeError>;

/// An error raised while rendering a template or retrieving one from a
/// library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Property access on a value that has no such property, or no
    /// properties at all.
    #[error("cannot access property `{name}` on a {kind} value")]
    CannotAccessProperty { name: String, kind: &'static str },

    /// Index outside the valid range of an array or string.
    #[error("index {index} is out of range (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// Arrays and strings only take whole-number indices.
    #[error("index `{0}` is not an integer")]
    IndexNotInteger(String),

    /// The value kind does not support indexing at all.
    #[error("a {0} value cannot be indexed")]
    IndexingNotSupported(&'static str),

    /// Method call on a value that has no methods.
    #[error("method `{name}` is not supported on a {kind} value")]
    MethodNotSupported { name: String, kind: &'static str },

    /// A call through the context to a name the function set lacks.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// Unary operator applied to a value outside its domain.
    #[error("unary `{op}` is not applicable to a {kind} value")]
    UnaryNotApplicable { op: &'static str, kind: &'static str },

    /// Binary operator applied to a value pair outside its domain.
    #[error("`{op}` is not applicable to {left} and {right} values")]
    BinaryNotApplicable {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// `@foreach` over something that is not a sequence.
    #[error("a {0} value is not iterable")]
    NotIterable(&'static str),

    /// A value kind with no text form was output or used as a format key.
    #[error("a {0} value cannot be rendered as text")]
    NotStringifiable(&'static str),

    /// Name lookup failed in every frame and in the root value.
    #[error("variable `{0}` is not defined")]
    VariableNotFound(String),

    /// The frame stack hit its depth bound.
    #[error("frame stack exceeded {0} frames")]
    StackOverflow(usize),

    /// More frames were popped than pushed.
    #[error("frame stack underflow")]
    StackUnderflow,

    /// `@render` (or a library retrieval) found no matching template.
    #[error("no template found for {0}")]
    TemplateNotFound(String),

    /// `@render` resolved a template of the wrong kind for its context.
    #[error("expected a {expected} template, found a {actual} template")]
    TemplateKindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A message role expression produced an unrecognised role name.
    #[error("`{0}` is not a valid message role")]
    InvalidRole(String),

    /// The `tool` role is reserved but not yet renderable.
    #[error("the `tool` role is reserved and not supported yet")]
    ToolNotSupported,

    /// A format specifier the value kind cannot honour.
    #[error("invalid format `{format}` for a {kind} value")]
    FormatInvalid { kind: &'static str, format: String },

    /// Registering a template that is already present in the library.
    #[error("template `{0}` is already registered")]
    DuplicateTemplate(String),

    /// `MetadataCollection::require` on an absent metadata type.
    #[error("{0}")]
    MetadataMissing(String),
}
