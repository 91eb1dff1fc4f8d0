//! Compiled templates and the top-level source parser.
//!
//! A source file is a sequence of `@template` and `@messages template`
//! declarations.  Parsing compiles each declaration (refining its body
//! once) and homes the whole batch in a per-parse library, so sibling
//! templates can `@render` one another.

use crate::error::RenderResult;
use crate::expression::{constant, identifier, word, Const};
use crate::functions::FunctionSet;
use crate::library::TemplateLibrary;
use crate::message::Message;
use crate::metadata::{ident, lang, model, model_family, Identifier, MetadataCollection};
use crate::parseresult::{PResult, ParseError};
use crate::refine::{refine_messages_body, refine_template_body};
use crate::render::{render_message_sequence, render_sequence};
use crate::scope::ContextAccessor;
use crate::spacelike::spacelike;
use crate::templateexpression::{
    message_statement, template_expression, MessageExpression, TemplateExpression,
};
use crate::value::Value;
use crate::comma_list::comma_list;
use nom::branch::alt;
use nom::character::complete::{char, multispace1};
use nom::combinator::{map, opt};
use nom::error::context;
use nom::multi::many_till;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use std::ops::Deref;
use std::rc::Rc;
use std::sync::{Arc, Weak};
use tracing::trace;

/// A compiled template of any kind.
#[derive(Debug)]
pub enum Template {
    Prompt(PromptTemplate),
    Messages(MessagesTemplate),
    Plaintext(PlaintextTemplate),
}

impl Template {
    pub fn metadata(&self) -> &MetadataCollection {
        match self {
            Template::Prompt(t) => &t.metadata,
            Template::Messages(t) => &t.metadata,
            Template::Plaintext(t) => &t.metadata,
        }
    }

    /// The identifier metadata, if the template is named.
    pub fn name(&self) -> Option<&str> {
        self.metadata()
            .try_get::<Identifier>()
            .map(|id| id.0.as_str())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Template::Prompt(_) => "text",
            Template::Messages(_) => "messages",
            Template::Plaintext(_) => "plaintext",
        }
    }

    /// A ready-made plaintext template.
    pub fn plaintext(name: Option<&str>, content: impl Into<String>) -> Arc<Template> {
        Arc::new(Template::Plaintext(PlaintextTemplate::new(name, content)))
    }
}

/// A compiled text template: renders to a formatted string.
#[derive(Debug)]
pub struct PromptTemplate {
    body: Vec<TemplateExpression>,
    metadata: Arc<MetadataCollection>,
    library: Weak<TemplateLibrary>,
}

impl PromptTemplate {
    fn new(
        body: Vec<TemplateExpression>,
        metadata: MetadataCollection,
        library: &Arc<TemplateLibrary>,
    ) -> Self {
        PromptTemplate {
            body,
            metadata: Arc::new(metadata),
            library: Arc::downgrade(library),
        }
    }

    pub fn metadata(&self) -> &MetadataCollection {
        &self.metadata
    }

    pub(crate) fn body(&self) -> &[TemplateExpression] {
        &self.body
    }

    /// Render against a context value with the standard function set.
    pub fn render(&self, root: impl Into<Value>) -> RenderResult<String> {
        self.render_with(root, FunctionSet::standard())
    }

    /// Render with a caller-extended function set.
    pub fn render_with(
        &self,
        root: impl Into<Value>,
        functions: FunctionSet,
    ) -> RenderResult<String> {
        trace!("rendering text template");
        let scope = ContextAccessor::build(
            root.into(),
            self.metadata.clone(),
            Rc::new(functions),
            self.library.upgrade(),
        );
        Ok(render_sequence(&self.body, &scope)?.trim_end().to_string())
    }
}

/// A compiled messages template: renders to a sequence of role-tagged
/// messages.
#[derive(Debug)]
pub struct MessagesTemplate {
    body: Vec<MessageExpression>,
    metadata: Arc<MetadataCollection>,
    library: Weak<TemplateLibrary>,
}

impl MessagesTemplate {
    fn new(
        body: Vec<MessageExpression>,
        metadata: MetadataCollection,
        library: &Arc<TemplateLibrary>,
    ) -> Self {
        MessagesTemplate {
            body,
            metadata: Arc::new(metadata),
            library: Arc::downgrade(library),
        }
    }

    pub fn metadata(&self) -> &MetadataCollection {
        &self.metadata
    }

    pub(crate) fn body(&self) -> &[MessageExpression] {
        &self.body
    }

    pub fn render(&self, root: impl Into<Value>) -> RenderResult<Vec<Message>> {
        self.render_with(root, FunctionSet::standard())
    }

    pub fn render_with(
        &self,
        root: impl Into<Value>,
        functions: FunctionSet,
    ) -> RenderResult<Vec<Message>> {
        trace!("rendering messages template");
        let scope = ContextAccessor::build(
            root.into(),
            self.metadata.clone(),
            Rc::new(functions),
            self.library.upgrade(),
        );
        render_message_sequence(&self.body, &scope)
    }
}

/// A literal template: no statements, just content.
#[derive(Debug)]
pub struct PlaintextTemplate {
    content: String,
    metadata: Arc<MetadataCollection>,
}

impl PlaintextTemplate {
    pub fn new(name: Option<&str>, content: impl Into<String>) -> Self {
        let mut metadata = MetadataCollection::new();
        if let Some(name) = name {
            metadata.insert(ident(name));
        }
        PlaintextTemplate {
            content: content.into(),
            metadata: Arc::new(metadata),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// The result of parsing one source text: the compiled templates plus
/// the per-parse library that keeps sibling `@render` lookups alive.
///
/// Dropping the set drops the library; keep it (or the library) around
/// for as long as the templates render each other.
#[derive(Debug)]
pub struct TemplateSet {
    templates: Vec<Arc<Template>>,
    library: Arc<TemplateLibrary>,
}

impl TemplateSet {
    pub fn library(&self) -> &Arc<TemplateLibrary> {
        &self.library
    }

    /// The first template named `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates
            .iter()
            .find(|template| template.name() == Some(name))
    }

    /// The first text template named `name`.
    pub fn prompt(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find_map(|template| match &**template {
            Template::Prompt(prompt) if template.name() == Some(name) => Some(prompt),
            _ => None,
        })
    }

    /// The first messages template named `name`.
    pub fn messages(&self, name: &str) -> Option<&MessagesTemplate> {
        self.templates.iter().find_map(|template| match &**template {
            Template::Messages(messages) if template.name() == Some(name) => Some(messages),
            _ => None,
        })
    }
}

impl Deref for TemplateSet {
    type Target = [Arc<Template>];
    fn deref(&self) -> &[Arc<Template>] {
        &self.templates
    }
}

/// Parse a source text into a fresh [`TemplateSet`].
pub fn parse_str(source: &str) -> Result<TemplateSet, ParseError> {
    let library = TemplateLibrary::new();
    let templates = parse_source(source, &library)?;
    // Fresh instances can never be duplicates.
    library.try_add_range(templates.iter().cloned());
    Ok(TemplateSet { templates, library })
}

/// Parse a source text into templates homed in `library`, without
/// registering them.
pub(crate) fn parse_source(
    source: &str,
    library: &Arc<TemplateLibrary>,
) -> Result<Vec<Arc<Template>>, ParseError> {
    let raws = match source_file(source) {
        Ok((_, raws)) => raws,
        Err(error) => return Err(ParseError::from_nom(source, error)),
    };
    Ok(raws
        .into_iter()
        .map(|raw| Arc::new(compile(raw, library)))
        .collect())
}

enum RawTemplate {
    Prompt {
        name: Option<String>,
        metadata: Vec<(String, Const)>,
        body: Vec<TemplateExpression>,
    },
    Messages {
        name: Option<String>,
        metadata: Vec<(String, Const)>,
        body: Vec<MessageExpression>,
    },
}

fn compile(raw: RawTemplate, library: &Arc<TemplateLibrary>) -> Template {
    match raw {
        RawTemplate::Prompt {
            name,
            metadata,
            mut body,
        } => {
            refine_template_body(&mut body);
            Template::Prompt(PromptTemplate::new(
                body,
                build_metadata(name, metadata),
                library,
            ))
        }
        RawTemplate::Messages {
            name,
            metadata,
            mut body,
        } => {
            refine_messages_body(&mut body);
            Template::Messages(MessagesTemplate::new(
                body,
                build_metadata(name, metadata),
                library,
            ))
        }
    }
}

/// The three recognised metadata keys; anything else is ignored, as
/// are non-string values.
fn build_metadata(name: Option<String>, entries: Vec<(String, Const)>) -> MetadataCollection {
    let mut collection = MetadataCollection::new();
    if let Some(name) = name {
        collection.insert(ident(&name));
    }
    for (key, value) in &entries {
        if let Some(text) = value.as_str() {
            match key.as_str() {
                "lang" => collection.insert(lang(text)),
                "model" => collection.insert(model(text)),
                "model_family" => collection.insert(model_family(text)),
                _ => {}
            }
        }
    }
    collection
}

fn source_file(input: &str) -> PResult<Vec<RawTemplate>> {
    map(
        preceded(
            spacelike,
            many_till(
                terminated(
                    context("expected template declaration", template_decl),
                    spacelike,
                ),
                end_of_file,
            ),
        ),
        |(declarations, ())| declarations,
    )(input)
}

fn end_of_file(input: &str) -> PResult<()> {
    if input.is_empty() {
        Ok((input, ()))
    } else {
        use nom::error::{VerboseError, VerboseErrorKind};
        Err(nom::Err::Error(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("expected end of file"))],
        }))
    }
}

fn template_decl(input: &str) -> PResult<RawTemplate> {
    preceded(
        char('@'),
        alt((
            preceded(word("template"), text_template_tail),
            preceded(
                terminated(word("messages"), multispace1),
                preceded(
                    context("expected \"template\"", word("template")),
                    messages_template_tail,
                ),
            ),
        )),
    )(input)
}

fn template_header(input: &str) -> PResult<(Option<String>, Option<Vec<(String, Const)>>)> {
    map(
        tuple((
            opt(preceded(multispace1, map(identifier, String::from))),
            preceded(spacelike, context("expected \"{\"", char('{'))),
            opt(preceded(spacelike, metadata_block)),
        )),
        |(name, _, metadata)| (name, metadata),
    )(input)
}

fn text_template_tail(input: &str) -> PResult<RawTemplate> {
    map(
        pair(
            template_header,
            map(
                many_till(
                    context("error in template statement starting here", template_expression),
                    char('}'),
                ),
                |(body, _)| body,
            ),
        ),
        |((name, metadata), body)| RawTemplate::Prompt {
            name,
            metadata: metadata.unwrap_or_default(),
            body,
        },
    )(input)
}

fn messages_template_tail(input: &str) -> PResult<RawTemplate> {
    map(
        pair(
            template_header,
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
        ),
        |((name, metadata), body)| RawTemplate::Messages {
            name,
            metadata: metadata.unwrap_or_default(),
            body,
        },
    )(input)
}

/// `@metadata { lang: 'en', model: 'gpt-4', … }` with constant values
/// and optional trailing comma.  Comments are allowed between entries.
fn metadata_block(input: &str) -> PResult<Vec<(String, Const)>> {
    preceded(
        pair(word("@metadata"), spacelike),
        comma_list(
            '{',
            metadata_entry,
            '}',
            spacelike,
            "expected ',' or '}' in metadata block",
        ),
    )(input)
}

fn metadata_entry(input: &str) -> PResult<(String, Const)> {
    separated_pair(
        map(identifier, String::from),
        delimited(spacelike, char(':'), spacelike),
        context("expected constant metadata value", constant),
    )(input)
}
