//! The template library: a registry of templates keyed by their
//! metadata, with constraint-intersection retrieval and optional
//! per-type fallback.
//!
//! One library-wide mutex serialises every structural read and write;
//! a retrieval holds it across all of its intersection steps, so a
//! concurrent `add` can never tear a result.

use crate::error::RuntimeError;
use crate::language::LanguageFallback;
use crate::metadata::{
    ident, metadata_type, FallbackScheme, Metadata, MetadataKey, MetadataRef,
};
use crate::parseresult::ParseError;
use crate::template::{parse_source, PlaintextTemplate, Template};
use itertools::Itertools;
use lazy_static::lazy_static;
use std::any::TypeId;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// The file extension (and registry key) of the native template
/// language.
pub const DEFAULT_LANGUAGE: &str = "llt";

/// An error from one of the `import_*` operations.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("no parser registered for template language `{0}`")]
    UnknownLanguage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A source-language front end: parses one source text into templates
/// homed in `library` (without registering them).
pub trait TemplateParser: Send + Sync {
    fn parse(
        &self,
        source: &str,
        library: &Arc<TemplateLibrary>,
        name_hint: Option<&str>,
    ) -> Result<Vec<Arc<Template>>, ParseError>;
}

/// The native `.llt` parser.
struct LltParser;

impl TemplateParser for LltParser {
    fn parse(
        &self,
        source: &str,
        library: &Arc<TemplateLibrary>,
        _name_hint: Option<&str>,
    ) -> Result<Vec<Arc<Template>>, ParseError> {
        parse_source(source, library)
    }
}

/// A trivial front end for `.txt` files: the whole file is one
/// plaintext template, named after the file.
struct PlaintextParser;

impl TemplateParser for PlaintextParser {
    fn parse(
        &self,
        source: &str,
        _library: &Arc<TemplateLibrary>,
        name_hint: Option<&str>,
    ) -> Result<Vec<Arc<Template>>, ParseError> {
        Ok(vec![Arc::new(Template::Plaintext(PlaintextTemplate::new(
            name_hint, source,
        )))])
    }
}

#[derive(Default)]
struct LibraryInner {
    templates: Vec<Arc<Template>>,
    by_value: HashMap<MetadataKey, Vec<Arc<Template>>>,
    /// Distinct metadata values per type, in insertion order; the
    /// input material for fallback schemes.
    by_type: HashMap<TypeId, Vec<MetadataRef>>,
    fallbacks: HashMap<TypeId, Arc<dyn FallbackScheme>>,
    parsers: HashMap<String, Arc<dyn TemplateParser>>,
}

/// A thread-safe registry of templates.
pub struct TemplateLibrary {
    inner: Mutex<LibraryInner>,
}

impl std::fmt::Debug for TemplateLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateLibrary").finish_non_exhaustive()
    }
}

lazy_static! {
    static ref SHARED: Arc<TemplateLibrary> = TemplateLibrary::new();
}

impl TemplateLibrary {
    /// A fresh library with the default fallback schemes and parsers
    /// registered.
    pub fn new() -> Arc<TemplateLibrary> {
        let library = TemplateLibrary {
            inner: Mutex::new(LibraryInner::default()),
        };
        {
            let mut inner = library.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let language_fallback = Arc::new(LanguageFallback);
            inner
                .fallbacks
                .insert(language_fallback.metadata_type(), language_fallback);
            inner
                .parsers
                .insert(DEFAULT_LANGUAGE.to_string(), Arc::new(LltParser));
            inner.parsers.insert("txt".to_string(), Arc::new(PlaintextParser));
        }
        Arc::new(library)
    }

    /// The process-wide shared library: the fallback lookup target for
    /// `@render`.  Lives until process exit.
    pub fn shared() -> Arc<TemplateLibrary> {
        SHARED.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LibraryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a template.  Registering the same instance twice is an
    /// error.
    pub fn add(&self, template: Arc<Template>) -> Result<(), RuntimeError> {
        let mut inner = self.lock();
        if inner.templates.iter().any(|held| Arc::ptr_eq(held, &template)) {
            return Err(RuntimeError::DuplicateTemplate(
                template.name().unwrap_or("<unnamed>").to_string(),
            ));
        }
        debug!(name = template.name().unwrap_or("<unnamed>"), "registering template");
        for value in template.metadata().iter() {
            inner
                .by_value
                .entry(MetadataKey(value.clone()))
                .or_default()
                .push(template.clone());
            let type_id = metadata_type(value.as_ref());
            let known = inner.by_type.entry(type_id).or_default();
            if !known.iter().any(|held| held.eq_metadata(value.as_ref())) {
                known.push(value.clone());
            }
        }
        inner.templates.push(template);
        Ok(())
    }

    /// Register a template unless it already is; `false` on duplicate.
    pub fn try_add(&self, template: Arc<Template>) -> bool {
        self.add(template).is_ok()
    }

    /// Register all of `templates`; the first duplicate is an error.
    pub fn add_range(
        &self,
        templates: impl IntoIterator<Item = Arc<Template>>,
    ) -> Result<(), RuntimeError> {
        for template in templates {
            self.add(template)?;
        }
        Ok(())
    }

    /// Register all of `templates`, skipping duplicates; returns how
    /// many were added.
    pub fn try_add_range(&self, templates: impl IntoIterator<Item = Arc<Template>>) -> usize {
        templates
            .into_iter()
            .filter(|template| self.try_add(template.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().templates.is_empty()
    }

    /// All registered templates, in registration order.
    pub fn templates(&self) -> Vec<Arc<Template>> {
        self.lock().templates.clone()
    }

    /// Register (or replace) the fallback scheme for a metadata type.
    pub fn register_fallback(&self, scheme: Arc<dyn FallbackScheme>) {
        self.lock().fallbacks.insert(scheme.metadata_type(), scheme);
    }

    /// Register (or replace) a parser for a template language code.
    pub fn register_parser(&self, language: &str, parser: Arc<dyn TemplateParser>) {
        self.lock()
            .parsers
            .insert(language.to_ascii_lowercase(), parser);
    }

    // --- retrieval -----------------------------------------------------

    /// Strict, exact-or-fail retrieval of a single template.
    pub fn retrieve(&self, constraints: &[MetadataRef]) -> Result<Arc<Template>, RuntimeError> {
        self.single(constraints, false, false)
    }

    /// Strict retrieval keeping the best partial match.
    pub fn retrieve_best(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.single(constraints, false, true)
    }

    /// Exact-or-fail retrieval with per-type fallback substitution.
    pub fn retrieve_with_fallback(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.single(constraints, true, false)
    }

    /// Best-effort retrieval with per-type fallback substitution.
    pub fn retrieve_best_with_fallback(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.single(constraints, true, true)
    }

    /// Strict, exact-or-fail retrieval of every matching template.
    pub fn retrieve_all(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Vec<Arc<Template>>, RuntimeError> {
        self.select(constraints, false, false)
    }

    pub fn retrieve_all_best(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Vec<Arc<Template>>, RuntimeError> {
        self.select(constraints, false, true)
    }

    pub fn retrieve_all_with_fallback(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Vec<Arc<Template>>, RuntimeError> {
        self.select(constraints, true, false)
    }

    pub fn retrieve_all_best_with_fallback(
        &self,
        constraints: &[MetadataRef],
    ) -> Result<Vec<Arc<Template>>, RuntimeError> {
        self.select(constraints, true, true)
    }

    /// Like [`TemplateLibrary::retrieve`], with `None` for failure.
    pub fn try_retrieve(&self, constraints: &[MetadataRef]) -> Option<Arc<Template>> {
        self.retrieve(constraints).ok()
    }

    pub fn try_retrieve_best(&self, constraints: &[MetadataRef]) -> Option<Arc<Template>> {
        self.retrieve_best(constraints).ok()
    }

    pub fn try_retrieve_with_fallback(
        &self,
        constraints: &[MetadataRef],
    ) -> Option<Arc<Template>> {
        self.retrieve_with_fallback(constraints).ok()
    }

    pub fn try_retrieve_best_with_fallback(
        &self,
        constraints: &[MetadataRef],
    ) -> Option<Arc<Template>> {
        self.retrieve_best_with_fallback(constraints).ok()
    }

    // --- identifier-first conveniences ---------------------------------

    /// Retrieve by name, optionally refined by further constraints.
    pub fn retrieve_named(
        &self,
        name: &str,
        extra: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.retrieve(&named(name, extra))
    }

    pub fn retrieve_named_best(
        &self,
        name: &str,
        extra: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.retrieve_best(&named(name, extra))
    }

    pub fn retrieve_named_with_fallback(
        &self,
        name: &str,
        extra: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.retrieve_with_fallback(&named(name, extra))
    }

    pub fn retrieve_named_best_with_fallback(
        &self,
        name: &str,
        extra: &[MetadataRef],
    ) -> Result<Arc<Template>, RuntimeError> {
        self.retrieve_best_with_fallback(&named(name, extra))
    }

    pub fn try_retrieve_named(&self, name: &str, extra: &[MetadataRef]) -> Option<Arc<Template>> {
        self.retrieve_named(name, extra).ok()
    }

    fn single(
        &self,
        constraints: &[MetadataRef],
        use_fallback: bool,
        best_effort: bool,
    ) -> Result<Arc<Template>, RuntimeError> {
        self.select(constraints, use_fallback, best_effort)?
            .first()
            .cloned()
            .ok_or_else(|| not_found(constraints))
    }

    fn select(
        &self,
        constraints: &[MetadataRef],
        use_fallback: bool,
        best_effort: bool,
    ) -> Result<Vec<Arc<Template>>, RuntimeError> {
        let inner = self.lock();
        let mut candidates: Option<Vec<Arc<Template>>> = None;
        for constraint in constraints {
            let mut step = inner
                .by_value
                .get(&MetadataKey(constraint.clone()))
                .cloned()
                .unwrap_or_default();
            if step.is_empty() && use_fallback {
                let type_id = metadata_type(constraint.as_ref());
                if let Some(scheme) = inner.fallbacks.get(&type_id) {
                    let available = inner.by_type.get(&type_id).cloned().unwrap_or_default();
                    if let Some(substitute) =
                        scheme.substitute(constraint.as_ref(), &available)
                    {
                        step = inner
                            .by_value
                            .get(&MetadataKey(substitute))
                            .cloned()
                            .unwrap_or_default();
                    }
                }
            }
            match candidates {
                None => {
                    // The first constraint failing fails the whole
                    // retrieval, best-effort or not.
                    if step.is_empty() {
                        return Err(not_found(constraints));
                    }
                    candidates = Some(step);
                }
                Some(ref mut current) => {
                    let narrowed: Vec<Arc<Template>> = current
                        .iter()
                        .filter(|held| step.iter().any(|t| Arc::ptr_eq(t, held)))
                        .cloned()
                        .collect();
                    if narrowed.is_empty() {
                        if best_effort {
                            return Ok(current.clone());
                        }
                        return Err(not_found(constraints));
                    }
                    *current = narrowed;
                }
            }
        }
        Ok(candidates.unwrap_or_else(|| inner.templates.clone()))
    }

    // --- imports -------------------------------------------------------

    /// Parse `source` as native template text and register everything
    /// it declares; returns how many templates were added.
    pub fn import_str(self: &Arc<Self>, source: &str) -> Result<usize, ImportError> {
        self.import_with(source, DEFAULT_LANGUAGE, None)
    }

    /// Read all of `reader` and import it as `language`.
    pub fn import_reader(
        self: &Arc<Self>,
        mut reader: impl Read,
        language: &str,
    ) -> Result<usize, ImportError> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        self.import_with(&source, language, None)
    }

    /// Load one file; the extension picks the parser (default `llt`),
    /// the file stem becomes the name hint.
    pub fn import_path(self: &Arc<Self>, path: &Path) -> Result<usize, ImportError> {
        let language = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let name_hint = path.file_stem().and_then(|stem| stem.to_str()).map(String::from);
        let source = std::fs::read_to_string(path)?;
        self.import_with(&source, &language, name_hint.as_deref())
    }

    fn import_with(
        self: &Arc<Self>,
        source: &str,
        language: &str,
        name_hint: Option<&str>,
    ) -> Result<usize, ImportError> {
        let parser = self
            .lock()
            .parsers
            .get(language)
            .cloned()
            .ok_or_else(|| ImportError::UnknownLanguage(language.to_string()))?;
        let templates = parser.parse(source, self, name_hint)?;
        let count = templates.len();
        self.add_range(templates)?;
        debug!(count, language, "imported templates");
        Ok(count)
    }
}

fn named(name: &str, extra: &[MetadataRef]) -> Vec<MetadataRef> {
    std::iter::once(ident(name))
        .chain(extra.iter().cloned())
        .collect()
}

fn not_found(constraints: &[MetadataRef]) -> RuntimeError {
    if constraints.is_empty() {
        RuntimeError::TemplateNotFound("<no constraints>".to_string())
    } else {
        RuntimeError::TemplateNotFound(
            constraints
                .iter()
                .map(|constraint| constraint.describe())
                .join(", "),
        )
    }
}
