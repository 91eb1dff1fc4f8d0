//! Language codes and the language fallback scheme.

use crate::metadata::{FallbackScheme, Language, Metadata, MetadataRef};
use lazy_static::lazy_static;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A case-insensitive BCP-47-like language code, e.g. `en`, `en-us`,
/// `zh-hans-cn`.  Stored normalized to lowercase.
#[derive(Debug, Clone, Eq)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: &str) -> Self {
        LanguageCode(code.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `en-us` is a sub-language of `en` (and of itself).
    pub fn is_sublanguage_of(&self, other: &LanguageCode) -> bool {
        self.0 == other.0
            || (self.0.len() > other.0.len()
                && self.0.starts_with(&other.0)
                && self.0.as_bytes()[other.0.len()] == b'-')
    }

    /// The code with its last subtag trimmed: `zh-hans-cn` → `zh-hans`.
    pub fn super_language(&self) -> Option<LanguageCode> {
        self.0
            .rfind('-')
            .map(|at| LanguageCode(self.0[..at].to_string()))
    }

    /// The primary subtag: `zh-hans-cn` → `zh`.
    pub fn topmost(&self) -> LanguageCode {
        match self.0.find('-') {
            Some(at) => LanguageCode(self.0[..at].to_string()),
            None => self.clone(),
        }
    }
}

impl PartialEq for LanguageCode {
    fn eq(&self, other: &LanguageCode) -> bool {
        self.0 == other.0
    }
}

impl Hash for LanguageCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        out.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        LanguageCode::new(code)
    }
}

lazy_static! {
    /// Primary subtags of the most widely used languages; the middle
    /// preference of the fallback scheme.
    static ref MAJOR_LANGUAGES: HashSet<&'static str> = [
        "en", "zh", "hi", "es", "fr", "ar", "bn", "pt", "ru", "ja", "de",
    ]
    .into_iter()
    .collect();
}

pub fn is_major_language(code: &LanguageCode) -> bool {
    MAJOR_LANGUAGES.contains(code.topmost().as_str())
}

/// The canonical fallback scheme: given a wanted language and the
/// languages a library actually has, prefer (in order) the exact code,
/// the nearest super-language, any code sharing the primary subtag, a
/// major world language, and finally anything available.
pub struct LanguageFallback;

impl LanguageFallback {
    fn pick<'a>(
        wanted: &LanguageCode,
        available: &'a [(usize, &'a Language)],
    ) -> Option<usize> {
        if let Some((at, _)) = available.iter().find(|(_, l)| &l.0 == wanted) {
            return Some(*at);
        }
        let mut up = wanted.super_language();
        while let Some(code) = up {
            if let Some((at, _)) = available.iter().find(|(_, l)| l.0 == code) {
                return Some(*at);
            }
            up = code.super_language();
        }
        let top = wanted.topmost();
        if let Some((at, _)) = available.iter().find(|(_, l)| l.0.topmost() == top) {
            return Some(*at);
        }
        if let Some((at, _)) = available.iter().find(|(_, l)| is_major_language(&l.0)) {
            return Some(*at);
        }
        available.first().map(|(at, _)| *at)
    }
}

impl FallbackScheme for LanguageFallback {
    fn metadata_type(&self) -> TypeId {
        TypeId::of::<Language>()
    }

    fn substitute(&self, wanted: &dyn Metadata, available: &[MetadataRef]) -> Option<MetadataRef> {
        let wanted = wanted.as_any().downcast_ref::<Language>()?;
        let languages: Vec<(usize, &Language)> = available
            .iter()
            .enumerate()
            .filter_map(|(at, value)| {
                value.as_any().downcast_ref::<Language>().map(|l| (at, l))
            })
            .collect();
        LanguageFallback::pick(&wanted.0, &languages).map(|at| available[at].clone())
    }
}
