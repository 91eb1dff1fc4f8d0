//! Typed metadata attached to templates, and the collections and
//! fallback schemes the library resolves retrievals with.
//!
//! Metadata values compare by concrete type plus payload: a
//! `TargetModel("en")` never equals a `Identifier("en")`.  The trait is
//! object-safe so a library can index arbitrary caller-defined
//! metadata types next to the built-in ones.

use crate::error::RuntimeError;
use crate::language::LanguageCode;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A typed, hashable template attribute.
pub trait Metadata: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    /// Structural equality against another metadata value of any type.
    fn eq_metadata(&self, other: &dyn Metadata) -> bool;
    /// A hash consistent with [`Metadata::eq_metadata`], covering the
    /// concrete type as well as the payload.
    fn hash_metadata(&self, state: &mut dyn Hasher);
    /// Short form for diagnostics.
    fn describe(&self) -> String;
}

/// A shared metadata value.
pub type MetadataRef = Arc<dyn Metadata>;

macro_rules! impl_metadata {
    ($ty:ty) => {
        impl Metadata for $ty {
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn eq_metadata(&self, other: &dyn Metadata) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .map_or(false, |other| other == self)
            }
            fn hash_metadata(&self, mut state: &mut dyn Hasher) {
                TypeId::of::<$ty>().hash(&mut state);
                self.hash(&mut state);
            }
            fn describe(&self) -> String {
                format!("{:?}", self)
            }
        }
    };
}

/// The template's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

/// The natural language a template is written for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language(pub LanguageCode);

impl Language {
    pub fn new(code: &str) -> Self {
        Language(LanguageCode::new(code))
    }
}

/// The model a template is tuned for, e.g. `gpt-4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetModel(pub String);

/// The model family a template is tuned for, e.g. `gpt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetModelFamily(pub String);

impl_metadata!(Identifier);
impl_metadata!(Language);
impl_metadata!(TargetModel);
impl_metadata!(TargetModelFamily);

/// `Identifier` constraint, shared.
pub fn ident(name: &str) -> MetadataRef {
    Arc::new(Identifier(name.to_string()))
}

/// `Language` constraint, shared.
pub fn lang(code: &str) -> MetadataRef {
    Arc::new(Language::new(code))
}

/// `TargetModel` constraint, shared.
pub fn model(name: &str) -> MetadataRef {
    Arc::new(TargetModel(name.to_string()))
}

/// `TargetModelFamily` constraint, shared.
pub fn model_family(name: &str) -> MetadataRef {
    Arc::new(TargetModelFamily(name.to_string()))
}

pub(crate) fn metadata_type(value: &dyn Metadata) -> TypeId {
    value.as_any().type_id()
}

/// A metadata value usable as a hash-map key.
#[derive(Debug, Clone)]
pub struct MetadataKey(pub MetadataRef);

impl PartialEq for MetadataKey {
    fn eq(&self, other: &MetadataKey) -> bool {
        self.0.eq_metadata(other.0.as_ref())
    }
}
impl Eq for MetadataKey {}
impl Hash for MetadataKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_metadata(state);
    }
}

/// A type-indexed multiset of metadata values.
///
/// Values are retrievable by their concrete type in O(1); the set also
/// iterates in insertion order.  (Rust has no subtype hierarchy to
/// index, so the type key is always the concrete type.)
#[derive(Debug, Clone, Default)]
pub struct MetadataCollection {
    values: Vec<MetadataRef>,
    by_type: HashMap<TypeId, Vec<usize>>,
}

impl MetadataCollection {
    pub fn new() -> Self {
        MetadataCollection::default()
    }

    pub fn insert(&mut self, value: MetadataRef) {
        let type_id = metadata_type(value.as_ref());
        self.by_type
            .entry(type_id)
            .or_default()
            .push(self.values.len());
        self.values.push(value);
    }

    /// All values of a concrete type, in insertion order.
    pub fn get_all<T: Metadata>(&self) -> impl Iterator<Item = &T> {
        self.by_type
            .get(&TypeId::of::<T>())
            .into_iter()
            .flatten()
            .filter_map(|&at| self.values[at].as_any().downcast_ref::<T>())
    }

    /// The first value of a concrete type, if any.
    pub fn try_get<T: Metadata>(&self) -> Option<&T> {
        self.get_all::<T>().next()
    }

    pub fn has<T: Metadata>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// The first value of a type, or a [`RuntimeError::MetadataMissing`]
    /// carrying `msg`.
    pub fn require<T: Metadata>(&self, msg: &str) -> Result<&T, RuntimeError> {
        self.try_get::<T>()
            .ok_or_else(|| RuntimeError::MetadataMissing(msg.to_string()))
    }

    /// Whether any value of the type satisfies `pred`; `fallback` when
    /// the type is absent.
    pub fn check<T: Metadata>(&self, pred: impl FnMut(&T) -> bool, fallback: bool) -> bool {
        if self.has::<T>() {
            self.get_all::<T>().any(pred)
        } else {
            fallback
        }
    }

    pub fn contains(&self, value: &dyn Metadata) -> bool {
        self.values.iter().any(|held| held.eq_metadata(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataRef> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<MetadataRef> for MetadataCollection {
    fn from_iter<I: IntoIterator<Item = MetadataRef>>(iter: I) -> Self {
        let mut collection = MetadataCollection::new();
        for value in iter {
            collection.insert(value);
        }
        collection
    }
}

/// A per-metadata-type substitution rule, applied when a retrieval
/// constraint matches nothing directly.
///
/// A scheme only ever selects from `available`; it never invents a
/// value the library has not seen.
pub trait FallbackScheme: Send + Sync {
    /// The metadata type this scheme substitutes for.
    fn metadata_type(&self) -> TypeId;
    /// Pick a substitute for `wanted` among `available`.
    fn substitute(&self, wanted: &dyn Metadata, available: &[MetadataRef]) -> Option<MetadataRef>;
}
