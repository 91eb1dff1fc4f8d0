//! The per-invocation scope of a render: a stack of variable frames
//! over the caller's root value.
//!
//! Every `render` call builds one [`ContextAccessor`].  Compiled
//! templates are immutable and may be rendered from many threads at
//! once, but each invocation owns its accessor, so the mutable frame
//! stack needs no locking.

use crate::error::{RenderResult, RuntimeError};
use crate::functions::FunctionSet;
use crate::library::TemplateLibrary;
use crate::metadata::MetadataCollection;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Upper bound on the frame stack, so a renegade template recursion
/// fails with [`RuntimeError::StackOverflow`] instead of exhausting the
/// real stack.
pub const MAX_FRAME_DEPTH: usize = 1000;

type Frame = HashMap<String, Value>;

struct ScopeInner {
    frames: Vec<Frame>,
    root: Value,
    metadata: Arc<MetadataCollection>,
    functions: Rc<FunctionSet>,
    library: Option<Arc<TemplateLibrary>>,
}

/// The evaluator's scope object: variable frames, the read-only root
/// value, and references to the host template's metadata, function set
/// and library.
///
/// Cloning an accessor yields another handle to the same scope; the
/// `ctx` keyword in a template evaluates to such a handle.
#[derive(Clone)]
pub struct ContextAccessor(Rc<RefCell<ScopeInner>>);

impl ContextAccessor {
    /// An accessor over `root` with empty metadata, the standard
    /// function set and no library.
    pub fn new(root: impl Into<Value>) -> Self {
        ContextAccessor::build(
            root.into(),
            Arc::new(MetadataCollection::new()),
            Rc::new(FunctionSet::standard()),
            None,
        )
    }

    pub(crate) fn build(
        root: Value,
        metadata: Arc<MetadataCollection>,
        functions: Rc<FunctionSet>,
        library: Option<Arc<TemplateLibrary>>,
    ) -> Self {
        ContextAccessor(Rc::new(RefCell::new(ScopeInner {
            // The base frame always exists.
            frames: vec![Frame::new()],
            root,
            metadata,
            functions,
            library,
        })))
    }

    /// Replace the library reference (used when an accessor is built
    /// before its template is registered anywhere).
    pub fn with_library(self, library: Arc<TemplateLibrary>) -> Self {
        self.0.borrow_mut().library = Some(library);
        self
    }

    /// The caller-provided root value.
    pub fn root(&self) -> Value {
        self.0.borrow().root.clone()
    }

    /// The host template's metadata.
    pub fn metadata(&self) -> Arc<MetadataCollection> {
        self.0.borrow().metadata.clone()
    }

    pub fn library(&self) -> Option<Arc<TemplateLibrary>> {
        self.0.borrow().library.clone()
    }

    pub fn push_frame(&self) -> RenderResult<()> {
        let mut inner = self.0.borrow_mut();
        if inner.frames.len() >= MAX_FRAME_DEPTH {
            return Err(RuntimeError::StackOverflow(MAX_FRAME_DEPTH));
        }
        inner.frames.push(Frame::new());
        Ok(())
    }

    pub fn pop_frame(&self) -> RenderResult<()> {
        let mut inner = self.0.borrow_mut();
        if inner.frames.len() <= 1 {
            return Err(RuntimeError::StackUnderflow);
        }
        inner.frames.pop();
        Ok(())
    }

    /// Find `name` in the frames, top-down, falling through to the root
    /// value's properties.
    pub fn lookup(&self, name: &str) -> RenderResult<Value> {
        let inner = self.0.borrow();
        for frame in inner.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        match &inner.root {
            Value::Object(dict) => dict.get(name).cloned(),
            Value::Host(_) | Value::Scope(_) => inner.root.property(name).ok(),
            _ => None,
        }
        .ok_or_else(|| RuntimeError::VariableNotFound(name.to_string()))
    }

    /// Bind `name` in the top frame, shadowing any outer binding.
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        let mut inner = self.0.borrow_mut();
        inner
            .frames
            .last_mut()
            .expect("base frame always exists")
            .insert(name.into(), value);
    }

    /// Assign to the nearest frame that already owns `name`.
    pub fn rebind(&self, name: &str, value: Value) -> RenderResult<()> {
        let mut inner = self.0.borrow_mut();
        for frame in inner.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(RuntimeError::VariableNotFound(name.to_string()))
    }

    /// Call a function from the set attached to this scope.
    pub fn call(&self, name: &str, args: &[Value]) -> RenderResult<Value> {
        let functions = self.0.borrow().functions.clone();
        functions.call(name, args)
    }

    pub(crate) fn same_scope(&self, other: &ContextAccessor) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ContextAccessor {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.0.borrow();
        out.debug_struct("ContextAccessor")
            .field("frames", &inner.frames.len())
            .field("root", &inner.root.kind())
            .finish_non_exhaustive()
    }
}
