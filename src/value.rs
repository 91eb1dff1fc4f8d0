//! The dynamically typed value system.
//!
//! Every piece of data a template touches is a [`Value`]: the caller's
//! context, literals from the source, and everything an expression
//! produces.  The operator surface here is the behavioural contract the
//! whole engine rests on; each operation either returns a value or fails
//! with a [`RuntimeError`], never panics.
//!
//! Values are cheap to clone: compound values share their payload
//! through `Rc`, and the engine never mutates caller-supplied data.

use crate::error::{RenderResult, RuntimeError};
use crate::scope::ContextAccessor;
use std::fmt;
use std::rc::Rc;

/// A unary operator of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`, numbers only.
    Negate,
    /// `+x`, numbers only.
    Plus,
    /// `!x`, defined on every value through its boolean projection.
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }
}

/// A binary operator of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// An insertion-ordered string-keyed dictionary.
///
/// Lookup is linear; template dictionaries are small and the predictable
/// iteration order is what `@foreach` over an object relies on.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(String, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Dict::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace, keeping the original position of a replaced key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl PartialEq for Dict {
    /// Entry-wise equality, independent of insertion order.
    fn eq(&self, other: &Dict) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |o| o == v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// A read-only property bag over an arbitrary host object.
///
/// The engine never sees the object itself, only a lookup capability
/// captured at construction time.  Lookups may be folded to lowercase
/// with [`HostObject::with_lowercase_keys`], and
/// [`HostObject::snapshot`] wraps a plain [`Dict`] copy for hosts that
/// prefer to hand over data by value.
#[derive(Clone)]
pub struct HostObject {
    lookup: Rc<dyn Fn(&str) -> Option<Value>>,
    lowercase_keys: bool,
}

impl HostObject {
    pub fn new(lookup: impl Fn(&str) -> Option<Value> + 'static) -> Self {
        HostObject {
            lookup: Rc::new(lookup),
            lowercase_keys: false,
        }
    }

    /// Fold every lookup key to lowercase before consulting the host.
    pub fn with_lowercase_keys(lookup: impl Fn(&str) -> Option<Value> + 'static) -> Self {
        HostObject {
            lookup: Rc::new(lookup),
            lowercase_keys: true,
        }
    }

    /// A host object backed by a one-time copy of `dict`.
    pub fn snapshot(dict: Dict) -> Self {
        HostObject::new(move |name| dict.get(name).cloned())
    }

    fn get(&self, name: &str) -> Option<Value> {
        if self.lowercase_keys {
            (self.lookup)(&name.to_lowercase())
        } else {
            (self.lookup)(name)
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        out.debug_struct("HostObject")
            .field("lowercase_keys", &self.lowercase_keys)
            .finish_non_exhaustive()
    }
}

/// A dynamically typed template value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Rc<Vec<Value>>),
    Object(Rc<Dict>),
    Host(HostObject),
    Scope(ContextAccessor),
}

impl Value {
    /// The kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Host(_) => "host object",
            Value::Scope(_) => "context",
        }
    }

    pub fn array(items: impl IntoIterator<Item = impl Into<Value>>) -> Value {
        Value::Array(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn object(dict: Dict) -> Value {
        Value::Object(Rc::new(dict))
    }

    /// The boolean projection every value has.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(d) => !d.is_empty(),
            Value::Host(_) => true,
            Value::Scope(_) => true,
        }
    }

    /// Render the value as text, honouring an optional format.
    ///
    /// Compound values have no text form and raise
    /// [`RuntimeError::NotStringifiable`].
    pub fn to_text(&self, format: Option<&str>) -> RenderResult<String> {
        match self {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => match format {
                None => Ok(if *b { "True" } else { "False" }.to_string()),
                Some(fmt) => match fmt.split_once('/') {
                    Some((yes, no)) => Ok(if *b { yes } else { no }.to_string()),
                    None => Err(RuntimeError::FormatInvalid {
                        kind: self.kind(),
                        format: fmt.to_string(),
                    }),
                },
            },
            Value::Number(n) => match format {
                None => Ok(format_number(*n)),
                Some(fmt) => format_number_spec(*n, fmt),
            },
            Value::Str(s) => Ok(match format {
                Some("upper") => s.to_uppercase(),
                Some("lower") => s.to_lowercase(),
                Some("trim") => s.trim().to_string(),
                // Unknown string formats fall through to identity.
                _ => s.clone(),
            }),
            other => Err(RuntimeError::NotStringifiable(other.kind())),
        }
    }

    /// Property access: objects by key, host objects through their
    /// capability, the context through its frames.
    pub fn property(&self, name: &str) -> RenderResult<Value> {
        match self {
            Value::Object(dict) => {
                dict.get(name).cloned().ok_or_else(|| {
                    RuntimeError::CannotAccessProperty {
                        name: name.to_string(),
                        kind: self.kind(),
                    }
                })
            }
            Value::Host(host) => host.get(name).ok_or_else(|| {
                RuntimeError::CannotAccessProperty {
                    name: name.to_string(),
                    kind: self.kind(),
                }
            }),
            Value::Scope(scope) => scope.lookup(name),
            other => Err(RuntimeError::CannotAccessProperty {
                name: name.to_string(),
                kind: other.kind(),
            }),
        }
    }

    /// Indexing: arrays and strings by integer, objects by the text of
    /// the index value.
    pub fn index(&self, index: &Value) -> RenderResult<Value> {
        match self {
            Value::Array(items) => {
                let i = integer_index(index)?;
                items
                    .get(checked_index(i, items.len())?)
                    .cloned()
                    .ok_or(RuntimeError::IndexOutOfRange {
                        index: i,
                        len: items.len(),
                    })
            }
            Value::Str(s) => {
                let i = integer_index(index)?;
                let len = s.chars().count();
                let at = checked_index(i, len)?;
                s.chars()
                    .nth(at)
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or(RuntimeError::IndexOutOfRange { index: i, len })
            }
            Value::Object(dict) => {
                let key = index.to_text(None)?;
                dict.get(&key).cloned().ok_or_else(|| {
                    RuntimeError::CannotAccessProperty {
                        name: key,
                        kind: self.kind(),
                    }
                })
            }
            Value::Scope(scope) => scope.root().index(index),
            other => Err(RuntimeError::IndexingNotSupported(other.kind())),
        }
    }

    pub fn unary(&self, op: UnaryOp) -> RenderResult<Value> {
        match (op, self) {
            (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
            (op, value) => Err(RuntimeError::UnaryNotApplicable {
                op: op.symbol(),
                kind: value.kind(),
            }),
        }
    }

    pub fn binary(&self, op: BinaryOp, other: &Value) -> RenderResult<Value> {
        use BinaryOp::*;
        match op {
            Add => self.add(other),
            Sub | Mul | Div | Rem => self.arithmetic(op, other),
            Lt | Le | Gt | Ge => self.compare(op, other),
            Eq => Ok(Value::Bool(self == other)),
            Ne => Ok(Value::Bool(self != other)),
            // Both operands are always evaluated before we get here;
            // the operators are not short-circuiting.
            And => Ok(Value::Bool(self.truthy() && other.truthy())),
            Or => Ok(Value::Bool(self.truthy() || other.truthy())),
        }
    }

    fn add(&self, other: &Value) -> RenderResult<Value> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), b) => Ok(Value::Str(format!("{}{}", a, b.to_text(None)?))),
            (a, Value::Str(b)) => Ok(Value::Str(format!("{}{}", a.to_text(None)?, b))),
            (Value::Array(a), Value::Array(b)) => {
                let mut joined = a.as_ref().clone();
                joined.extend(b.iter().cloned());
                Ok(Value::Array(Rc::new(joined)))
            }
            (Value::Object(a), Value::Object(b)) => {
                let mut merged = a.as_ref().clone();
                for (k, v) in b.iter() {
                    merged.insert(k, v.clone());
                }
                Ok(Value::Object(Rc::new(merged)))
            }
            (a, b) => Err(RuntimeError::BinaryNotApplicable {
                op: "+",
                left: a.kind(),
                right: b.kind(),
            }),
        }
    }

    fn arithmetic(&self, op: BinaryOp, other: &Value) -> RenderResult<Value> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => unreachable!(),
            })),
            (a, b) => Err(RuntimeError::BinaryNotApplicable {
                op: op.symbol(),
                left: a.kind(),
                right: b.kind(),
            }),
        }
    }

    fn compare(&self, op: BinaryOp, other: &Value) -> RenderResult<Value> {
        let ordering = match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            }
            (Value::Str(a), Value::Str(b)) => a.as_str().cmp(b.as_str()),
            (a, b) => {
                return Err(RuntimeError::BinaryNotApplicable {
                    op: op.symbol(),
                    left: a.kind(),
                    right: b.kind(),
                })
            }
        };
        Ok(Value::Bool(match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::Ge => ordering.is_ge(),
            _ => unreachable!(),
        }))
    }

    /// The length projection backing the `length` function.
    pub fn length(&self) -> RenderResult<usize> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::Array(a) => Ok(a.len()),
            Value::Object(d) => Ok(d.len()),
            Value::Scope(scope) => scope.root().length(),
            other => Err(RuntimeError::MethodNotSupported {
                name: "length".to_string(),
                kind: other.kind(),
            }),
        }
    }

    /// The elements `@foreach` walks: array items, object values, or
    /// whatever the context's root iterates as.
    pub fn iterate(&self) -> RenderResult<Vec<Value>> {
        match self {
            Value::Array(items) => Ok(items.as_ref().clone()),
            Value::Object(dict) => Ok(dict.values().cloned().collect()),
            Value::Scope(scope) => scope.root().iterate(),
            other => Err(RuntimeError::NotIterable(other.kind())),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality over the wrapped data; host objects and
    /// contexts compare by identity.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(&a.lookup, &b.lookup),
            (Value::Scope(a), Value::Scope(b)) => a.same_scope(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Debug-oriented rendering; template output goes through
    /// [`Value::to_text`] instead.
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(out, "{}", if *b { "True" } else { "False" }),
            Value::Number(n) => write!(out, "{}", format_number(*n)),
            Value::Str(s) => out.write_str(s),
            other => write!(out, "<{}>", other.kind()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Number(n as f64)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}
impl From<usize> for Value {
    fn from(n: usize) -> Value {
        Value::Number(n as f64)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}
impl From<Dict> for Value {
    fn from(d: Dict) -> Value {
        Value::Object(Rc::new(d))
    }
}
impl From<HostObject> for Value {
    fn from(h: HostObject) -> Value {
        Value::Host(h)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Value {
        Value::array(items)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                Value::Number(n.as_f64().unwrap_or(f64::NAN))
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(Rc::new(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(Rc::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

/// Shortest faithful text form of a double: integral values print
/// without a decimal point.
pub(crate) fn format_number(n: f64) -> String {
    format!("{}", n)
}

/// A small numeric format language: `F`/`f` with optional decimal count
/// (`F2`), and `0.00`-style placeholder patterns (`#` positions drop
/// trailing zeroes).
fn format_number_spec(n: f64, spec: &str) -> RenderResult<String> {
    let invalid = || RuntimeError::FormatInvalid {
        kind: "number",
        format: spec.to_string(),
    };
    if let Some(decimals) = spec.strip_prefix(['F', 'f']) {
        let decimals = if decimals.is_empty() {
            2
        } else {
            decimals.parse::<usize>().map_err(|_| invalid())?
        };
        return Ok(format!("{:.*}", decimals, n));
    }
    if spec.chars().all(|c| matches!(c, '0' | '#' | '.' | ',')) && !spec.is_empty() {
        let (whole, frac) = match spec.split_once('.') {
            Some((w, f)) => (w, f),
            None => (spec, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        let fixed = frac.chars().filter(|c| *c == '0').count();
        let most = frac.len();
        let mut text = format!("{:.*}", most, n);
        if most > fixed {
            // `#` positions are optional digits.
            while text.contains('.')
                && text.len() - text.find('.').unwrap() - 1 > fixed
                && text.ends_with('0')
            {
                text.pop();
            }
            if text.ends_with('.') {
                text.pop();
            }
        }
        return Ok(text);
    }
    Err(invalid())
}

fn integer_index(index: &Value) -> RenderResult<i64> {
    match index {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        other => Err(RuntimeError::IndexNotInteger(
            other.to_text(None).unwrap_or_else(|_| other.kind().to_string()),
        )),
    }
}

fn checked_index(index: i64, len: usize) -> RenderResult<usize> {
    if index < 0 || index as usize >= len {
        Err(RuntimeError::IndexOutOfRange { index, len })
    } else {
        Ok(index as usize)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Number(-1.5).truthy());
        assert!(!s("").truthy());
        assert!(s("x").truthy());
        assert!(!Value::array(Vec::<Value>::new()).truthy());
        assert!(Value::array(vec![1]).truthy());
    }

    #[test]
    fn null_renders_empty() {
        assert_eq!(Value::Null.to_text(None), Ok(String::new()));
    }

    #[test]
    fn bool_formats() {
        assert_eq!(Value::Bool(true).to_text(None), Ok("True".into()));
        assert_eq!(Value::Bool(false).to_text(None), Ok("False".into()));
        assert_eq!(Value::Bool(true).to_text(Some("yes/no")), Ok("yes".into()));
        assert_eq!(Value::Bool(false).to_text(Some("yes/no")), Ok("no".into()));
        assert!(Value::Bool(true).to_text(Some("broken")).is_err());
    }

    #[test]
    fn number_formats() {
        assert_eq!(Value::Number(20.0).to_text(None), Ok("20".into()));
        assert_eq!(Value::Number(0.5).to_text(None), Ok("0.5".into()));
        assert_eq!(Value::Number(1.5).to_text(Some("F2")), Ok("1.50".into()));
        assert_eq!(Value::Number(1.5).to_text(Some("0.00")), Ok("1.50".into()));
        assert_eq!(Value::Number(1.5).to_text(Some("0.0#")), Ok("1.5".into()));
        assert_eq!(Value::Number(2.0).to_text(Some("#.##")), Ok("2".into()));
        assert!(Value::Number(1.0).to_text(Some("Q")).is_err());
    }

    #[test]
    fn string_formats() {
        assert_eq!(s("Ab").to_text(Some("upper")), Ok("AB".into()));
        assert_eq!(s("Ab").to_text(Some("lower")), Ok("ab".into()));
        assert_eq!(s(" x ").to_text(Some("trim")), Ok("x".into()));
        // Unknown formats are identity on strings.
        assert_eq!(s("Ab").to_text(Some("rot13")), Ok("Ab".into()));
    }

    #[test]
    fn compound_values_have_no_text_form() {
        assert_eq!(
            Value::array(vec![1, 2]).to_text(None),
            Err(RuntimeError::NotStringifiable("array")),
        );
        assert_eq!(
            Value::object(Dict::new()).to_text(None),
            Err(RuntimeError::NotStringifiable("object")),
        );
    }

    #[test]
    fn object_property() {
        let mut dict = Dict::new();
        dict.insert("name", "Andrew");
        let obj = Value::object(dict);
        assert_eq!(obj.property("name"), Ok(s("Andrew")));
        assert_eq!(
            obj.property("nope"),
            Err(RuntimeError::CannotAccessProperty {
                name: "nope".into(),
                kind: "object",
            }),
        );
    }

    #[test]
    fn host_property() {
        let host = Value::from(HostObject::new(|name| {
            (name == "model").then(|| Value::from("gpt-4"))
        }));
        assert_eq!(host.property("model"), Ok(s("gpt-4")));
        assert!(host.property("Model").is_err());

        let folded = Value::from(HostObject::with_lowercase_keys(|name| {
            (name == "model").then(|| Value::from("gpt-4"))
        }));
        assert_eq!(folded.property("Model"), Ok(s("gpt-4")));
    }

    #[test]
    fn snapshot_host() {
        let mut dict = Dict::new();
        dict.insert("temperature", 0.2);
        let host = Value::from(HostObject::snapshot(dict));
        assert_eq!(host.property("temperature"), Ok(Value::Number(0.2)));
    }

    #[test]
    fn array_index() {
        let arr = Value::array(vec!["a", "b"]);
        assert_eq!(arr.index(&Value::Number(1.0)), Ok(s("b")));
        assert_eq!(
            arr.index(&Value::Number(2.0)),
            Err(RuntimeError::IndexOutOfRange { index: 2, len: 2 }),
        );
        assert_eq!(
            arr.index(&Value::Number(0.5)),
            Err(RuntimeError::IndexNotInteger("0.5".into())),
        );
    }

    #[test]
    fn string_index() {
        assert_eq!(s("héj").index(&Value::Number(1.0)), Ok(s("é")));
    }

    #[test]
    fn object_index_by_text() {
        let dict: Dict = [("answer", 42)].into_iter().collect();
        let obj = Value::from(dict);
        assert_eq!(obj.index(&s("answer")), Ok(Value::Number(42.0)));
    }

    #[test]
    fn indexing_unsupported() {
        assert_eq!(
            Value::Number(1.0).index(&Value::Number(0.0)),
            Err(RuntimeError::IndexingNotSupported("number")),
        );
    }

    #[test]
    fn unary_ops() {
        assert_eq!(Value::Number(2.0).unary(UnaryOp::Negate), Ok(Value::Number(-2.0)));
        assert_eq!(Value::Number(2.0).unary(UnaryOp::Plus), Ok(Value::Number(2.0)));
        assert_eq!(s("").unary(UnaryOp::Not), Ok(Value::Bool(true)));
        assert!(s("x").unary(UnaryOp::Negate).is_err());
    }

    #[test]
    fn addition() {
        assert_eq!(
            Value::Number(1.0).binary(BinaryOp::Add, &Value::Number(2.0)),
            Ok(Value::Number(3.0)),
        );
        assert_eq!(
            s("n = ").binary(BinaryOp::Add, &Value::Number(7.0)),
            Ok(s("n = 7")),
        );
        assert_eq!(
            Value::Number(7.0).binary(BinaryOp::Add, &s("!")),
            Ok(s("7!")),
        );
        assert_eq!(
            Value::array(vec![1]).binary(BinaryOp::Add, &Value::array(vec![2])),
            Ok(Value::array(vec![1, 2])),
        );
    }

    #[test]
    fn dict_merge_right_wins() {
        let a: Dict = [("x", 1), ("y", 2)].into_iter().collect();
        let b: Dict = [("y", 3)].into_iter().collect();
        let merged = Value::from(a).binary(BinaryOp::Add, &Value::from(b)).unwrap();
        assert_eq!(merged.property("x"), Ok(Value::Number(1.0)));
        assert_eq!(merged.property("y"), Ok(Value::Number(3.0)));
    }

    #[test]
    fn arithmetic_is_numeric_only() {
        assert!(s("a").binary(BinaryOp::Sub, &s("b")).is_err());
        assert_eq!(
            Value::Number(7.0).binary(BinaryOp::Rem, &Value::Number(4.0)),
            Ok(Value::Number(3.0)),
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            Value::Number(1.0).binary(BinaryOp::Lt, &Value::Number(2.0)),
            Ok(Value::Bool(true)),
        );
        assert_eq!(s("abc").binary(BinaryOp::Lt, &s("abd")), Ok(Value::Bool(true)));
        assert!(s("a").binary(BinaryOp::Lt, &Value::Number(1.0)).is_err());
    }

    #[test]
    fn structural_equality() {
        assert_eq!(
            Value::array(vec!["a"]).binary(BinaryOp::Eq, &Value::array(vec!["a"])),
            Ok(Value::Bool(true)),
        );
        assert_eq!(
            s("1").binary(BinaryOp::Eq, &Value::Number(1.0)),
            Ok(Value::Bool(false)),
        );
    }

    #[test]
    fn logic_projects_to_bool() {
        assert_eq!(
            s("x").binary(BinaryOp::And, &Value::Number(0.0)),
            Ok(Value::Bool(false)),
        );
        assert_eq!(
            Value::Null.binary(BinaryOp::Or, &s("x")),
            Ok(Value::Bool(true)),
        );
    }

    #[test]
    fn lengths() {
        assert_eq!(s("héj").length(), Ok(3));
        assert_eq!(Value::array(vec![1, 2]).length(), Ok(2));
        assert!(Value::Number(1.0).length().is_err());
    }

    #[test]
    fn iteration() {
        assert_eq!(
            Value::array(vec![1, 2]).iterate(),
            Ok(vec![Value::Number(1.0), Value::Number(2.0)]),
        );
        let dict: Dict = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(
            Value::from(dict).iterate(),
            Ok(vec![Value::Number(1.0), Value::Number(2.0)]),
        );
        assert_eq!(
            s("abc").iterate(),
            Err(RuntimeError::NotIterable("string")),
        );
    }

    #[test]
    fn from_json() {
        let json = serde_json::json!({"name": "Andrew", "tags": ["a", "b"], "age": 20});
        let value = Value::from(json);
        assert_eq!(value.property("name"), Ok(s("Andrew")));
        assert_eq!(value.property("age"), Ok(Value::Number(20.0)));
        assert_eq!(
            value.property("tags").unwrap().index(&Value::Number(1.0)),
            Ok(s("b")),
        );
    }
}
