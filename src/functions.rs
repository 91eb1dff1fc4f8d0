//! The function set reachable through the context.
//!
//! Bare calls in a template (`@length(items)`, sugar for
//! `@ctx.length(items)`) dispatch here.  The set is a plain name-to-
//! closure map; `standard()` covers the built-ins and callers may add
//! their own.

use crate::error::{RenderResult, RuntimeError};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

type TemplateFunction = Rc<dyn Fn(&[Value]) -> RenderResult<Value>>;

/// Named functions callable on the context accessor.
#[derive(Clone, Default)]
pub struct FunctionSet {
    functions: HashMap<String, TemplateFunction>,
}

impl FunctionSet {
    /// An empty set.
    pub fn new() -> Self {
        FunctionSet::default()
    }

    /// The default set: `length`, `strcat` and `substr`.
    pub fn standard() -> Self {
        let mut set = FunctionSet::new();
        set.register("length", |args| {
            let [value] = expect_args::<1>("length", args)?;
            Ok(Value::from(value.length()?))
        });
        set.register("strcat", |args| {
            let mut out = String::new();
            for arg in args {
                out.push_str(&arg.to_text(None)?);
            }
            Ok(Value::Str(out))
        });
        set.register("substr", |args| {
            let [text, start, len] = expect_args::<3>("substr", args)?;
            let text = match text {
                Value::Str(s) => s,
                other => {
                    return Err(RuntimeError::MethodNotSupported {
                        name: "substr".to_string(),
                        kind: other.kind(),
                    })
                }
            };
            let start = whole_number(start)?;
            let len = whole_number(len)?;
            let available = text.chars().count();
            if start < 0 || start as usize > available {
                return Err(RuntimeError::IndexOutOfRange {
                    index: start,
                    len: available,
                });
            }
            if len < 0 {
                return Err(RuntimeError::IndexOutOfRange {
                    index: len,
                    len: available,
                });
            }
            Ok(Value::Str(
                text.chars()
                    .skip(start as usize)
                    .take(len as usize)
                    .collect(),
            ))
        });
        set
    }

    /// Register (or replace) a function under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> RenderResult<Value> + 'static,
    ) {
        self.functions.insert(name.into(), Rc::new(function));
    }

    pub fn call(&self, name: &str, args: &[Value]) -> RenderResult<Value> {
        match self.functions.get(name) {
            Some(function) => function(args),
            None => Err(RuntimeError::UnknownFunction(name.to_string())),
        }
    }
}

fn expect_args<'a, const N: usize>(
    name: &str,
    args: &'a [Value],
) -> RenderResult<&'a [Value; N]> {
    args.try_into().map_err(|_| RuntimeError::MethodNotSupported {
        name: format!("{} with {} arguments", name, args.len()),
        kind: "context",
    })
}

fn whole_number(value: &Value) -> RenderResult<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        other => Err(RuntimeError::IndexNotInteger(
            other
                .to_text(None)
                .unwrap_or_else(|_| other.kind().to_string()),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn length_of_array() {
        let set = FunctionSet::standard();
        let arr = Value::array(vec!["a", "b", "c"]);
        assert_eq!(set.call("length", &[arr]), Ok(Value::Number(3.0)));
    }

    #[test]
    fn strcat_stringifies_everything() {
        let set = FunctionSet::standard();
        assert_eq!(
            set.call(
                "strcat",
                &[Value::from("n="), Value::Number(7.0), Value::Bool(true)],
            ),
            Ok(Value::from("n=7True")),
        );
    }

    #[test]
    fn substr_counts_chars() {
        let set = FunctionSet::standard();
        assert_eq!(
            set.call(
                "substr",
                &[Value::from("héjsan"), Value::Number(1.0), Value::Number(3.0)],
            ),
            Ok(Value::from("éjs")),
        );
    }

    #[test]
    fn substr_clamps_length_but_not_start() {
        let set = FunctionSet::standard();
        assert_eq!(
            set.call(
                "substr",
                &[Value::from("abc"), Value::Number(2.0), Value::Number(10.0)],
            ),
            Ok(Value::from("c")),
        );
        assert!(set
            .call(
                "substr",
                &[Value::from("abc"), Value::Number(4.0), Value::Number(1.0)],
            )
            .is_err());
    }

    #[test]
    fn unknown_function() {
        let set = FunctionSet::standard();
        assert_eq!(
            set.call("frobnicate", &[]),
            Err(RuntimeError::UnknownFunction("frobnicate".into())),
        );
    }

    #[test]
    fn custom_registration() {
        let mut set = FunctionSet::standard();
        set.register("answer", |_| Ok(Value::Number(42.0)));
        assert_eq!(set.call("answer", &[]), Ok(Value::Number(42.0)));
    }
}
