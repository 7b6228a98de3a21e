//! Instruction values
//!
//! A composition instruction arrives from the binding surface as a loosely
//! shaped value: a bare string, a model instance, or an options bag whose
//! fields may themselves be observables. [`Value`] is that shape.

use crate::model::SharedModel;
use crate::settings::CompositionSettings;
use crate::strategy::Strategy;
use crate::transition::Transition;
use crate::view::{Container, ViewNode};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Synchronous hook invoked at a fixed pipeline point
///
/// Receives the container, the view being composed (`None` when the
/// container is being emptied) and the settings driving the call.
#[derive(Clone)]
pub struct CompositionHook(
    Arc<dyn Fn(&dyn Container, Option<&ViewNode>, &CompositionSettings) + Send + Sync>,
);

impl CompositionHook {
    /// Wrap a closure as a hook
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn Container, Option<&ViewNode>, &CompositionSettings) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the hook
    pub fn call(&self, container: &dyn Container, view: Option<&ViewNode>, settings: &CompositionSettings) {
        (self.0)(container, view, settings)
    }
}

impl fmt::Debug for CompositionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompositionHook(..)")
    }
}

/// Reactive value owned by the binding library
pub trait Observable: Send + Sync {
    /// Current value, read without registering any dependency
    fn current(&self) -> Value;
}

/// "Current value of" accessor supplied by the binding library
///
/// Called once per field during normalization; the composer has no
/// dependency tracking of its own.
pub trait ValueAccessor: Send + Sync {
    /// Unwrap `value` if it is reactive, otherwise return it unchanged
    fn current_value(&self, value: &Value) -> Value;
}

/// Default accessor: reads [`Observable::current`], one level deep
#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapObservable;

impl ValueAccessor for UnwrapObservable {
    fn current_value(&self, value: &Value) -> Value {
        match value {
            Value::Observable(observable) => observable.current(),
            other => other.clone(),
        }
    }
}

/// Loosely shaped instruction value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Model(SharedModel),
    View(ViewNode),
    Strategy(Arc<dyn Strategy>),
    Transition(Arc<dyn Transition>),
    Hook(CompositionHook),
    Observable(Arc<dyn Observable>),
    Options(BTreeMap<String, Value>),
}

impl Value {
    /// Build an options bag from key/value pairs
    pub fn options<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Options(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Whether the value counts as set for boolean-ish settings
    ///
    /// Null, `false`, zero, NaN and the empty string are falsy; every other
    /// value, including empty lists and bags, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Model(_) => "model",
            Value::View(_) => "view",
            Value::Strategy(_) => "strategy",
            Value::Transition(_) => "transition",
            Value::Hook(_) => "hook",
            Value::Observable(_) => "observable",
            Value::Options(_) => "options",
        }
    }

    /// Convert plain JSON into an instruction value
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Options(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ViewNode> for Value {
    fn from(node: ViewNode) -> Self {
        Value::View(node)
    }
}

impl From<CompositionHook> for Value {
    fn from(hook: CompositionHook) -> Self {
        Value::Hook(hook)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Text(s) => write!(f, "Text({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Model(model) => write!(f, "Model({})", model.module_id()),
            Value::View(node) => write!(f, "View({})", node.view_id()),
            Value::Strategy(strategy) => write!(f, "Strategy({})", strategy.name()),
            Value::Transition(transition) => write!(f, "Transition({})", transition.name()),
            Value::Hook(_) => f.write_str("Hook(..)"),
            Value::Observable(_) => f.write_str("Observable(..)"),
            Value::Options(map) => f.debug_tuple("Options").field(map).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Cell(Mutex<Value>);

    impl Observable for Cell {
        fn current(&self) -> Value {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(Value::text("x").is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::Options(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_unwrap_observable_reads_current_value() {
        let cell = Arc::new(Cell(Mutex::new(Value::text("first"))));
        let value = Value::Observable(cell.clone());

        let accessor = UnwrapObservable;
        assert!(matches!(accessor.current_value(&value), Value::Text(s) if s == "first"));

        *cell.0.lock().unwrap() = Value::Bool(true);
        assert!(matches!(accessor.current_value(&value), Value::Bool(true)));

        // Plain values pass through untouched
        assert!(matches!(accessor.current_value(&Value::Number(2.0)), Value::Number(n) if n == 2.0));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({
            "model": "viewmodels/shell",
            "activate": false,
            "tags": ["a", 1],
            "area": null
        });
        let Value::Options(map) = Value::from_json(json) else {
            panic!("expected options bag");
        };
        assert!(matches!(&map["model"], Value::Text(s) if s == "viewmodels/shell"));
        assert!(matches!(map["activate"], Value::Bool(false)));
        assert!(matches!(&map["tags"], Value::List(items) if items.len() == 2));
        assert!(matches!(map["area"], Value::Null));
    }
}
