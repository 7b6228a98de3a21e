//! Composition settings and instruction normalization
//!
//! [`SettingsResolver::normalize`] turns any instruction shape into one
//! canonical [`CompositionSettings`] record:
//! 1. A string ending in the view extension becomes `{view}`; any other
//!    string becomes `{model}` (a module identifier resolved later)
//! 2. A model instance becomes `{model}`
//! 3. An options bag is copied field by field, unwrapping observables
//!
//! Normalization does no I/O; the result may still hold unresolved
//! identifiers for the model, strategy and transition.

use crate::binding::BindingContext;
use crate::error::{CompositionError, Result};
use crate::model::SharedModel;
use crate::strategy::Strategy;
use crate::transition::Transition;
use crate::value::{CompositionHook, UnwrapObservable, Value, ValueAccessor};
use crate::view::ViewRef;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Setting that is either a module identifier or the resolved thing itself
///
/// Identifiers are resolved exactly once, and the resolved value replaces the
/// identifier in place.
#[derive(Clone)]
pub enum Reference<T> {
    /// Module identifier awaiting resolution
    Id(String),
    /// Resolved value
    Resolved(T),
}

impl<T> Reference<T> {
    /// Identifier, if still unresolved
    pub fn id(&self) -> Option<&str> {
        match self {
            Reference::Id(id) => Some(id),
            Reference::Resolved(_) => None,
        }
    }

    /// Resolved value, if any
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Reference::Id(_) => None,
            Reference::Resolved(value) => Some(value),
        }
    }
}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Id(id) => write!(f, "Id({:?})", id),
            Reference::Resolved(_) => f.write_str("Resolved(..)"),
        }
    }
}

/// The `view` setting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewSetting {
    /// No `view` key at all
    #[default]
    Absent,
    /// `view` key present with a falsy value: compose nothing, touch nothing
    Cleared,
    /// View to locate
    Ref(ViewRef),
}

/// Canonical record driving one compose call
///
/// Created per call, mutated in place while the pipeline resolves it, then
/// dropped. Deliberately not `Clone`: a record is never reused across calls.
#[derive(Default)]
pub struct CompositionSettings {
    /// Model identifier or instance
    pub model: Option<Reference<SharedModel>>,
    /// View to compose
    pub view: ViewSetting,
    /// View-resolution strategy (default strategy when unset)
    pub strategy: Option<Reference<Arc<dyn Strategy>>>,
    /// Content transition (default transition when unset)
    pub transition: Option<Reference<Arc<dyn Transition>>>,
    /// Explicit activation override
    pub activate: Option<bool>,
    /// Bind inside the inherited binding context instead of a fresh one
    pub preserve_context: bool,
    /// View-locator area
    pub area: Option<String>,
    /// Binding scope of the element being composed into
    pub binding_context: Option<BindingContext>,
    /// Invoked right before binding
    pub before_bind: Option<CompositionHook>,
    /// Invoked once composition has finished
    pub after_compose: Option<CompositionHook>,
    /// Options-bag fields with no canonical meaning, kept for custom strategies and models
    pub extra: BTreeMap<String, Value>,
}

impl CompositionSettings {
    /// Settings composing a model identifier
    pub fn for_model_id(id: impl Into<String>) -> Self {
        Self {
            model: Some(Reference::Id(id.into())),
            ..Default::default()
        }
    }

    /// Settings composing a live model
    pub fn for_model(model: SharedModel) -> Self {
        Self {
            model: Some(Reference::Resolved(model)),
            ..Default::default()
        }
    }

    /// Settings composing a bare view
    pub fn for_view(view: ViewRef) -> Self {
        Self {
            view: ViewSetting::Ref(view),
            ..Default::default()
        }
    }

    /// Resolved model instance, if the model has been resolved
    pub fn model_instance(&self) -> Option<&SharedModel> {
        self.model.as_ref().and_then(Reference::resolved)
    }
}

impl fmt::Debug for CompositionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.model.as_ref().map(|m| match m {
            Reference::Id(id) => format!("Id({})", id),
            Reference::Resolved(model) => format!("Resolved({})", model.module_id()),
        });
        f.debug_struct("CompositionSettings")
            .field("model", &model)
            .field("view", &self.view)
            .field("strategy", &self.strategy)
            .field("transition", &self.transition)
            .field("activate", &self.activate)
            .field("preserve_context", &self.preserve_context)
            .field("area", &self.area)
            .field("binding_context", &self.binding_context.is_some())
            .field("before_bind", &self.before_bind.is_some())
            .field("after_compose", &self.after_compose.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}

/// Normalizes raw instructions into [`CompositionSettings`]
#[derive(Clone)]
pub struct SettingsResolver {
    view_extension: String,
    accessor: Arc<dyn ValueAccessor>,
}

impl SettingsResolver {
    /// Resolver recognizing `view_extension` as the view-file suffix
    pub fn new(view_extension: impl Into<String>) -> Self {
        Self {
            view_extension: view_extension.into(),
            accessor: Arc::new(UnwrapObservable),
        }
    }

    /// Use a binding-library specific accessor for observable fields
    pub fn with_accessor(mut self, accessor: Arc<dyn ValueAccessor>) -> Self {
        self.accessor = accessor;
        self
    }

    /// Configured view-file suffix
    pub fn view_extension(&self) -> &str {
        &self.view_extension
    }

    /// Whether a bare string names a view rather than a model
    pub fn is_view_specifier(&self, instruction: &str) -> bool {
        instruction.ends_with(&self.view_extension)
    }

    /// Normalize an instruction
    ///
    /// The top-level value is unwrapped first (an observable instruction
    /// composes its current value); null and other falsy scalars normalize to
    /// empty settings.
    pub fn normalize(&self, raw: &Value) -> Result<CompositionSettings> {
        let value = self.accessor.current_value(raw);

        match value {
            Value::Text(text) if !text.is_empty() => {
                if self.is_view_specifier(&text) {
                    Ok(CompositionSettings::for_view(ViewRef::Specifier(text)))
                } else {
                    Ok(CompositionSettings::for_model_id(text))
                }
            }
            Value::Model(model) => {
                debug!("Instruction is model instance {}", model.module_id());
                Ok(CompositionSettings::for_model(model))
            }
            Value::View(node) => Ok(CompositionSettings::for_view(ViewRef::Node(node))),
            Value::Options(fields) => {
                let mut settings = CompositionSettings::default();
                for (key, field) in &fields {
                    let plain = self.accessor.current_value(field);
                    apply_field(&mut settings, key, plain)?;
                }
                Ok(settings)
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Text(_) => {
                Ok(CompositionSettings::default())
            }
            other => Err(CompositionError::InvalidSetting {
                key: "instruction".to_string(),
                reason: format!("cannot compose a {}", other.kind()),
            }),
        }
    }
}

impl fmt::Debug for SettingsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsResolver")
            .field("view_extension", &self.view_extension)
            .finish_non_exhaustive()
    }
}

fn invalid(key: &str, value: &Value) -> CompositionError {
    CompositionError::InvalidSetting {
        key: key.to_string(),
        reason: format!("unexpected {} value", value.kind()),
    }
}

/// Copy one options-bag field into its canonical slot
fn apply_field(settings: &mut CompositionSettings, key: &str, value: Value) -> Result<()> {
    match key {
        "model" => {
            settings.model = match value {
                v if !v.is_truthy() => None,
                Value::Text(id) => Some(Reference::Id(id)),
                Value::Model(model) => Some(Reference::Resolved(model)),
                other => return Err(invalid(key, &other)),
            };
        }
        "view" => {
            settings.view = match value {
                v if !v.is_truthy() => ViewSetting::Cleared,
                Value::Text(spec) => ViewSetting::Ref(ViewRef::Specifier(spec)),
                Value::View(node) => ViewSetting::Ref(ViewRef::Node(node)),
                other => return Err(invalid(key, &other)),
            };
        }
        "strategy" => {
            settings.strategy = match value {
                v if !v.is_truthy() => None,
                Value::Text(id) => Some(Reference::Id(id)),
                Value::Strategy(strategy) => Some(Reference::Resolved(strategy)),
                other => return Err(invalid(key, &other)),
            };
        }
        "transition" => {
            settings.transition = match value {
                v if !v.is_truthy() => None,
                Value::Text(name) => Some(Reference::Id(name)),
                Value::Transition(transition) => Some(Reference::Resolved(transition)),
                other => return Err(invalid(key, &other)),
            };
        }
        "activate" => {
            settings.activate = match value {
                Value::Null => None,
                other => Some(other.is_truthy()),
            };
        }
        "preserveContext" | "preserve_context" => {
            settings.preserve_context = value.is_truthy();
        }
        "area" => {
            settings.area = match value {
                v if !v.is_truthy() => None,
                Value::Text(area) => Some(area),
                other => return Err(invalid(key, &other)),
            };
        }
        "beforeBind" | "before_bind" => {
            settings.before_bind = hook_field(key, value)?;
        }
        "afterCompose" | "after_compose" => {
            settings.after_compose = hook_field(key, value)?;
        }
        _ => {
            settings.extra.insert(key.to_string(), value);
        }
    }
    Ok(())
}

fn hook_field(key: &str, value: Value) -> Result<Option<CompositionHook>> {
    match value {
        v if !v.is_truthy() => Ok(None),
        Value::Hook(hook) => Ok(Some(hook)),
        other => Err(invalid(key, &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ViewModel;
    use crate::value::Observable;
    use std::sync::Mutex;

    struct Shell;

    impl ViewModel for Shell {
        fn module_id(&self) -> &str {
            "viewmodels/shell"
        }
    }

    struct Cell(Mutex<Value>);

    impl Observable for Cell {
        fn current(&self) -> Value {
            self.0.lock().unwrap().clone()
        }
    }

    fn resolver() -> SettingsResolver {
        SettingsResolver::new(".html")
    }

    #[test]
    fn test_view_extension_string_becomes_view() {
        for s in ["views/footer.html", "a.html", ".html"] {
            let settings = resolver().normalize(&Value::text(s)).unwrap();
            assert_eq!(settings.view, ViewSetting::Ref(ViewRef::Specifier(s.to_string())));
            assert!(settings.model.is_none());
        }
    }

    #[test]
    fn test_other_string_becomes_model_id() {
        for s in ["viewmodels/shell", "footer.htm", "html", "views/x.html.bak"] {
            let settings = resolver().normalize(&Value::text(s)).unwrap();
            assert_eq!(settings.model.as_ref().and_then(Reference::id), Some(s));
            assert_eq!(settings.view, ViewSetting::Absent);
        }
    }

    #[test]
    fn test_configured_extension_is_used() {
        let resolver = SettingsResolver::new(".view");
        assert!(resolver.is_view_specifier("footer.view"));
        let settings = resolver.normalize(&Value::text("footer.html")).unwrap();
        assert!(settings.model.is_some());
    }

    #[test]
    fn test_model_instance_becomes_model() {
        let settings = resolver().normalize(&Value::Model(Arc::new(Shell))).unwrap();
        assert_eq!(
            settings.model_instance().map(|m| m.module_id()),
            Some("viewmodels/shell")
        );
    }

    #[test]
    fn test_null_and_empty_normalize_to_empty_settings() {
        for raw in [Value::Null, Value::text(""), Value::Bool(false)] {
            let settings = resolver().normalize(&raw).unwrap();
            assert!(settings.model.is_none());
            assert_eq!(settings.view, ViewSetting::Absent);
        }
    }

    #[test]
    fn test_options_bag_unwraps_observables() {
        let model = Arc::new(Cell(Mutex::new(Value::text("viewmodels/detail"))));
        let activate = Arc::new(Cell(Mutex::new(Value::Bool(false))));
        let bag = Value::options([
            ("model", Value::Observable(model.clone())),
            ("activate", Value::Observable(activate)),
            ("area", Value::text("widgets")),
            ("preserveContext", Value::Bool(true)),
            ("title", Value::text("Details")),
        ]);

        let settings = resolver().normalize(&bag).unwrap();
        assert_eq!(
            settings.model.as_ref().and_then(Reference::id),
            Some("viewmodels/detail")
        );
        assert_eq!(settings.activate, Some(false));
        assert_eq!(settings.area.as_deref(), Some("widgets"));
        assert!(settings.preserve_context);
        assert!(matches!(&settings.extra["title"], Value::Text(s) if s == "Details"));

        // Values are read at call time, not captured
        *model.0.lock().unwrap() = Value::text("viewmodels/other");
        let settings = resolver().normalize(&bag).unwrap();
        assert_eq!(
            settings.model.as_ref().and_then(Reference::id),
            Some("viewmodels/other")
        );
    }

    #[test]
    fn test_observable_instruction_is_unwrapped() {
        let cell = Arc::new(Cell(Mutex::new(Value::text("views/footer.html"))));
        let settings = resolver().normalize(&Value::Observable(cell)).unwrap();
        assert!(matches!(settings.view, ViewSetting::Ref(_)));
    }

    #[test]
    fn test_falsy_view_is_cleared_not_absent() {
        for falsy in [Value::Bool(false), Value::Null, Value::text("")] {
            let settings = resolver().normalize(&Value::options([("view", falsy)])).unwrap();
            assert_eq!(settings.view, ViewSetting::Cleared);
        }
        let settings = resolver().normalize(&Value::options(Vec::<(String, Value)>::new())).unwrap();
        assert_eq!(settings.view, ViewSetting::Absent);
    }

    #[test]
    fn test_activate_null_is_unset() {
        let settings = resolver()
            .normalize(&Value::options([("activate", Value::Null)]))
            .unwrap();
        assert_eq!(settings.activate, None);
        let settings = resolver()
            .normalize(&Value::options([("activate", Value::Number(1.0))]))
            .unwrap();
        assert_eq!(settings.activate, Some(true));
    }

    #[test]
    fn test_snake_case_aliases() {
        let hook = CompositionHook::new(|_, _, _| {});
        let settings = resolver()
            .normalize(&Value::options([
                ("preserve_context", Value::Bool(true)),
                ("after_compose", Value::Hook(hook)),
            ]))
            .unwrap();
        assert!(settings.preserve_context);
        assert!(settings.after_compose.is_some());
    }

    #[test]
    fn test_mistyped_field_is_rejected() {
        let result = resolver().normalize(&Value::options([("model", Value::Number(3.0))]));
        assert!(matches!(
            result,
            Err(CompositionError::InvalidSetting { key, .. }) if key == "model"
        ));

        let result = resolver().normalize(&Value::options([("beforeBind", Value::text("x"))]));
        assert!(matches!(result, Err(CompositionError::InvalidSetting { .. })));
    }

    #[test]
    fn test_uncomposable_instruction_is_rejected() {
        let result = resolver().normalize(&Value::List(vec![]));
        assert!(matches!(result, Err(CompositionError::InvalidSetting { .. })));
    }
}
