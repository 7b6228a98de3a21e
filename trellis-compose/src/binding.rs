//! Binding-surface integration
//!
//! The composer is exposed to declarative markup as the `update` handler of
//! a `compose` binding. The binding library hands the handler the element,
//! the bound value and the element's binding context; the handler normalizes
//! the value and composes it into the element.
//!
//! `compose` must also be usable on virtual (comment) elements, which the
//! host binding library only allows for bindings registered in
//! [`VirtualElements`].

use crate::error::Result;
use crate::model::SharedModel;
use crate::orchestrator::{CompositionOutcome, Composer};
use crate::value::Value;
use crate::view::Container;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Binding scope threaded through nested compositions
#[derive(Clone, Default)]
pub struct BindingContext {
    data: Option<SharedModel>,
    parent: Option<Arc<BindingContext>>,
}

impl BindingContext {
    /// Root context over `data`
    pub fn root(data: SharedModel) -> Self {
        Self {
            data: Some(data),
            parent: None,
        }
    }

    /// Child context whose parent is `self`
    pub fn extend(&self, data: Option<SharedModel>) -> Self {
        Self {
            data,
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Data at this level
    pub fn data(&self) -> Option<&SharedModel> {
        self.data.as_ref()
    }

    /// Enclosing context
    pub fn parent(&self) -> Option<&BindingContext> {
        self.parent.as_deref()
    }

    /// Number of enclosing contexts
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(ctx) = current {
            depth += 1;
            current = ctx.parent();
        }
        depth
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("data", &self.data.as_ref().map(|m| m.module_id().to_string()))
            .field("depth", &self.depth())
            .finish()
    }
}

/// Bindings permitted on virtual (comment) elements
#[derive(Debug, Default)]
pub struct VirtualElements {
    allowed: RwLock<BTreeSet<String>>,
}

impl VirtualElements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit `binding` on virtual elements
    pub fn allow(&self, binding: &str) {
        self.allowed
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(binding.to_string());
    }

    /// Whether `binding` may appear on virtual elements
    pub fn is_allowed(&self, binding: &str) -> bool {
        self.allowed
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(binding)
    }
}

/// The `compose` binding handler
#[derive(Clone)]
pub struct ComposeBinding {
    composer: Arc<Composer>,
}

impl ComposeBinding {
    /// Binding attribute name
    pub const NAME: &'static str = "compose";

    pub fn new(composer: Arc<Composer>) -> Self {
        Self { composer }
    }

    /// Create the handler and permit it on virtual elements
    pub fn register(composer: Arc<Composer>, virtual_elements: &VirtualElements) -> Self {
        virtual_elements.allow(Self::NAME);
        Self::new(composer)
    }

    /// `update` handler: compose the binding's current value into `element`
    pub async fn update(
        &self,
        element: &Arc<dyn Container>,
        value: &Value,
        binding_context: Option<BindingContext>,
    ) -> Result<CompositionOutcome> {
        self.composer.compose(element, value, binding_context).await
    }
}

impl fmt::Debug for ComposeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposeBinding").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ViewModel;

    struct Shell;

    impl ViewModel for Shell {
        fn module_id(&self) -> &str {
            "viewmodels/shell"
        }
    }

    #[test]
    fn test_context_chain() {
        let root = BindingContext::root(Arc::new(Shell));
        let child = root.extend(None);
        let grandchild = child.extend(Some(Arc::new(Shell)));

        assert_eq!(root.depth(), 0);
        assert_eq!(grandchild.depth(), 2);
        assert!(child.data().is_none());
        assert_eq!(
            grandchild.parent().and_then(|p| p.parent()).and_then(|r| r.data()).map(|m| m.module_id()),
            Some("viewmodels/shell")
        );
    }

    #[test]
    fn test_virtual_elements_registry() {
        let elements = VirtualElements::new();
        assert!(!elements.is_allowed("compose"));
        elements.allow("compose");
        assert!(elements.is_allowed("compose"));
        assert!(!elements.is_allowed("text"));
    }
}
