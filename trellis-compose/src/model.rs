//! View model contracts
//!
//! A model is whatever the module loader hands back for a model identifier,
//! or whatever instance the instruction carried directly. The composer only
//! needs to know its module identity and whether it exposes the two lifecycle
//! hooks.

use crate::error::Result;
use crate::settings::CompositionSettings;
use crate::view::{Container, ViewNode};
use std::sync::Arc;

/// Shared handle to a live view model
pub type SharedModel = Arc<dyn ViewModel>;

/// Live view model instance
pub trait ViewModel: Send + Sync {
    /// Module identity (e.g. `viewmodels/shell`)
    ///
    /// Used by view locators to derive a view for the model, and by the
    /// settings resolver to recognize a bare model instruction.
    fn module_id(&self) -> &str;

    /// Whether the model has an activation hook
    fn can_activate(&self) -> bool {
        false
    }

    /// Activation hook, invoked when the model becomes a container's active content
    fn activate(&self) {}

    /// Whether the model wants to be told its view was attached
    fn observes_view_attached(&self) -> bool {
        false
    }

    /// Invoked with the new content once the transition has completed
    fn view_attached(&self, _view: &ViewNode) {}
}

/// Constructor-shaped module
///
/// When a model identifier resolves to a constructor, the composer builds a
/// fresh instance with the target container and the in-progress settings.
pub trait ModelConstructor: Send + Sync {
    /// Build a model instance for one composition
    fn construct(
        &self,
        container: &Arc<dyn Container>,
        settings: &CompositionSettings,
    ) -> Result<SharedModel>;
}
