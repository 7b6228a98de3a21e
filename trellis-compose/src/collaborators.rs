//! External collaborator contracts
//!
//! The composer owns none of module loading, view location or value binding.
//! It talks to them through these traits:
//! - [`ModuleLoader`]: asynchronously fetches a module by identifier
//! - [`ViewLocator`]: asynchronously maps a specifier or a model to a view
//! - [`Binder`]: synchronously attaches bindings between a view and a model
//!
//! In-memory implementations live in [`crate::memory`].

use crate::binding::BindingContext;
use crate::error::Result;
use crate::model::{ModelConstructor, SharedModel, ViewModel};
use crate::strategy::Strategy;
use crate::transition::Transition;
use crate::view::{ViewNode, ViewRef};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Value produced by the module loader
#[derive(Clone)]
pub enum Module {
    /// Constructor-shaped module; instantiated per composition
    Constructor(Arc<dyn ModelConstructor>),
    /// Ready-made model instance (singleton module)
    Instance(SharedModel),
    /// View-resolution strategy
    Strategy(Arc<dyn Strategy>),
    /// Content transition
    Transition(Arc<dyn Transition>),
}

impl Module {
    /// Short name of the module kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Module::Constructor(_) => "constructor",
            Module::Instance(_) => "model instance",
            Module::Strategy(_) => "strategy",
            Module::Transition(_) => "transition",
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Instance(model) => write!(f, "Instance({})", model.module_id()),
            Module::Strategy(strategy) => write!(f, "Strategy({})", strategy.name()),
            Module::Transition(transition) => write!(f, "Transition({})", transition.name()),
            Module::Constructor(_) => f.write_str("Constructor(..)"),
        }
    }
}

/// Module loader contract
///
/// Failures are returned, never panicked; the composer maps them onto the
/// error kind of the stage that asked.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Fetch the module registered under `id`
    async fn acquire(&self, id: &str) -> Result<Module>;
}

/// View locator contract
#[async_trait]
pub trait ViewLocator: Send + Sync {
    /// Locate a view by specifier within an area
    async fn locate_view(&self, view: &ViewRef, area: Option<&str>) -> Result<ViewNode>;

    /// Locate the conventional view for a model
    async fn locate_view_for_object(&self, model: &dyn ViewModel) -> Result<ViewNode>;
}

/// Binder contract
///
/// Binding is synchronous and has no result: its only effect is attaching
/// bindings to the view.
pub trait Binder: Send + Sync {
    /// Bind `view` to a fresh context rooted at `model` (`None` binds an empty context)
    fn bind(&self, model: Option<&SharedModel>, view: &ViewNode);

    /// Bind `view` inside an inherited context, with `child` as its sub-context
    fn bind_context(&self, parent: &BindingContext, view: &ViewNode, child: Option<&SharedModel>);
}
