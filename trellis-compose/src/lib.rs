//! # Trellis Composition Engine (trellis-compose)
//!
//! Composes view models and views into host containers.
//!
//! **Purpose:** Take a declarative composition instruction, resolve a view model,
//! locate a matching view, bind the two, transition the result into a container
//! and fire the model's lifecycle hooks.
//!
//! **Architecture:** An explicit forward-only state machine (see
//! [`orchestrator::Composer`]) driving pluggable collaborators: a module loader,
//! a view locator, a binder and the container itself. Transitions and strategies
//! are pluggable by identifier through the module loader.

pub mod activation;
pub mod binding;
pub mod collaborators;
pub mod error;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod scene;
pub mod settings;
pub mod strategy;
pub mod transition;
pub mod value;
pub mod view;

pub use error::{CompositionError, Result};
pub use orchestrator::{CompositionOutcome, Composer};
pub use settings::{CompositionSettings, SettingsResolver};
