//! # Trellis Common Library
//!
//! Shared code for the Trellis view-composition crates including:
//! - Composition configuration loading
//! - Lifecycle event types (CompositionEvent) and the EventBus
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use config::{CompositionConfig, ConcurrencyPolicy};
pub use error::{Error, Result};
pub use events::{CompositionEvent, CompositionStage, EventBus};
