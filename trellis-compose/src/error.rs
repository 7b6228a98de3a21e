//! Error types for trellis-compose
//!
//! The composer performs no local recovery: every collaborator failure is
//! returned to whoever called `compose`, and the pipeline stops at the step
//! where it happened.

use thiserror::Error;
use uuid::Uuid;

/// Composition pipeline errors
#[derive(Error, Debug)]
pub enum CompositionError {
    /// Module loader could not produce the requested module
    #[error("Module not found: {id} ({reason})")]
    ModuleNotFound { id: String, reason: String },

    /// View locator could not produce a view
    #[error("View not found: {view} ({reason})")]
    ViewNotFound { view: String, reason: String },

    /// Strategy identifier could not be loaded
    #[error("Strategy not found: {id} ({reason})")]
    StrategyNotFound { id: String, reason: String },

    /// Transition could not be loaded, rejected, or did not complete
    #[error("Transition '{transition}' failed: {reason}")]
    TransitionFailed { transition: String, reason: String },

    /// Options-bag field whose value cannot populate the canonical setting
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// Module resolved but is the wrong kind for the pipeline stage
    #[error("Module '{id}' is a {found}, expected a {expected}")]
    UnexpectedModule {
        id: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Container already composing under the `reject` concurrency policy
    #[error("Container {container} is busy composing")]
    ContainerBusy { container: Uuid },

    /// Model constructor refused to build an instance
    #[error("Model construction failed for '{id}': {reason}")]
    Construction { id: String, reason: String },

    /// Configuration error from trellis-common
    #[error(transparent)]
    Config(#[from] trellis_common::Error),
}

impl CompositionError {
    /// Report a view-locator rejection as `ViewNotFound` for `view`
    ///
    /// Locators commonly load view text through a module loader, so their
    /// failures can arrive as any kind.
    pub fn into_view_not_found(self, view: impl Into<String>) -> Self {
        match self {
            CompositionError::ViewNotFound { .. } => self,
            other => CompositionError::ViewNotFound {
                view: view.into(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience Result type using CompositionError
pub type Result<T> = std::result::Result<T, CompositionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_view_not_found() {
        let loader_error = CompositionError::ModuleNotFound {
            id: "text!views/footer.html".to_string(),
            reason: "404".to_string(),
        };
        match loader_error.into_view_not_found("views/footer.html") {
            CompositionError::ViewNotFound { view, reason } => {
                assert_eq!(view, "views/footer.html");
                assert!(reason.contains("text!views/footer.html"));
            }
            other => panic!("unexpected {:?}", other),
        }

        // Already the right kind: kept as the locator reported it
        let located = CompositionError::ViewNotFound {
            view: "footer.html".to_string(),
            reason: "no view registered".to_string(),
        };
        assert!(matches!(
            located.into_view_not_found("ignored"),
            CompositionError::ViewNotFound { view, .. } if view == "footer.html"
        ));
    }
}
