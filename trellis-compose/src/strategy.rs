//! View-resolution strategies
//!
//! A strategy maps settings to a concrete view. The default strategy asks the
//! view locator for the conventional view of the resolved model; custom
//! strategies are loaded by identifier and may look at anything in the
//! settings, including `view` and extra options-bag fields.

use crate::collaborators::ViewLocator;
use crate::error::{CompositionError, Result};
use crate::settings::CompositionSettings;
use crate::view::ViewNode;
use async_trait::async_trait;
use std::sync::Arc;

/// Strategy contract
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        "custom"
    }

    /// Produce the view to compose
    async fn locate(&self, settings: &CompositionSettings) -> Result<ViewNode>;
}

/// Locates the view conventionally paired with the resolved model
pub struct DefaultStrategy {
    locator: Arc<dyn ViewLocator>,
}

impl DefaultStrategy {
    pub fn new(locator: Arc<dyn ViewLocator>) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl Strategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    async fn locate(&self, settings: &CompositionSettings) -> Result<ViewNode> {
        let model = settings
            .model_instance()
            .ok_or_else(|| CompositionError::ViewNotFound {
                view: "<model view>".to_string(),
                reason: "default strategy needs a resolved model".to_string(),
            })?;
        self.locator
            .locate_view_for_object(model.as_ref())
            .await
            .map_err(|e| e.into_view_not_found(model.module_id()))
    }
}
