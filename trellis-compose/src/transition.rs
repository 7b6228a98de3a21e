//! Transition orchestration
//!
//! Transitions swap a container's content and report completion
//! asynchronously. Concrete transitions are pluggable: the settings either
//! carry one directly, name one (resolved through the module loader at
//! `<transition_namespace><name>`), or leave it unset for the default swap.
//!
//! The default transition mutates the container synchronously but still
//! yields before reporting completion, so callers see the same async
//! contract whichever transition is plugged in.

use crate::collaborators::{Module, ModuleLoader};
use crate::error::{CompositionError, Result};
use crate::settings::{CompositionSettings, Reference};
use crate::view::{Container, ViewNode};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Transition contract
#[async_trait]
pub trait Transition: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        "custom"
    }

    /// Swap the container's content for `content` (`None` empties it)
    async fn run(
        &self,
        container: &dyn Container,
        content: Option<&ViewNode>,
        settings: &CompositionSettings,
    ) -> Result<()>;
}

/// Immediate swap: empty on `None`, otherwise replace all children with the node
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransition;

#[async_trait]
impl Transition for DefaultTransition {
    fn name(&self) -> &str {
        "default"
    }

    async fn run(
        &self,
        container: &dyn Container,
        content: Option<&ViewNode>,
        _settings: &CompositionSettings,
    ) -> Result<()> {
        match content {
            None => container.empty(),
            Some(node) => container.set_children(vec![node.clone()]),
        }
        tokio::task::yield_now().await;
        Ok(())
    }
}

/// Module identifier a transition named `name` is loaded under
pub fn transition_module_id(namespace: &str, name: &str) -> String {
    format!("{}{}", namespace, name)
}

/// Resolves and runs the transition for a composition
pub struct TransitionEngine {
    loader: Arc<dyn ModuleLoader>,
    namespace: String,
    default: Arc<dyn Transition>,
    timeout: Option<Duration>,
}

impl TransitionEngine {
    /// Engine resolving named transitions under `namespace`
    pub fn new(loader: Arc<dyn ModuleLoader>, namespace: impl Into<String>) -> Self {
        Self {
            loader,
            namespace: namespace.into(),
            default: Arc::new(DefaultTransition),
            timeout: None,
        }
    }

    /// Replace the transition used when settings name none
    pub fn with_default(mut self, transition: Arc<dyn Transition>) -> Self {
        self.default = transition;
        self
    }

    /// Fail transitions that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Module identifier for a named transition
    pub fn module_id(&self, name: &str) -> String {
        transition_module_id(&self.namespace, name)
    }

    /// Resolve `settings.transition` in place and return it
    pub async fn resolve(&self, settings: &mut CompositionSettings) -> Result<Arc<dyn Transition>> {
        let transition = match settings.transition.take() {
            None => self.default.clone(),
            Some(Reference::Resolved(transition)) => transition,
            Some(Reference::Id(name)) => {
                let id = self.module_id(&name);
                debug!("Resolving transition '{}' as {}", name, id);
                match self.loader.acquire(&id).await {
                    Ok(Module::Transition(transition)) => transition,
                    Ok(other) => {
                        return Err(CompositionError::UnexpectedModule {
                            id,
                            expected: "transition",
                            found: other.kind(),
                        })
                    }
                    Err(e) => {
                        return Err(CompositionError::TransitionFailed {
                            transition: name,
                            reason: e.to_string(),
                        })
                    }
                }
            }
        };

        settings.transition = Some(Reference::Resolved(transition.clone()));
        Ok(transition)
    }

    /// Resolve the transition and run it, waiting for completion
    pub async fn execute(
        &self,
        container: &dyn Container,
        content: Option<&ViewNode>,
        settings: &mut CompositionSettings,
    ) -> Result<()> {
        let transition = self.resolve(settings).await?;
        let settings: &CompositionSettings = settings;
        let run = transition.run(container, content, settings);

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(CompositionError::TransitionFailed {
                        transition: transition.name().to_string(),
                        reason: format!("did not complete within {} ms", limit.as_millis()),
                    })
                }
            },
            None => run.await,
        };

        outcome.map_err(|e| match e {
            CompositionError::TransitionFailed { .. } => e,
            other => CompositionError::TransitionFailed {
                transition: transition.name().to_string(),
                reason: other.to_string(),
            },
        })
    }
}
