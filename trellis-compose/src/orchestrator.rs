//! Composition orchestrator
//!
//! Drives one compose call through a forward-only state machine:
//!
//! ```text
//! RAW → NORMALIZED → MODEL_RESOLVED → STRATEGY_RESOLVED → VIEW_RESOLVED
//!     → BOUND → TRANSITIONED → ACTIVATED → DONE
//! ```
//!
//! Each arrow is one step. A step runs only once the previous step's result is
//! available, and a failing step halts the call: later steps, including
//! `after_compose`, never run and the container keeps its previous content.
//!
//! Paths through the machine:
//! - `view` explicitly cleared: nothing happens at all
//! - no model, no view: straight to binding with no content (empties the container)
//! - no model, view given: the view is located directly in its area (default
//!   area when unset), binding preserves the inherited context, no strategy
//! - model given: model resolved (constructors instantiated), strategy
//!   resolved, strategy produces the view
//!
//! Overlapping calls against one container follow the configured
//! [`ConcurrencyPolicy`].

use crate::activation::ActivationController;
use crate::binding::BindingContext;
use crate::collaborators::{Binder, Module, ModuleLoader, ViewLocator};
use crate::error::{CompositionError, Result};
use crate::settings::{CompositionSettings, Reference, SettingsResolver, ViewSetting};
use crate::strategy::{DefaultStrategy, Strategy};
use crate::transition::{Transition, TransitionEngine};
use crate::value::{Value, ValueAccessor};
use crate::view::{Container, ViewNode};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use trellis_common::{
    CompositionConfig, CompositionEvent, CompositionStage, ConcurrencyPolicy, EventBus,
};
use uuid::Uuid;

/// External collaborators a composer delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub loader: Arc<dyn ModuleLoader>,
    pub locator: Arc<dyn ViewLocator>,
    pub binder: Arc<dyn Binder>,
}

/// Result of a compose call that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionOutcome {
    /// `view` was explicitly cleared; the container was not touched
    Skipped,
    /// The pipeline ran to completion
    Composed {
        /// Content now in the container (`None`: container emptied)
        view: Option<ViewNode>,
        /// Whether the model's activation hook ran
        activated: bool,
    },
}

/// The composition engine
pub struct Composer {
    config: CompositionConfig,
    resolver: SettingsResolver,
    activation: ActivationController,
    transitions: TransitionEngine,
    default_strategy: Arc<dyn Strategy>,
    loader: Arc<dyn ModuleLoader>,
    locator: Arc<dyn ViewLocator>,
    binder: Arc<dyn Binder>,
    events: Option<EventBus>,
    guard: ContainerGuard,
}

impl Composer {
    /// Build a composer from configuration and collaborators
    ///
    /// The configuration is captured here; later changes to the caller's copy
    /// have no effect on this composer.
    pub fn new(config: CompositionConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            loader,
            locator,
            binder,
        } = collaborators;

        let transitions = TransitionEngine::new(loader.clone(), config.transition_namespace.clone())
            .with_timeout(config.transition_timeout_ms.map(Duration::from_millis));

        Self {
            resolver: SettingsResolver::new(config.view_extension.clone()),
            activation: ActivationController::new(config.activate_during_composition),
            transitions,
            default_strategy: Arc::new(DefaultStrategy::new(locator.clone())),
            guard: ContainerGuard::new(config.concurrency),
            loader,
            locator,
            binder,
            events: None,
            config,
        }
    }

    /// Publish lifecycle events on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Use a binding-library specific accessor for observable instruction fields
    pub fn with_accessor(mut self, accessor: Arc<dyn ValueAccessor>) -> Self {
        self.resolver = self.resolver.with_accessor(accessor);
        self
    }

    /// Replace the transition used when an instruction names none
    pub fn with_default_transition(mut self, transition: Arc<dyn Transition>) -> Self {
        self.transitions = self.transitions.with_default(transition);
        self
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    pub fn settings_resolver(&self) -> &SettingsResolver {
        &self.resolver
    }

    pub fn activation(&self) -> &ActivationController {
        &self.activation
    }

    /// Compose a raw instruction into `container`
    ///
    /// `binding_context` is the binding scope of the element being composed
    /// into; it is attached to the normalized settings.
    pub async fn compose(
        &self,
        container: &Arc<dyn Container>,
        instruction: &Value,
        binding_context: Option<BindingContext>,
    ) -> Result<CompositionOutcome> {
        let mut run = Run::start(container, self.events.clone());

        let mut settings = match self.resolver.normalize(instruction) {
            Ok(settings) => settings,
            Err(e) => return Err(run.fail(e)),
        };
        settings.binding_context = binding_context;
        run.settings = settings;

        self.drive(run).await
    }

    /// Compose already-normalized settings into `container`
    pub async fn compose_settings(
        &self,
        container: &Arc<dyn Container>,
        settings: CompositionSettings,
    ) -> Result<CompositionOutcome> {
        let mut run = Run::start(container, self.events.clone());
        run.settings = settings;
        self.drive(run).await
    }

    async fn drive(&self, mut run: Run) -> Result<CompositionOutcome> {
        run.enter(CompositionStage::Normalized);

        if run.settings.view == ViewSetting::Cleared {
            debug!(
                "Composition {} skipped: view explicitly cleared",
                run.id
            );
            run.emit(CompositionEvent::CompositionSkipped {
                composition_id: run.id,
                container_id: run.container_id,
            });
            return Ok(CompositionOutcome::Skipped);
        }

        let _lease = match self.guard.acquire(run.container_id).await {
            Ok(lease) => lease,
            Err(e) => return Err(run.fail(e)),
        };

        let mut stage = CompositionStage::Normalized;
        loop {
            let next = match stage {
                CompositionStage::Raw => Ok(CompositionStage::Normalized),
                CompositionStage::Normalized => self.resolve_model(&mut run).await,
                CompositionStage::ModelResolved => self.resolve_strategy(&mut run).await,
                CompositionStage::StrategyResolved => self.execute_strategy(&mut run).await,
                CompositionStage::ViewResolved => self.bind(&mut run),
                CompositionStage::Bound => self.switch_content(&mut run).await,
                CompositionStage::Transitioned => self.fire_lifecycle(&mut run),
                CompositionStage::Activated => self.finish(&mut run),
                CompositionStage::Done => break,
            };

            match next {
                Ok(next) => {
                    run.enter(next);
                    stage = next;
                }
                Err(e) => return Err(run.fail(e)),
            }
        }

        info!(
            "Composition {} complete in container {} (view: {})",
            run.id,
            run.container_id,
            run.view.as_ref().map(|v| v.view_id()).unwrap_or("<none>")
        );
        run.emit(CompositionEvent::CompositionCompleted {
            composition_id: run.id,
            container_id: run.container_id,
            timestamp: chrono::Utc::now(),
        });

        Ok(CompositionOutcome::Composed {
            view: run.view,
            activated: run.activated,
        })
    }

    /// NORMALIZED → MODEL_RESOLVED, or → VIEW_RESOLVED when there is no model
    async fn resolve_model(&self, run: &mut Run) -> Result<CompositionStage> {
        match run.settings.model.take() {
            Some(Reference::Id(id)) => {
                let module = self.loader.acquire(&id).await.map_err(|e| match e {
                    CompositionError::ModuleNotFound { .. } => e,
                    other => CompositionError::ModuleNotFound {
                        id: id.clone(),
                        reason: other.to_string(),
                    },
                })?;

                let model = match module {
                    Module::Constructor(constructor) => {
                        debug!("Instantiating model {}", id);
                        run.settings.model = Some(Reference::Id(id.clone()));
                        constructor.construct(&run.container, &run.settings)?
                    }
                    Module::Instance(model) => model,
                    other => {
                        return Err(CompositionError::UnexpectedModule {
                            id,
                            expected: "model",
                            found: other.kind(),
                        })
                    }
                };

                run.settings.model = Some(Reference::Resolved(model));
                Ok(CompositionStage::ModelResolved)
            }
            Some(resolved) => {
                run.settings.model = Some(resolved);
                Ok(CompositionStage::ModelResolved)
            }
            None => {
                let ViewSetting::Ref(view) = &run.settings.view else {
                    // Nothing to compose: bind and transition with no content
                    return Ok(CompositionStage::ViewResolved);
                };

                let area = run
                    .settings
                    .area
                    .get_or_insert_with(|| self.config.default_area.clone())
                    .clone();
                run.settings.preserve_context = true;

                debug!("Locating view {} in area {}", view, area);
                let node = self
                    .locator
                    .locate_view(view, Some(&area))
                    .await
                    .map_err(|e| e.into_view_not_found(view.to_string()))?;
                run.view = Some(node);
                Ok(CompositionStage::ViewResolved)
            }
        }
    }

    /// MODEL_RESOLVED → STRATEGY_RESOLVED
    async fn resolve_strategy(&self, run: &mut Run) -> Result<CompositionStage> {
        let strategy = match run.settings.strategy.take() {
            None => self.default_strategy.clone(),
            Some(Reference::Resolved(strategy)) => strategy,
            Some(Reference::Id(id)) => match self.loader.acquire(&id).await {
                Ok(Module::Strategy(strategy)) => strategy,
                Ok(other) => {
                    return Err(CompositionError::UnexpectedModule {
                        id,
                        expected: "strategy",
                        found: other.kind(),
                    })
                }
                Err(e) => {
                    return Err(CompositionError::StrategyNotFound {
                        id,
                        reason: e.to_string(),
                    })
                }
            },
        };

        run.settings.strategy = Some(Reference::Resolved(strategy));
        Ok(CompositionStage::StrategyResolved)
    }

    /// STRATEGY_RESOLVED → VIEW_RESOLVED
    async fn execute_strategy(&self, run: &mut Run) -> Result<CompositionStage> {
        let strategy = run
            .settings
            .strategy
            .as_ref()
            .and_then(Reference::resolved)
            .cloned()
            .unwrap_or_else(|| self.default_strategy.clone());

        debug!("Executing {} strategy", strategy.name());
        let view = strategy.locate(&run.settings).await?;
        run.view = Some(view);
        Ok(CompositionStage::ViewResolved)
    }

    /// VIEW_RESOLVED → BOUND
    fn bind(&self, run: &mut Run) -> Result<CompositionStage> {
        if let Some(hook) = &run.settings.before_bind {
            hook.call(run.container.as_ref(), run.view.as_ref(), &run.settings);
        }

        if let Some(view) = &run.view {
            let model = run.settings.model_instance();
            match (&run.settings.binding_context, run.settings.preserve_context) {
                (Some(context), true) => self.binder.bind_context(context, view, model),
                // No model binds an empty context
                _ => self.binder.bind(model, view),
            }
        }

        Ok(CompositionStage::Bound)
    }

    /// BOUND → TRANSITIONED
    async fn switch_content(&self, run: &mut Run) -> Result<CompositionStage> {
        self.transitions
            .execute(run.container.as_ref(), run.view.as_ref(), &mut run.settings)
            .await?;
        Ok(CompositionStage::Transitioned)
    }

    /// TRANSITIONED → ACTIVATED
    fn fire_lifecycle(&self, run: &mut Run) -> Result<CompositionStage> {
        if let (Some(view), Some(model)) = (&run.view, run.settings.model_instance()) {
            if self.activation.should_activate(model.as_ref(), &run.settings) {
                debug!("Composition activating {}", model.module_id());
                model.activate();
                run.activated = true;
            }

            if model.observes_view_attached() {
                model.view_attached(view);
            }
        }

        Ok(CompositionStage::Activated)
    }

    /// ACTIVATED → DONE
    fn finish(&self, run: &mut Run) -> Result<CompositionStage> {
        if let Some(hook) = &run.settings.after_compose {
            hook.call(run.container.as_ref(), run.view.as_ref(), &run.settings);
        }
        Ok(CompositionStage::Done)
    }
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("config", &self.config)
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

/// State of one compose call
struct Run {
    id: Uuid,
    container: Arc<dyn Container>,
    container_id: Uuid,
    settings: CompositionSettings,
    view: Option<ViewNode>,
    activated: bool,
    stage: CompositionStage,
    events: Option<EventBus>,
}

impl Run {
    fn start(container: &Arc<dyn Container>, events: Option<EventBus>) -> Self {
        let run = Self {
            id: Uuid::new_v4(),
            container: container.clone(),
            container_id: container.id(),
            settings: CompositionSettings::default(),
            view: None,
            activated: false,
            stage: CompositionStage::Raw,
            events,
        };

        debug!(
            "Composition {} started in container {}",
            run.id, run.container_id
        );
        run.emit(CompositionEvent::CompositionStarted {
            composition_id: run.id,
            container_id: run.container_id,
            timestamp: chrono::Utc::now(),
        });
        run.emit(CompositionEvent::StageEntered {
            composition_id: run.id,
            container_id: run.container_id,
            stage: CompositionStage::Raw,
        });
        run
    }

    fn enter(&mut self, stage: CompositionStage) {
        debug!("Composition {} entered {}", self.id, stage);
        self.stage = stage;
        self.emit(CompositionEvent::StageEntered {
            composition_id: self.id,
            container_id: self.container_id,
            stage,
        });
    }

    fn fail(&self, error: CompositionError) -> CompositionError {
        warn!(
            "Composition {} halted after {}: {}",
            self.id, self.stage, error
        );
        self.emit(CompositionEvent::CompositionFailed {
            composition_id: self.id,
            container_id: self.container_id,
            stage: self.stage,
            error: error.to_string(),
        });
        error
    }

    fn emit(&self, event: CompositionEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }
}

type LockTable = Arc<StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>>;

/// Per-container admission control for overlapping compose calls
struct ContainerGuard {
    policy: ConcurrencyPolicy,
    locks: LockTable,
}

/// Held for the duration of one compose call
struct ContainerLease {
    container: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<Mutex<()>>,
    locks: LockTable,
}

impl ContainerGuard {
    fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            policy,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    async fn acquire(&self, container: Uuid) -> Result<Option<ContainerLease>> {
        if self.policy == ConcurrencyPolicy::Unguarded {
            return Ok(None);
        }

        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries left behind by cancelled waiters: no lease, nobody waiting
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(container).or_default().clone()
        };

        let guard = match self.policy {
            ConcurrencyPolicy::Reject => lock
                .clone()
                .try_lock_owned()
                .map_err(|_| CompositionError::ContainerBusy { container })?,
            _ => {
                debug!("Waiting for container {}", container);
                lock.clone().lock_owned().await
            }
        };

        Ok(Some(ContainerLease {
            container,
            guard: Some(guard),
            lock,
            locks: self.locks.clone(),
        }))
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the table and this lease still reference the lock
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.container);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reject_policy_refuses_second_lease() {
        let guard = ContainerGuard::new(ConcurrencyPolicy::Reject);
        let container = Uuid::new_v4();

        let first = guard.acquire(container).await.unwrap();
        assert!(first.is_some());
        assert!(matches!(
            guard.acquire(container).await,
            Err(CompositionError::ContainerBusy { .. })
        ));

        // Other containers are unaffected
        assert!(guard.acquire(Uuid::new_v4()).await.unwrap().is_some());

        drop(first);
        assert!(guard.acquire(container).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lease_table_is_cleaned_up() {
        let guard = ContainerGuard::new(ConcurrencyPolicy::Serialize);
        let container = Uuid::new_v4();

        let lease = guard.acquire(container).await.unwrap();
        assert_eq!(guard.locks.lock().unwrap().len(), 1);
        drop(lease);
        assert!(guard.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_entry_is_swept() {
        let guard = ContainerGuard::new(ConcurrencyPolicy::Serialize);
        let container = Uuid::new_v4();

        let lease = guard.acquire(container).await.unwrap();
        let mut waiter = Box::pin(guard.acquire(container));
        assert!(futures::poll!(&mut waiter).is_pending());

        // Holder leaves while the waiter still references the lock, then the
        // waiter is cancelled: the entry outlives both
        drop(lease);
        drop(waiter);
        assert_eq!(guard.locks.lock().unwrap().len(), 1);

        let other = guard.acquire(Uuid::new_v4()).await.unwrap();
        {
            let locks = guard.locks.lock().unwrap();
            assert_eq!(locks.len(), 1);
            assert!(!locks.contains_key(&container));
        }
        drop(other);
        assert!(guard.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unguarded_policy_hands_out_no_lease() {
        let guard = ContainerGuard::new(ConcurrencyPolicy::Unguarded);
        let container = Uuid::new_v4();
        assert!(guard.acquire(container).await.unwrap().is_none());
        assert!(guard.acquire(container).await.unwrap().is_none());
    }
}
