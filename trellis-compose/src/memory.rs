//! In-memory collaborators
//!
//! Self-contained implementations of the collaborator contracts, used by the
//! host binary and by tests. Every collaborator can share a [`Journal`], which
//! records calls in the order they happen so a whole composition can be
//! checked end to end.

use crate::binding::BindingContext;
use crate::collaborators::{Binder, Module, ModuleLoader, ViewLocator};
use crate::error::{CompositionError, Result};
use crate::model::{ModelConstructor, SharedModel, ViewModel};
use crate::settings::CompositionSettings;
use crate::view::{Container, ViewNode, ViewRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Ordered, shared record of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(entry.into());
    }

    /// Snapshot of all entries so far
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Entries starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

/// Container holding its children in memory
#[derive(Debug, Default)]
pub struct MemoryContainer {
    id: Uuid,
    children: Mutex<Vec<ViewNode>>,
    mutations: Mutex<usize>,
    journal: Option<Journal>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ..Default::default()
        }
    }

    /// Container pre-filled with `children`
    pub fn with_children(children: Vec<ViewNode>) -> Self {
        Self {
            id: Uuid::new_v4(),
            children: Mutex::new(children),
            ..Default::default()
        }
    }

    /// Record mutations in `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Number of `empty`/`set_children` calls so far
    pub fn mutation_count(&self) -> usize {
        *self.mutations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self, entry: String) {
        *self.mutations.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }
}

impl Container for MemoryContainer {
    fn id(&self) -> Uuid {
        self.id
    }

    fn empty(&self) {
        self.children.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.touch("empty".to_string());
    }

    fn set_children(&self, nodes: Vec<ViewNode>) {
        let names: Vec<&str> = nodes.iter().map(|n| n.view_id()).collect();
        let entry = format!("set_children {}", names.join(","));
        *self.children.lock().unwrap_or_else(|e| e.into_inner()) = nodes;
        self.touch(entry);
    }

    fn children(&self) -> Vec<ViewNode> {
        self.children.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Module loader backed by a registration table
#[derive(Default)]
pub struct MemoryModuleLoader {
    modules: RwLock<HashMap<String, Module>>,
    acquired: Mutex<Vec<String>>,
    delay: Option<Duration>,
    journal: Option<Journal>,
}

impl MemoryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record acquisitions in `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Sleep before every acquisition, simulating a slow fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register `module` under `id`, replacing any previous registration
    pub fn register(&self, id: impl Into<String>, module: Module) {
        self.modules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into(), module);
    }

    /// Identifiers requested so far, in order
    pub fn acquired(&self) -> Vec<String> {
        self.acquired.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ModuleLoader for MemoryModuleLoader {
    async fn acquire(&self, id: &str) -> Result<Module> {
        self.acquired
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.to_string());
        if let Some(journal) = &self.journal {
            journal.record(format!("acquire {}", id));
        }

        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        self.modules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| CompositionError::ModuleNotFound {
                id: id.to_string(),
                reason: "no module registered".to_string(),
            })
    }
}

/// View locator backed by a table of view templates
///
/// Views are looked up by specifier, first inside the requested area and then
/// area-independently. A model's conventional view is its module id followed
/// by the view extension.
pub struct MemoryViewLocator {
    view_extension: String,
    views: RwLock<HashMap<String, String>>,
    area_views: RwLock<HashMap<(String, String), String>>,
    journal: Option<Journal>,
}

impl MemoryViewLocator {
    pub fn new(view_extension: impl Into<String>) -> Self {
        Self {
            view_extension: view_extension.into(),
            views: RwLock::new(HashMap::new()),
            area_views: RwLock::new(HashMap::new()),
            journal: None,
        }
    }

    /// Record lookups in `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Register a view template usable from any area
    pub fn register_view(&self, view_id: impl Into<String>, markup: impl Into<String>) {
        self.views
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(view_id.into(), markup.into());
    }

    /// Register a view template visible only within `area`
    pub fn register_area_view(
        &self,
        area: impl Into<String>,
        view_id: impl Into<String>,
        markup: impl Into<String>,
    ) {
        self.area_views
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((area.into(), view_id.into()), markup.into());
    }

    /// Conventional view id for a model
    pub fn view_id_for_model(&self, model: &dyn ViewModel) -> String {
        format!("{}{}", model.module_id(), self.view_extension)
    }

    fn instantiate(&self, view_id: &str, area: Option<&str>) -> Result<ViewNode> {
        if let Some(area) = area {
            let area_views = self.area_views.read().unwrap_or_else(|e| e.into_inner());
            if let Some(markup) = area_views.get(&(area.to_string(), view_id.to_string())) {
                return Ok(ViewNode::new(view_id, markup.clone()));
            }
        }

        self.views
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(view_id)
            .map(|markup| ViewNode::new(view_id, markup.clone()))
            .ok_or_else(|| CompositionError::ViewNotFound {
                view: view_id.to_string(),
                reason: match area {
                    Some(area) => format!("no view registered in area '{}'", area),
                    None => "no view registered".to_string(),
                },
            })
    }

    fn note(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }
}

#[async_trait]
impl ViewLocator for MemoryViewLocator {
    async fn locate_view(&self, view: &ViewRef, area: Option<&str>) -> Result<ViewNode> {
        self.note(format!("locate_view {} area={}", view, area.unwrap_or("-")));
        tokio::task::yield_now().await;
        match view {
            ViewRef::Node(node) => Ok(node.clone()),
            ViewRef::Specifier(spec) => self.instantiate(spec, area),
        }
    }

    async fn locate_view_for_object(&self, model: &dyn ViewModel) -> Result<ViewNode> {
        let view_id = self.view_id_for_model(model);
        self.note(format!("locate_view_for_object {}", model.module_id()));
        tokio::task::yield_now().await;
        self.instantiate(&view_id, None)
    }
}

/// One recorded binder call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindCall {
    /// Fresh context rooted at the model (`None`: empty context)
    Fresh { model: Option<String>, view: String },
    /// Inherited context with the model as sub-context
    Context {
        parent: Option<String>,
        child: Option<String>,
        view: String,
    },
}

/// Binder that records what it was asked to bind
#[derive(Debug, Default)]
pub struct RecordingBinder {
    calls: Mutex<Vec<BindCall>>,
    journal: Option<Journal>,
}

impl RecordingBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls in `journal` too
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Calls so far, in order
    pub fn calls(&self) -> Vec<BindCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, call: BindCall) {
        if let Some(journal) = &self.journal {
            let entry = match &call {
                BindCall::Fresh { model, view } => {
                    format!("bind {} -> {}", model.as_deref().unwrap_or("{}"), view)
                }
                BindCall::Context { child, view, .. } => {
                    format!("bind_context {} -> {}", child.as_deref().unwrap_or("-"), view)
                }
            };
            journal.record(entry);
        }
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

impl Binder for RecordingBinder {
    fn bind(&self, model: Option<&SharedModel>, view: &ViewNode) {
        self.push(BindCall::Fresh {
            model: model.map(|m| m.module_id().to_string()),
            view: view.view_id().to_string(),
        });
    }

    fn bind_context(&self, parent: &BindingContext, view: &ViewNode, child: Option<&SharedModel>) {
        self.push(BindCall::Context {
            parent: parent.data().map(|m| m.module_id().to_string()),
            child: child.map(|m| m.module_id().to_string()),
            view: view.view_id().to_string(),
        });
    }
}

/// View model that records its lifecycle hooks
#[derive(Debug)]
pub struct RecordingModel {
    module_id: String,
    can_activate: bool,
    observes_view_attached: bool,
    journal: Journal,
}

impl RecordingModel {
    pub fn new(module_id: impl Into<String>, journal: Journal) -> Self {
        Self {
            module_id: module_id.into(),
            can_activate: false,
            observes_view_attached: false,
            journal,
        }
    }

    /// Expose an activation hook
    pub fn activatable(mut self) -> Self {
        self.can_activate = true;
        self
    }

    /// Expose a view-attached hook
    pub fn observing_view_attached(mut self) -> Self {
        self.observes_view_attached = true;
        self
    }
}

impl ViewModel for RecordingModel {
    fn module_id(&self) -> &str {
        &self.module_id
    }

    fn can_activate(&self) -> bool {
        self.can_activate
    }

    fn activate(&self) {
        self.journal.record(format!("activate {}", self.module_id));
    }

    fn observes_view_attached(&self) -> bool {
        self.observes_view_attached
    }

    fn view_attached(&self, view: &ViewNode) {
        self.journal
            .record(format!("view_attached {} {}", self.module_id, view.view_id()));
    }
}

/// Constructor producing a fresh [`RecordingModel`] per composition
#[derive(Debug, Clone)]
pub struct RecordingConstructor {
    module_id: String,
    can_activate: bool,
    observes_view_attached: bool,
    journal: Journal,
}

impl RecordingConstructor {
    pub fn new(module_id: impl Into<String>, journal: Journal) -> Self {
        Self {
            module_id: module_id.into(),
            can_activate: false,
            observes_view_attached: false,
            journal,
        }
    }

    /// Instances expose an activation hook
    pub fn activatable(mut self) -> Self {
        self.can_activate = true;
        self
    }

    /// Instances expose a view-attached hook
    pub fn observing_view_attached(mut self) -> Self {
        self.observes_view_attached = true;
        self
    }
}

impl ModelConstructor for RecordingConstructor {
    fn construct(
        &self,
        container: &Arc<dyn Container>,
        settings: &CompositionSettings,
    ) -> Result<SharedModel> {
        let requested = settings
            .model
            .as_ref()
            .and_then(|m| m.id())
            .unwrap_or("-");
        self.journal.record(format!(
            "construct {} container={} requested={}",
            self.module_id,
            container.id(),
            requested
        ));

        Ok(Arc::new(RecordingModel {
            module_id: self.module_id.clone(),
            can_activate: self.can_activate,
            observes_view_attached: self.observes_view_attached,
            journal: self.journal.clone(),
        }))
    }
}
