//! Scene files for the host binary
//!
//! A scene describes, in TOML, everything the in-memory collaborators need to
//! serve a composition: view templates, model modules and named transitions.
//!
//! ```toml
//! [views]
//! "viewmodels/shell.html" = "<main>shell</main>"
//!
//! [area_views.partial]
//! "footer.html" = "<footer/>"
//!
//! [[models]]
//! id = "viewmodels/shell"
//! kind = "constructor"
//! activate = true
//! view_attached = true
//!
//! [[transitions]]
//! name = "fade"
//! ```

use crate::collaborators::Module;
use crate::error::Result;
use crate::memory::{
    Journal, MemoryModuleLoader, MemoryViewLocator, RecordingConstructor, RecordingModel,
};
use crate::settings::CompositionSettings;
use crate::transition::{transition_module_id, DefaultTransition, Transition};
use crate::value::Value;
use crate::view::{Container, ViewNode};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// How a model module is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Fresh instance per composition
    #[default]
    Constructor,
    /// One shared instance
    Instance,
}

/// Model module entry
#[derive(Debug, Clone, Deserialize)]
pub struct SceneModel {
    pub id: String,
    #[serde(default)]
    pub kind: ModelKind,
    /// Model exposes an activation hook
    #[serde(default)]
    pub activate: bool,
    /// Model exposes a view-attached hook
    #[serde(default)]
    pub view_attached: bool,
}

/// Named transition entry
#[derive(Debug, Clone, Deserialize)]
pub struct SceneTransition {
    pub name: String,
}

/// Scene description
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub views: BTreeMap<String, String>,
    #[serde(default)]
    pub area_views: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub models: Vec<SceneModel>,
    #[serde(default)]
    pub transitions: Vec<SceneTransition>,
}

impl Scene {
    /// Parse a scene from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| trellis_common::Error::from(e).into())
    }

    /// Load a scene file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(trellis_common::Error::from)?;
        Self::from_toml_str(&content)
    }

    /// Register the scene's views, models and transitions
    ///
    /// Transitions are registered under `transition_namespace` + name.
    pub fn install(
        &self,
        journal: &Journal,
        loader: &MemoryModuleLoader,
        locator: &MemoryViewLocator,
        transition_namespace: &str,
    ) {
        for (view_id, markup) in &self.views {
            locator.register_view(view_id.clone(), markup.clone());
        }
        for (area, views) in &self.area_views {
            for (view_id, markup) in views {
                locator.register_area_view(area.clone(), view_id.clone(), markup.clone());
            }
        }

        for model in &self.models {
            let module = match model.kind {
                ModelKind::Constructor => {
                    let mut constructor = RecordingConstructor::new(&model.id, journal.clone());
                    if model.activate {
                        constructor = constructor.activatable();
                    }
                    if model.view_attached {
                        constructor = constructor.observing_view_attached();
                    }
                    Module::Constructor(Arc::new(constructor))
                }
                ModelKind::Instance => {
                    let mut instance = RecordingModel::new(&model.id, journal.clone());
                    if model.activate {
                        instance = instance.activatable();
                    }
                    if model.view_attached {
                        instance = instance.observing_view_attached();
                    }
                    Module::Instance(Arc::new(instance))
                }
            };
            loader.register(model.id.clone(), module);
        }

        for transition in &self.transitions {
            loader.register(
                transition_module_id(transition_namespace, &transition.name),
                Module::Transition(Arc::new(JournalTransition {
                    name: transition.name.clone(),
                    journal: journal.clone(),
                })),
            );
        }
    }
}

/// Named transition that records itself, then swaps content immediately
struct JournalTransition {
    name: String,
    journal: Journal,
}

#[async_trait]
impl Transition for JournalTransition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        container: &dyn Container,
        content: Option<&ViewNode>,
        settings: &CompositionSettings,
    ) -> Result<()> {
        self.journal.record(format!("transition {}", self.name));
        DefaultTransition.run(container, content, settings).await
    }
}

/// Parse a command-line instruction
///
/// JSON objects become options bags; anything else is a bare string.
pub fn parse_instruction(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json @ serde_json::Value::Object(_)) => Value::from_json(json),
        _ => Value::text(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ModuleLoader, ViewLocator};
    use crate::view::ViewRef;

    const SCENE: &str = r#"
[views]
"viewmodels/shell.html" = "<main/>"

[area_views.partial]
"footer.html" = "<footer/>"

[[models]]
id = "viewmodels/shell"
activate = true

[[models]]
id = "viewmodels/nav"
kind = "instance"
view_attached = true

[[transitions]]
name = "fade"
"#;

    #[test]
    fn test_parse_scene() {
        let scene = Scene::from_toml_str(SCENE).unwrap();
        assert_eq!(scene.views.len(), 1);
        assert_eq!(scene.models.len(), 2);
        assert_eq!(scene.models[0].kind, ModelKind::Constructor);
        assert!(scene.models[0].activate);
        assert_eq!(scene.models[1].kind, ModelKind::Instance);
        assert_eq!(scene.transitions[0].name, "fade");
    }

    #[test]
    fn test_load_scene_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENE.as_bytes()).unwrap();

        let scene = Scene::load(file.path()).unwrap();
        assert_eq!(scene.area_views["partial"].len(), 1);

        let missing = Scene::load(Path::new("/nonexistent/scene.toml"));
        assert!(matches!(missing, Err(crate::CompositionError::Config(_))));
    }

    #[test]
    fn test_malformed_scene() {
        assert!(Scene::from_toml_str("[[models]]\nkind = \"constructor\"\n").is_err());
    }

    #[tokio::test]
    async fn test_install_registers_everything() {
        let scene = Scene::from_toml_str(SCENE).unwrap();
        let journal = Journal::new();
        let loader = MemoryModuleLoader::new();
        let locator = MemoryViewLocator::new(".html");
        scene.install(&journal, &loader, &locator, "transitions/");

        assert!(matches!(
            loader.acquire("viewmodels/shell").await,
            Ok(Module::Constructor(_))
        ));
        assert!(matches!(
            loader.acquire("viewmodels/nav").await,
            Ok(Module::Instance(_))
        ));
        assert!(matches!(
            loader.acquire("transitions/fade").await,
            Ok(Module::Transition(_))
        ));

        let footer = locator
            .locate_view(&ViewRef::Specifier("footer.html".to_string()), Some("partial"))
            .await
            .unwrap();
        assert_eq!(footer.markup(), "<footer/>");
    }

    #[test]
    fn test_parse_instruction() {
        assert!(matches!(parse_instruction("viewmodels/shell"), Value::Text(_)));
        assert!(matches!(
            parse_instruction(r#"{"model": "viewmodels/shell", "activate": true}"#),
            Value::Options(_)
        ));
        // Non-object JSON stays a bare string
        assert!(matches!(parse_instruction("42"), Value::Text(s) if s == "42"));
    }
}
