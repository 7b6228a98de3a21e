//! Views and containers
//!
//! Content is substrate-agnostic: a [`ViewNode`] is an opaque handle to
//! rendered view content, and a [`Container`] is anything that can hold one.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Handle to a concrete, instantiated view
///
/// Each located view is a fresh node; two nodes built from the same view
/// template have different ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewNode {
    id: Uuid,
    view_id: String,
    markup: String,
}

impl ViewNode {
    /// Create a node for the given view id
    pub fn new(view_id: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            view_id: view_id.into(),
            markup: markup.into(),
        }
    }

    /// Node instance id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// View template this node was built from
    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    /// Rendered markup
    pub fn markup(&self) -> &str {
        &self.markup
    }
}

/// What a view locator is asked to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRef {
    /// View specifier, resolved by the locator (e.g. `views/footer.html`)
    Specifier(String),
    /// Already-instantiated node; locators hand it back as-is
    Node(ViewNode),
}

impl fmt::Display for ViewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewRef::Specifier(spec) => f.write_str(spec),
            ViewRef::Node(node) => write!(f, "{} ({})", node.view_id(), node.id()),
        }
    }
}

/// Host container for composed content
///
/// Mutations are synchronous and take `&self`; implementations own their
/// interior mutability.
pub trait Container: Send + Sync {
    /// Stable container identity
    fn id(&self) -> Uuid;

    /// Remove all content
    fn empty(&self);

    /// Replace all content with `nodes`
    fn set_children(&self, nodes: Vec<ViewNode>);

    /// Current content
    fn children(&self) -> Vec<ViewNode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_from_same_template_are_distinct() {
        let a = ViewNode::new("views/shell.html", "<div/>");
        let b = ViewNode::new("views/shell.html", "<div/>");
        assert_eq!(a.view_id(), b.view_id());
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn test_view_ref_display() {
        let spec = ViewRef::Specifier("views/footer.html".to_string());
        assert_eq!(spec.to_string(), "views/footer.html");
    }
}
