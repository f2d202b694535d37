//! The live, mutable browser surface the engine reads and drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::SurfaceError;

/// One element of the rendered page, flattened by the surface provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SurfaceNode {
    /// Stable handle used to address the element in `interact`.
    pub handle: String,
    pub tag: String,
    pub role: Option<String>,
    pub class_name: String,
    pub accessible_name: Option<String>,
    pub text: String,
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
    pub busy: bool,
    pub interactive: bool,
    pub visible: bool,
}

impl SurfaceNode {
    pub fn new(handle: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            tag: tag.into(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.accessible_name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn busy(mut self) -> Self {
        self.busy = true;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Lower-cased class-name tokens.
    pub fn class_tokens(&self) -> impl Iterator<Item = String> + '_ {
        self.class_name
            .split_whitespace()
            .map(|token| token.to_lowercase())
    }

    pub fn role_is(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }

    /// Effective role: explicit role attribute, else the implicit role of the tag.
    pub fn effective_role(&self) -> Option<&str> {
        if let Some(role) = self.role.as_deref() {
            return Some(role);
        }
        match self.tag.as_str() {
            "button" => Some("button"),
            "a" => Some("link"),
            "select" => Some("combobox"),
            "textarea" => Some("textbox"),
            "input" => match self.input_type.as_deref().unwrap_or("text") {
                "checkbox" => Some("checkbox"),
                "radio" => Some("radio"),
                "submit" | "button" => Some("button"),
                _ => Some("textbox"),
            },
            _ => None,
        }
    }

    pub fn is_editable(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type.as_deref(),
                Some("checkbox" | "radio" | "submit" | "button" | "hidden")
            ),
            _ => self.role_is("textbox") || self.role_is("searchbox"),
        }
    }

    pub fn is_selectable(&self) -> bool {
        self.tag == "select" || self.role_is("combobox") || self.role_is("listbox")
    }
}

/// Read-only view of the page at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceSnapshot {
    pub url: String,
    pub title: String,
    pub nodes: Vec<SurfaceNode>,
}

impl SurfaceSnapshot {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: SurfaceNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &SurfaceNode> {
        self.nodes.iter().filter(|n| n.visible)
    }
}

/// A concrete interaction against a resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click,
    Fill(String),
    Select(String),
}

/// Handle to the live browser surface.
///
/// Implementations serialize access themselves; the engine never issues two
/// calls concurrently.
#[async_trait]
pub trait LiveSurface: Send + Sync {
    /// Read the current page without mutating it.
    async fn snapshot(&self) -> Result<SurfaceSnapshot, SurfaceError>;

    /// Load `url` in the current tab.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    /// Apply `interaction` to the element identified by `handle`.
    async fn interact(&self, handle: &str, interaction: &Interaction) -> Result<(), SurfaceError>;

    /// Full-page screenshot as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError>;

    /// Wait for animations and transitions to finish after an interaction.
    async fn settle(&self) {}
}
