use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of interaction an intent asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Click,
    Fill,
    Select,
    Navigate,
    Wait,
}

impl IntentKind {
    pub fn verb(&self) -> &'static str {
        match self {
            IntentKind::Click => "Click",
            IntentKind::Fill => "Fill",
            IntentKind::Select => "Select",
            IntentKind::Navigate => "Navigate to",
            IntentKind::Wait => "Wait for",
        }
    }
}

/// A single planned user action. Produced by the planner and consumed once by
/// the action executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    #[serde(alias = "target")]
    pub target_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl Intent {
    pub fn new(kind: IntentKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target_description: target.into(),
            payload: None,
            optional: false,
        }
    }

    pub fn click(target: impl Into<String>) -> Self {
        Self::new(IntentKind::Click, target)
    }

    pub fn fill(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IntentKind::Fill, target).with_payload(text)
    }

    pub fn select(target: impl Into<String>, option: impl Into<String>) -> Self {
        Self::new(IntentKind::Select, target).with_payload(option)
    }

    pub fn navigate(target: impl Into<String>) -> Self {
        Self::new(IntentKind::Navigate, target)
    }

    pub fn wait(target: impl Into<String>) -> Self {
        Self::new(IntentKind::Wait, target)
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Optional intents never count toward the consecutive-failure threshold.
    /// Planners mark them explicitly or word them as "optional"/"optionally".
    pub fn is_optional(&self) -> bool {
        self.optional || self.target_description.to_lowercase().contains("optional")
    }

    /// Returns an absolute URL when the intent points at one.
    pub fn url(&self) -> Option<&str> {
        [self.payload.as_deref(), Some(self.target_description.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| s.starts_with("http://") || s.starts_with("https://"))
    }

    /// Structural check applied to every planned intent before a run starts.
    pub fn validate(&self) -> Result<(), String> {
        let needs_target = !matches!(self.kind, IntentKind::Wait);
        if needs_target && self.target_description.trim().is_empty() {
            return Err(format!("{:?} intent has no target", self.kind));
        }
        let needs_payload = matches!(self.kind, IntentKind::Fill | IntentKind::Select);
        if needs_payload && self.payload.as_deref().is_none_or(|p| p.is_empty()) {
            return Err(format!(
                "{:?} intent on '{}' has no payload",
                self.kind, self.target_description
            ));
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        match (&self.kind, &self.payload) {
            (IntentKind::Fill, Some(text)) => {
                format!("Fill '{}' with \"{}\"", self.target_description, text)
            }
            (IntentKind::Select, Some(option)) => {
                format!("Select \"{}\" in '{}'", option, self.target_description)
            }
            (kind, _) => format!("{} '{}'", kind.verb(), self.target_description),
        }
    }
}

/// Counts of dialog-like, form-like and menu-like regions on the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    pub dialogs: u32,
    pub forms: u32,
    pub menus: u32,
}

impl RoleFlags {
    pub const DIALOG: u8 = 1 << 0;
    pub const FORM: u8 = 1 << 1;
    pub const MENU: u8 = 1 << 2;

    pub fn has_dialog(&self) -> bool {
        self.dialogs > 0
    }

    pub fn has_form(&self) -> bool {
        self.forms > 0
    }

    pub fn has_menu(&self) -> bool {
        self.menus > 0
    }

    /// Presence bitset.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.has_dialog() {
            bits |= Self::DIALOG;
        }
        if self.has_form() {
            bits |= Self::FORM;
        }
        if self.has_menu() {
            bits |= Self::MENU;
        }
        bits
    }
}

/// Keyword categories matched on the visible surface, stored as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSignals(u8);

impl TextSignals {
    pub const SUCCESS: u8 = 1 << 0;
    pub const ERROR: u8 = 1 << 1;
    pub const LOADING: u8 = 1 << 2;
    pub const LOGIN_REQUIRED: u8 = 1 << 3;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    pub fn success(&self) -> bool {
        self.contains(Self::SUCCESS)
    }

    pub fn error(&self) -> bool {
        self.contains(Self::ERROR)
    }

    pub fn loading(&self) -> bool {
        self.contains(Self::LOADING)
    }

    pub fn login_required(&self) -> bool {
        self.contains(Self::LOGIN_REQUIRED)
    }
}

/// Snapshot of UI-relevant signals taken after an action. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageObservation {
    pub raw_markup_digest: String,
    pub roles: RoleFlags,
    pub text_signals: TextSignals,
    pub url: String,
    pub ordinal: u64,
}

/// Order-independent fingerprint of a [`PageObservation`].
///
/// Equality only looks at `digest`; the remaining fields are kept so the
/// detector can tell which flags were newly raised without re-reading the page.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct StateSignature {
    pub digest: String,
    pub role_bits: u8,
    pub signal_bits: u8,
    pub url: String,
}

impl PartialEq for StateSignature {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl std::hash::Hash for StateSignature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Display for StateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.digest.chars().take(16).collect();
        f.write_str(&short)
    }
}

/// Classification of a transition between two signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NoChange,
    Modal,
    Form,
    Dropdown,
    Success,
    Navigation,
    Other,
}

impl ChangeKind {
    pub fn is_change(&self) -> bool {
        !matches!(self, ChangeKind::NoChange)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::NoChange => "no_change",
            ChangeKind::Modal => "modal",
            ChangeKind::Form => "form",
            ChangeKind::Dropdown => "dropdown",
            ChangeKind::Success => "success",
            ChangeKind::Navigation => "navigation",
            ChangeKind::Other => "other",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a captured screenshot (a file path for the default
/// capturer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenshotHandle(pub String);

impl fmt::Display for ScreenshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One documented, screenshot-backed entry of the workflow guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub ordinal: usize,
    pub signature: StateSignature,
    pub kind: ChangeKind,
    pub screenshot: ScreenshotHandle,
    pub description: String,
    pub url: String,
}

/// Phases of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Analyzing,
    Navigating,
    Executing,
    Finalizing,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Analyzing => "analyzing",
            Phase::Navigating => "navigating",
            Phase::Executing => "executing",
            Phase::Finalizing => "finalizing",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}
