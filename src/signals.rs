//! Fixed recognition policy for UI regions and text signals.
//!
//! Every keyword and role vocabulary the engine uses lives here, behind one
//! pure function: [`classify_surface`].

use crate::surface::{SurfaceNode, SurfaceSnapshot};
use crate::types::{RoleFlags, TextSignals};

/// Region categories recognized on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Dialog,
    Form,
    Menu,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Dialog, Region::Form, Region::Menu];

    fn roles(&self) -> &'static [&'static str] {
        match self {
            Region::Dialog => &["dialog", "alertdialog"],
            Region::Form => &["form"],
            Region::Menu => &["menu", "listbox"],
        }
    }

    fn class_tokens(&self) -> &'static [&'static str] {
        match self {
            Region::Dialog => &["modal", "dialog", "overlay", "popup"],
            Region::Form => &["form"],
            Region::Menu => &["menu", "listbox", "dropdown"],
        }
    }

    fn tags(&self) -> &'static [&'static str] {
        match self {
            Region::Dialog => &["dialog"],
            Region::Form => &["form"],
            Region::Menu => &[],
        }
    }

    /// A node belongs to a region if its role, tag or any class token matches.
    /// Class tokens use case-insensitive substring matching.
    pub fn matches(&self, node: &SurfaceNode) -> bool {
        if self.roles().iter().any(|role| node.role_is(role)) {
            return true;
        }
        if self.tags().contains(&node.tag.as_str()) {
            return true;
        }
        node.class_tokens()
            .any(|token| self.class_tokens().iter().any(|needle| token.contains(needle)))
    }
}

const SUCCESS_WORDS: &[&str] = &["success", "created", "saved", "completed", "done"];
const ERROR_WORDS: &[&str] = &["error", "failed", "invalid", "unable"];
const LOADING_WORDS: &[&str] = &["loading"];
const SPINNER_ROLES: &[&str] = &["progressbar"];
const SPINNER_CLASS_TOKENS: &[&str] = &["spinner", "loading"];

const LOGIN_URL_MARKERS: &[&str] = &["/login", "/signin", "/sign-in", "/auth"];
const LOGIN_CONTROL_PHRASES: &[&str] = &["sign in", "log in", "login", "signin"];

/// Result of classifying a whole surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceClass {
    pub roles: RoleFlags,
    pub signals: TextSignals,
}

/// Classify every visible node of `snapshot` into region counts and text
/// signal categories.
pub fn classify_surface(snapshot: &SurfaceSnapshot) -> SurfaceClass {
    let mut roles = RoleFlags::default();
    let mut signals = TextSignals::empty();

    for node in snapshot.visible_nodes() {
        if Region::Dialog.matches(node) {
            roles.dialogs += 1;
        }
        if Region::Form.matches(node) {
            roles.forms += 1;
        }
        if Region::Menu.matches(node) {
            roles.menus += 1;
        }

        let text = node.text.to_lowercase();
        if contains_word(&text, SUCCESS_WORDS) {
            signals.insert(TextSignals::SUCCESS);
        }
        if contains_word(&text, ERROR_WORDS) {
            signals.insert(TextSignals::ERROR);
        }
        if is_loading(node, &text) {
            signals.insert(TextSignals::LOADING);
        }
    }

    if requires_login(snapshot) {
        signals.insert(TextSignals::LOGIN_REQUIRED);
    }

    SurfaceClass { roles, signals }
}

fn is_loading(node: &SurfaceNode, lowered_text: &str) -> bool {
    node.busy
        || SPINNER_ROLES.iter().any(|role| node.role_is(role))
        || node
            .class_tokens()
            .any(|token| SPINNER_CLASS_TOKENS.iter().any(|needle| token.contains(needle)))
        || contains_word(lowered_text, LOADING_WORDS)
}

/// Whole-word keyword match on already lower-cased text.
fn contains_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| words.contains(&token))
}

/// A page asks for a login when its URL carries a login path, when it shows a
/// password field, or when it shows an email field next to a sign-in control.
pub fn requires_login(snapshot: &SurfaceSnapshot) -> bool {
    let url = snapshot.url.to_lowercase();
    if LOGIN_URL_MARKERS.iter().any(|marker| url.contains(marker)) {
        return true;
    }

    let mut email_field = false;
    let mut sign_in_control = false;
    for node in snapshot.visible_nodes() {
        match node.input_type.as_deref() {
            Some("password") => return true,
            Some("email") => email_field = true,
            _ => {}
        }
        if matches!(node.effective_role(), Some("button" | "link")) {
            let label = node
                .accessible_name
                .as_deref()
                .unwrap_or(&node.text)
                .to_lowercase();
            if LOGIN_CONTROL_PHRASES.iter().any(|p| label.trim() == *p) {
                sign_in_control = true;
            }
        }
    }
    email_field && sign_in_control
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(nodes: Vec<SurfaceNode>) -> SurfaceSnapshot {
        SurfaceSnapshot {
            url: "https://app.test/home".into(),
            title: String::new(),
            nodes,
        }
    }

    #[test]
    fn dialog_by_role_or_class() {
        let by_role = SurfaceNode::new("", "div").with_role("dialog");
        let by_class = SurfaceNode::new("", "div").with_class("sc-123 CreateIssueModal");
        let overlay = SurfaceNode::new("", "div").with_class("Overlay-root");
        let plain = SurfaceNode::new("", "div").with_class("sidebar");
        assert!(Region::Dialog.matches(&by_role));
        assert!(Region::Dialog.matches(&by_class));
        assert!(Region::Dialog.matches(&overlay));
        assert!(!Region::Dialog.matches(&plain));
    }

    #[test]
    fn menu_and_form_regions() {
        assert!(Region::Menu.matches(&SurfaceNode::new("", "ul").with_role("listbox")));
        assert!(Region::Menu.matches(&SurfaceNode::new("", "div").with_class("DropdownPanel")));
        assert!(Region::Form.matches(&SurfaceNode::new("", "form")));
        assert!(!Region::Form.matches(&SurfaceNode::new("", "div").with_role("menu")));
    }

    #[test]
    fn hidden_nodes_are_ignored() {
        let snapshot = page(vec![SurfaceNode::new("", "div").with_role("dialog").hidden()]);
        assert_eq!(classify_surface(&snapshot).roles, RoleFlags::default());
    }

    #[test]
    fn counts_regions() {
        let snapshot = page(vec![
            SurfaceNode::new("", "div").with_role("dialog"),
            SurfaceNode::new("", "form"),
            SurfaceNode::new("", "form"),
        ]);
        let class = classify_surface(&snapshot);
        assert_eq!(class.roles.dialogs, 1);
        assert_eq!(class.roles.forms, 2);
        assert_eq!(class.roles.menus, 0);
    }

    #[test]
    fn success_keywords_match_whole_words() {
        let snapshot = page(vec![SurfaceNode::new("", "span").with_text("Project created!")]);
        assert!(classify_surface(&snapshot).signals.success());

        let snapshot = page(vec![SurfaceNode::new("", "span").with_text("Abandoned carts")]);
        assert!(!classify_surface(&snapshot).signals.success());
    }

    #[test]
    fn loading_from_busy_attribute_or_spinner() {
        let busy = page(vec![SurfaceNode::new("", "div").busy()]);
        assert!(classify_surface(&busy).signals.loading());
        let spinner = page(vec![SurfaceNode::new("", "div").with_class("Spinner")]);
        assert!(classify_surface(&spinner).signals.loading());
        let progress = page(vec![SurfaceNode::new("", "div").with_role("progressbar")]);
        assert!(classify_surface(&progress).signals.loading());
    }

    #[test]
    fn error_signal() {
        let snapshot = page(vec![SurfaceNode::new("", "p").with_text("Name is invalid")]);
        let class = classify_surface(&snapshot);
        assert!(class.signals.error());
        assert!(!class.signals.success());
    }

    #[test]
    fn login_from_url() {
        let snapshot = SurfaceSnapshot::new("https://linear.app/login");
        assert!(requires_login(&snapshot));
    }

    #[test]
    fn login_from_password_field() {
        let snapshot = page(vec![SurfaceNode::new("e0", "input").with_input_type("password")]);
        assert!(requires_login(&snapshot));
        assert!(classify_surface(&snapshot).signals.login_required());
    }

    #[test]
    fn login_from_email_and_sign_in_button() {
        let email_only = page(vec![SurfaceNode::new("e0", "input").with_input_type("email")]);
        assert!(!requires_login(&email_only));

        let with_button = page(vec![
            SurfaceNode::new("e0", "input").with_input_type("email"),
            SurfaceNode::new("e1", "button").with_text("Sign in"),
        ]);
        assert!(requires_login(&with_button));
    }
}
