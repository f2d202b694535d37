//! Layered element resolution over a surface snapshot.
//!
//! Strategies in fallback order:
//! 1. ExactName - accessible name equals the target
//! 2. RoleName - a role word in the target plus the remaining name
//! 3. TextContains - visible text or label contains the target
//! 4. Heuristic - semantic variants of the target (synonyms, entity words)

use tracing::debug;

use crate::surface::{SurfaceNode, SurfaceSnapshot};
use crate::types::IntentKind;

/// Locator strategy identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    ExactName,
    RoleName,
    TextContains,
    Heuristic,
}

impl LocatorStrategy {
    pub fn fallback_chain() -> [LocatorStrategy; 4] {
        [
            LocatorStrategy::ExactName,
            LocatorStrategy::RoleName,
            LocatorStrategy::TextContains,
            LocatorStrategy::Heuristic,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::ExactName => "exact-name",
            LocatorStrategy::RoleName => "role-name",
            LocatorStrategy::TextContains => "text-contains",
            LocatorStrategy::Heuristic => "heuristic",
        }
    }
}

/// A resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub handle: String,
    pub strategy: LocatorStrategy,
}

const ROLE_WORDS: &[(&str, &str)] = &[
    ("button", "button"),
    ("link", "link"),
    ("tab", "tab"),
    ("checkbox", "checkbox"),
    ("menuitem", "menuitem"),
    ("option", "option"),
    ("field", "textbox"),
    ("input", "textbox"),
    ("textbox", "textbox"),
    ("dropdown", "combobox"),
];

const ACTION_SYNONYMS: &[(&str, &[&str])] = &[
    ("create", &["add", "new", "make", "+"]),
    ("add", &["create", "new", "make", "+"]),
    ("new", &["create", "add", "make", "+"]),
    ("edit", &["update", "modify", "change"]),
    ("update", &["edit", "modify", "change"]),
    ("delete", &["remove", "trash", "archive"]),
    ("remove", &["delete", "trash", "archive"]),
];

const COMMON_ENTITIES: &[&str] = &[
    "project",
    "issue",
    "task",
    "board",
    "card",
    "page",
    "database",
    "workspace",
    "team",
];

const MAX_VARIANTS: usize = 5;

/// Resolve `target` against `snapshot` for an interaction of `kind`.
/// Returns the first match of the first strategy that produces one.
pub fn locate(snapshot: &SurfaceSnapshot, target: &str, kind: IntentKind) -> Option<Located> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    let candidates: Vec<&SurfaceNode> = snapshot
        .visible_nodes()
        .filter(|node| !node.handle.is_empty() && accepts(node, kind))
        .collect();

    for strategy in LocatorStrategy::fallback_chain() {
        let found = match strategy {
            LocatorStrategy::ExactName => exact_name(&candidates, target),
            LocatorStrategy::RoleName => role_name(&candidates, target),
            LocatorStrategy::TextContains => text_contains(&candidates, target),
            LocatorStrategy::Heuristic => heuristic(&candidates, target),
        };
        if let Some(node) = found {
            debug!(target, handle = %node.handle, strategy = strategy.name(), "resolved element");
            return Some(Located {
                handle: node.handle.clone(),
                strategy,
            });
        }
        debug!(target, strategy = strategy.name(), "no candidates");
    }
    None
}

fn accepts(node: &SurfaceNode, kind: IntentKind) -> bool {
    match kind {
        IntentKind::Fill => node.is_editable(),
        IntentKind::Select => node.is_selectable(),
        _ => node.interactive,
    }
}

fn labels(node: &SurfaceNode) -> impl Iterator<Item = String> + '_ {
    [
        node.accessible_name.as_deref(),
        Some(node.text.as_str()),
        node.placeholder.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(|label| label.trim().to_lowercase())
    .filter(|label| !label.is_empty())
}

fn name_of(node: &SurfaceNode) -> String {
    node.accessible_name
        .as_deref()
        .unwrap_or(&node.text)
        .trim()
        .to_lowercase()
}

fn exact_name<'a>(candidates: &[&'a SurfaceNode], target: &str) -> Option<&'a SurfaceNode> {
    let target = target.to_lowercase();
    candidates.iter().copied().find(|node| name_of(node) == target)
}

/// Split "Save button" / "button Save" into a role and the remaining name.
fn split_role(target: &str) -> Option<(&'static str, String)> {
    let words: Vec<&str> = target.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    let lookup = |word: &str| {
        let word = word.to_lowercase();
        ROLE_WORDS
            .iter()
            .find(|(hint, _)| *hint == word)
            .map(|(_, role)| *role)
    };
    if let Some(role) = words.last().and_then(|w| lookup(w)) {
        return Some((role, words[..words.len() - 1].join(" ").to_lowercase()));
    }
    if let Some(role) = words.first().and_then(|w| lookup(w)) {
        return Some((role, words[1..].join(" ").to_lowercase()));
    }
    None
}

fn role_name<'a>(candidates: &[&'a SurfaceNode], target: &str) -> Option<&'a SurfaceNode> {
    let (role, name) = split_role(target)?;
    candidates.iter().copied().find(|node| {
        node.effective_role()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
            && labels(node).any(|label| label == name || label.contains(&name))
    })
}

fn text_contains<'a>(candidates: &[&'a SurfaceNode], target: &str) -> Option<&'a SurfaceNode> {
    let target = target.to_lowercase();
    candidates
        .iter()
        .copied()
        .find(|node| labels(node).any(|label| label.contains(&target)))
}

fn heuristic<'a>(candidates: &[&'a SurfaceNode], target: &str) -> Option<&'a SurfaceNode> {
    let variants = semantic_variants(target);
    let alternatives = &variants[1..];
    alternatives
        .iter()
        .find_map(|variant| exact_name(candidates, variant))
        .or_else(|| {
            alternatives
                .iter()
                .find_map(|variant| text_contains(candidates, variant))
        })
}

/// Alternative phrasings of a target: "Create project" also tries
/// "Add project", "New project", "+ Project" and the bare entity.
/// The original target is always first; at most five variants.
pub fn semantic_variants(target: &str) -> Vec<String> {
    let lowered = target.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let mut variants = vec![target.to_string()];

    let action = words.iter().enumerate().find_map(|(idx, word)| {
        ACTION_SYNONYMS
            .iter()
            .find(|(verb, _)| verb == word)
            .map(|(_, synonyms)| (idx, *synonyms))
    });
    if let Some((idx, synonyms)) = action {
        let entity = words[idx + 1..].join(" ");
        if !entity.is_empty() {
            for synonym in synonyms {
                if *synonym == "+" {
                    variants.push(format!("+ {}", capitalize(&entity)));
                } else {
                    variants.push(format!("{} {}", capitalize(synonym), entity));
                    variants.push(capitalize(&entity));
                }
            }
        }
    }

    if let Some(entity) = COMMON_ENTITIES.iter().find(|e| lowered.contains(*e)) {
        variants.push(capitalize(entity));
        variants.push(format!("+ {}", capitalize(entity)));
    }

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.to_lowercase()));
    variants.truncate(MAX_VARIANTS);
    variants
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
