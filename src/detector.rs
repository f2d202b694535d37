//! State change detection
//!
//! Computes the [`StateSignature`] of an observation and classifies how it
//! differs from the previous one. Pure: never touches the live surface.

use blake3::Hasher;

use crate::types::{ChangeKind, PageObservation, RoleFlags, StateSignature, TextSignals};

/// Fingerprint an observation. Hashes the region counts, the presence bitset,
/// the text-signal bitset and the normalized URL; node order does not matter.
pub fn signature(observation: &PageObservation) -> StateSignature {
    let roles = observation.roles;
    let url = normalize_url(&observation.url);

    let mut hasher = Hasher::new();
    hasher.update(&[roles.bits(), observation.text_signals.bits()]);
    for count in [roles.dialogs, roles.forms, roles.menus] {
        hasher.update(&count.to_le_bytes());
    }
    hasher.update(url.as_bytes());

    StateSignature {
        digest: hasher.finalize().to_hex().to_string(),
        role_bits: roles.bits(),
        signal_bits: observation.text_signals.bits(),
        url,
    }
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    trimmed
        .strip_suffix('/')
        .filter(|rest| !rest.ends_with('/'))
        .unwrap_or(trimmed)
        .to_string()
}

/// Stateless classifier; the previous signature is supplied by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateChangeDetector;

impl StateChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify `observation` against `previous`.
    ///
    /// When several things change at once the first matching rule wins:
    /// Modal, Form, Dropdown, Success, Navigation, then Other.
    pub fn classify(
        &self,
        previous: &StateSignature,
        observation: &PageObservation,
    ) -> (StateSignature, ChangeKind) {
        let current = signature(observation);
        if current == *previous {
            return (current, ChangeKind::NoChange);
        }

        let raised_roles = current.role_bits & !previous.role_bits;
        let raised_signals = current.signal_bits & !previous.signal_bits;

        let kind = if raised_roles & RoleFlags::DIALOG != 0 {
            ChangeKind::Modal
        } else if raised_roles & RoleFlags::FORM != 0 {
            ChangeKind::Form
        } else if raised_roles & RoleFlags::MENU != 0 {
            ChangeKind::Dropdown
        } else if raised_signals & TextSignals::SUCCESS != 0 {
            ChangeKind::Success
        } else if current.url != previous.url {
            ChangeKind::Navigation
        } else {
            ChangeKind::Other
        };
        (current, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(url: &str, roles: RoleFlags, signals: u8) -> PageObservation {
        PageObservation {
            raw_markup_digest: String::new(),
            roles,
            text_signals: TextSignals::from_bits(signals),
            url: url.to_string(),
            ordinal: 0,
        }
    }

    fn base() -> PageObservation {
        observation("https://app.test/home", RoleFlags::default(), 0)
    }

    fn with_dialog(url: &str) -> PageObservation {
        observation(
            url,
            RoleFlags {
                dialogs: 1,
                ..Default::default()
            },
            0,
        )
    }

    #[test]
    fn signature_is_deterministic() {
        assert_eq!(signature(&base()), signature(&base()));
        assert_eq!(signature(&base()).digest, signature(&base()).digest);
    }

    #[test]
    fn signature_ignores_ordinal_and_markup_digest() {
        let mut other = base();
        other.ordinal = 42;
        other.raw_markup_digest = "different".into();
        assert_eq!(signature(&base()), signature(&other));
    }

    #[test]
    fn signature_differs_on_flags_url_and_signals() {
        let reference = signature(&base());
        assert_ne!(signature(&with_dialog("https://app.test/home")), reference);
        assert_ne!(
            signature(&observation("https://app.test/issues", RoleFlags::default(), 0)),
            reference
        );
        assert_ne!(
            signature(&observation(
                "https://app.test/home",
                RoleFlags::default(),
                TextSignals::LOADING
            )),
            reference
        );
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let a = observation("https://app.test/home/", RoleFlags::default(), 0);
        assert_eq!(signature(&a), signature(&base()));
    }

    #[test]
    fn repeated_observations_are_no_change() {
        let detector = StateChangeDetector::new();
        let mut previous = signature(&base());
        for _ in 0..3 {
            let (next, kind) = detector.classify(&previous, &base());
            assert_eq!(kind, ChangeKind::NoChange);
            previous = next;
        }
    }

    #[test]
    fn modal_outranks_navigation() {
        let detector = StateChangeDetector::new();
        let (_, kind) = detector.classify(&signature(&base()), &with_dialog("https://app.test/new"));
        assert_eq!(kind, ChangeKind::Modal);
    }

    #[test]
    fn precedence_chain() {
        let detector = StateChangeDetector::new();
        let prev = signature(&base());

        let form_and_menu = observation(
            "https://app.test/home",
            RoleFlags {
                dialogs: 0,
                forms: 1,
                menus: 1,
            },
            TextSignals::SUCCESS,
        );
        assert_eq!(detector.classify(&prev, &form_and_menu).1, ChangeKind::Form);

        let menu = observation(
            "https://app.test/other",
            RoleFlags {
                menus: 1,
                ..Default::default()
            },
            TextSignals::SUCCESS,
        );
        assert_eq!(detector.classify(&prev, &menu).1, ChangeKind::Dropdown);

        let success = observation("https://app.test/other", RoleFlags::default(), TextSignals::SUCCESS);
        assert_eq!(detector.classify(&prev, &success).1, ChangeKind::Success);

        let moved = observation("https://app.test/other", RoleFlags::default(), 0);
        assert_eq!(detector.classify(&prev, &moved).1, ChangeKind::Navigation);
    }

    #[test]
    fn residual_differences_are_other() {
        let detector = StateChangeDetector::new();
        let prev = signature(&base());
        let toast = observation("https://app.test/home", RoleFlags::default(), TextSignals::ERROR);
        assert_eq!(detector.classify(&prev, &toast).1, ChangeKind::Other);
    }

    #[test]
    fn closing_a_dialog_is_not_modal() {
        let detector = StateChangeDetector::new();
        let prev = signature(&with_dialog("https://app.test/home"));
        let (_, kind) = detector.classify(&prev, &base());
        assert_eq!(kind, ChangeKind::Other);
    }

    #[test]
    fn second_dialog_changes_counts_only() {
        let detector = StateChangeDetector::new();
        let prev = signature(&with_dialog("https://app.test/home"));
        let two = observation(
            "https://app.test/home",
            RoleFlags {
                dialogs: 2,
                ..Default::default()
            },
            0,
        );
        assert_eq!(detector.classify(&prev, &two).1, ChangeKind::Other);
    }
}
