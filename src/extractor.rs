//! Signature extraction: turns a live surface into a [`PageObservation`].

use std::sync::atomic::{AtomicU64, Ordering};

use blake3::Hasher;
use tracing::debug;

use crate::errors::{Result, SurfaceError};
use crate::signals::classify_surface;
use crate::surface::{LiveSurface, SurfaceSnapshot};
use crate::types::PageObservation;

/// Reads the surface and produces observations with a monotonically
/// increasing ordinal. One extractor per run.
#[derive(Debug, Default)]
pub struct SignatureExtractor {
    next_ordinal: AtomicU64,
}

impl SignatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the surface and derive an observation. Surface errors are
    /// passed through unchanged; retrying transient ones is up to the caller.
    pub async fn extract(
        &self,
        surface: &dyn LiveSurface,
    ) -> Result<PageObservation, SurfaceError> {
        let snapshot = surface.snapshot().await?;
        Ok(self.observe(&snapshot))
    }

    /// Derive an observation from an already captured snapshot.
    pub fn observe(&self, snapshot: &SurfaceSnapshot) -> PageObservation {
        let class = classify_surface(snapshot);
        let ordinal = self.next_ordinal.fetch_add(1, Ordering::SeqCst);
        let observation = PageObservation {
            raw_markup_digest: markup_digest(snapshot),
            roles: class.roles,
            text_signals: class.signals,
            url: snapshot.url.clone(),
            ordinal,
        };
        debug!(
            ordinal,
            url = %observation.url,
            roles = observation.roles.bits(),
            signals = observation.text_signals.bits(),
            "observed surface"
        );
        observation
    }
}

fn markup_digest(snapshot: &SurfaceSnapshot) -> String {
    let mut hasher = Hasher::new();
    for node in &snapshot.nodes {
        hasher.update(node.tag.as_bytes());
        hasher.update(&[0]);
        hasher.update(node.role.as_deref().unwrap_or("").as_bytes());
        hasher.update(&[0]);
        hasher.update(node.class_name.as_bytes());
        hasher.update(&[0]);
        hasher.update(node.text.as_bytes());
        hasher.update(&[u8::from(node.visible), b'\n']);
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceNode;

    fn snapshot() -> SurfaceSnapshot {
        SurfaceSnapshot::new("https://app.test/")
            .with_node(SurfaceNode::new("", "div").with_role("dialog"))
            .with_node(SurfaceNode::new("", "span").with_text("Saved"))
    }

    #[test]
    fn ordinals_increase() {
        let extractor = SignatureExtractor::new();
        let first = extractor.observe(&snapshot());
        let second = extractor.observe(&snapshot());
        assert_eq!(first.ordinal, 0);
        assert_eq!(second.ordinal, 1);
    }

    #[test]
    fn observation_carries_classification() {
        let observation = SignatureExtractor::new().observe(&snapshot());
        assert!(observation.roles.has_dialog());
        assert!(observation.text_signals.success());
        assert_eq!(observation.url, "https://app.test/");
    }

    #[test]
    fn markup_digest_is_stable() {
        let extractor = SignatureExtractor::new();
        let a = extractor.observe(&snapshot());
        let b = extractor.observe(&snapshot());
        assert_eq!(a.raw_markup_digest, b.raw_markup_digest);

        let changed = snapshot().with_node(SurfaceNode::new("", "p").with_text("new"));
        assert_ne!(extractor.observe(&changed).raw_markup_digest, a.raw_markup_digest);
    }
}
