//! Screenshot capture and the append-only step log.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::errors::{Result, SurfaceError};
use crate::surface::LiveSurface;
use crate::types::{ChangeKind, PageObservation, ScreenshotHandle, StateSignature, StepRecord};

const SLUG_STOP_WORDS: &[&str] = &[
    "to", "the", "a", "an", "in", "on", "at", "for", "and", "or", "click", "fill", "navigate",
    "select",
];
const SLUG_MAX_WORDS: usize = 3;
const SLUG_MAX_CHARS: usize = 30;

/// What a capturer needs to know about the step being captured.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub ordinal: usize,
    pub kind: ChangeKind,
    pub description: String,
}

impl CaptureRequest {
    /// `step_{ordinal}_{slug}.png`
    pub fn file_name(&self) -> String {
        format!("step_{}_{}.png", self.ordinal, slug(&self.description, self.kind))
    }
}

/// Up to three meaningful words of the description, else the change kind.
pub fn slug(description: &str, kind: ChangeKind) -> String {
    let words: Vec<String> = description
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !SLUG_STOP_WORDS.contains(w))
        .take(SLUG_MAX_WORDS)
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return kind.as_str().to_string();
    }
    words.join("_").chars().take(SLUG_MAX_CHARS).collect()
}

/// External screenshot collaborator. The returned handle is opaque to the
/// engine.
#[async_trait]
pub trait ScreenshotCapturer: Send + Sync {
    async fn capture(
        &self,
        surface: &dyn LiveSurface,
        request: &CaptureRequest,
    ) -> Result<ScreenshotHandle, SurfaceError>;
}

/// Writes PNG screenshots into one directory per run.
#[derive(Debug, Clone)]
pub struct FileScreenshotCapturer {
    dir: PathBuf,
}

impl FileScreenshotCapturer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ScreenshotCapturer for FileScreenshotCapturer {
    async fn capture(
        &self,
        surface: &dyn LiveSurface,
        request: &CaptureRequest,
    ) -> Result<ScreenshotHandle, SurfaceError> {
        let png = surface.screenshot().await?;
        let path = self.dir.join(request.file_name());
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SurfaceError::Storage(format!("creating {}: {e}", self.dir.display())))?;
        tokio::fs::write(&path, png)
            .await
            .map_err(|e| SurfaceError::Storage(format!("writing {}: {e}", path.display())))?;
        Ok(ScreenshotHandle(path.display().to_string()))
    }
}

/// Ordered, append-only sequence of step records. Ordinals are the insertion
/// index, so they are strictly increasing and gap-free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }

    fn next_ordinal(&self) -> usize {
        self.records.len()
    }

    fn push(&mut self, record: StepRecord) {
        debug_assert_eq!(record.ordinal, self.records.len());
        self.records.push(record);
    }
}

/// Captures a screenshot for a confirmed state change and appends the step.
#[derive(Clone)]
pub struct CaptureRecorder {
    capturer: Arc<dyn ScreenshotCapturer>,
}

impl CaptureRecorder {
    pub fn new(capturer: Arc<dyn ScreenshotCapturer>) -> Self {
        Self { capturer }
    }

    /// Nothing is appended when the capture fails, so ordinals stay gap-free.
    pub async fn record(
        &self,
        log: &mut StepLog,
        surface: &dyn LiveSurface,
        kind: ChangeKind,
        signature: StateSignature,
        observation: &PageObservation,
        description: impl Into<String>,
    ) -> Result<StepRecord> {
        let request = CaptureRequest {
            ordinal: log.next_ordinal(),
            kind,
            description: description.into(),
        };
        let screenshot = self.capturer.capture(surface, &request).await?;
        let record = StepRecord {
            ordinal: request.ordinal,
            signature,
            kind,
            screenshot,
            description: request.description,
            url: observation.url.clone(),
        };
        info!(
            ordinal = record.ordinal,
            kind = %record.kind,
            screenshot = %record.screenshot,
            "captured step"
        );
        log.push(record.clone());
        Ok(record)
    }
}
