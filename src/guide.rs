//! File-backed documentation output: `README.md` plus a `steps.json`
//! manifest per run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::errors::{Result, WorkflowError};
use crate::orchestrator::{DocumentationGenerator, RunOutcome, RunStatus, TaskRequest};

const TASK_SLUG_MAX_CHARS: usize = 50;

/// `{root}/{app}/{task}` with both segments made filesystem-safe.
pub fn run_dir(root: &Path, app_name: &str, task: &str) -> PathBuf {
    let app = app_name.trim().to_lowercase().replace(' ', "_");
    root.join(if app.is_empty() { "unknown_app".into() } else { app })
        .join(task_slug(task))
}

pub fn task_slug(task: &str) -> String {
    let cleaned: String = task
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') { c } else { '_' })
        .collect();
    let slug: String = cleaned
        .trim()
        .replace(' ', "_")
        .chars()
        .take(TASK_SLUG_MAX_CHARS)
        .collect();
    if slug.is_empty() { "task".into() } else { slug }
}

#[derive(Debug, Clone)]
pub struct MarkdownGuide {
    root: PathBuf,
}

impl MarkdownGuide {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir_for(&self, request: &TaskRequest) -> PathBuf {
        run_dir(&self.root, &request.app_name, &request.task)
    }
}

pub fn render_readme(request: &TaskRequest, outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Task: {}\n", request.task);
    let _ = writeln!(out, "**Application:** {}\n", request.app_name);

    let status = match outcome.status {
        RunStatus::Completed => "completed".to_string(),
        RunStatus::BudgetExceeded => "stopped early: step budget exceeded".to_string(),
        RunStatus::Cancelled => "cancelled".to_string(),
        RunStatus::Failed => format!(
            "failed ({}): {}",
            outcome
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".into()),
            outcome.error.as_deref().unwrap_or("no details")
        ),
    };
    let _ = writeln!(out, "**Status:** {status}\n");

    if !outcome.intents.is_empty() {
        let _ = writeln!(out, "## Planned Steps\n");
        for (idx, intent) in outcome.intents.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", idx + 1, intent.describe());
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Captured States\n");
    let _ = writeln!(out, "Total screenshots captured: {}\n", outcome.steps.len());
    for step in &outcome.steps {
        let file = Path::new(&step.screenshot.0)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| step.screenshot.0.clone());
        let _ = writeln!(out, "### Step {} ({})\n", step.ordinal, step.kind);
        let _ = writeln!(out, "{}\n", step.description);
        let _ = writeln!(out, "![step {}]({})\n", step.ordinal, file);
    }
    out
}

#[async_trait]
impl DocumentationGenerator for MarkdownGuide {
    async fn publish(&self, request: &TaskRequest, outcome: &RunOutcome) -> Result<()> {
        let dir = self.dir_for(request);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("README.md"), render_readme(request, outcome)).await?;
        let manifest = serde_json::to_vec_pretty(outcome)?;
        tokio::fs::write(dir.join("steps.json"), manifest)
            .await
            .map_err(|e| WorkflowError::Output(format!("writing manifest: {e}")))?;
        info!(dir = %dir.display(), steps = outcome.steps.len(), "guide written");
        Ok(())
    }
}
