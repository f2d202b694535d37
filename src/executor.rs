//! Action execution with bounded locator and interaction retries.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{ErrorKind, Result, SurfaceError, WorkflowError};
use crate::extractor::SignatureExtractor;
use crate::locator::{Located, locate};
use crate::surface::{Interaction, LiveSurface};
use crate::types::{Intent, IntentKind, PageObservation};

/// Outcome of applying one intent. Always carries the observation taken
/// after the last attempt, including on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub error: Option<ErrorKind>,
    pub detail: Option<String>,
    pub observation: PageObservation,
}

enum Attempt {
    Done,
    Failed(ErrorKind, String),
}

/// The only component allowed to mutate the live surface.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    config: Config,
}

impl ActionExecutor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Apply `intent`, then observe the surface once.
    ///
    /// Transient failures are retried here and reported through the result;
    /// only an unreachable surface is returned as an error.
    pub async fn apply(
        &self,
        intent: &Intent,
        surface: &dyn LiveSurface,
        extractor: &SignatureExtractor,
    ) -> Result<ExecutionResult> {
        info!(intent = %intent.describe(), "applying intent");

        let attempt = match intent.kind {
            IntentKind::Wait => {
                pause(self.config.wait()).await;
                Attempt::Done
            }
            IntentKind::Navigate => match intent.url() {
                Some(url) => self.navigate(url, surface).await?,
                None => self.interact(intent, surface).await?,
            },
            _ => self.interact(intent, surface).await?,
        };

        let observation = self.observe(surface, extractor).await?;
        let result = match attempt {
            Attempt::Done => ExecutionResult {
                succeeded: true,
                error: None,
                detail: None,
                observation,
            },
            Attempt::Failed(kind, detail) => {
                warn!(intent = %intent.describe(), %kind, %detail, "intent failed");
                ExecutionResult {
                    succeeded: false,
                    error: Some(kind),
                    detail: Some(detail),
                    observation,
                }
            }
        };
        Ok(result)
    }

    /// Read the surface once it has settled. A page that is mid-navigation
    /// can fail to snapshot for a moment; those reads are retried with
    /// backoff. Only an unreachable surface or an exhausted retry window is
    /// returned as an error.
    pub async fn observe(
        &self,
        surface: &dyn LiveSurface,
        extractor: &SignatureExtractor,
    ) -> Result<PageObservation> {
        let mut last_error = None;
        for attempt in 0..=self.config.action_retries {
            if attempt > 0 {
                pause(self.config.backoff(attempt)).await;
            }
            match extractor.extract(surface).await {
                Ok(observation) => return Ok(observation),
                Err(err) if err.is_unavailable() => return Err(err.into()),
                Err(err) => {
                    warn!(attempt, %err, "surface not readable yet, retrying");
                    last_error = Some(err);
                }
            }
        }
        let detail = last_error.map(|err| err.to_string()).unwrap_or_default();
        Err(WorkflowError::Surface(SurfaceError::Unavailable(format!(
            "surface unreadable after {} attempts: {detail}",
            self.config.action_retries + 1
        ))))
    }

    /// Load `url`, retrying transient failures.
    pub async fn navigate_to(&self, url: &str, surface: &dyn LiveSurface) -> Result<Option<String>> {
        match self.navigate(url, surface).await? {
            Attempt::Done => Ok(None),
            Attempt::Failed(_, detail) => Ok(Some(detail)),
        }
    }

    async fn navigate(&self, url: &str, surface: &dyn LiveSurface) -> Result<Attempt> {
        let mut last_error = String::new();
        for attempt in 0..=self.config.action_retries {
            if attempt > 0 {
                pause(self.config.backoff(attempt)).await;
            }
            match surface.navigate(url).await {
                Ok(()) => {
                    surface.settle().await;
                    return Ok(Attempt::Done);
                }
                Err(err) => match classify(err)? {
                    Retry::Again(detail) => {
                        warn!(url, attempt, %detail, "navigation interrupted, retrying");
                        last_error = detail;
                    }
                    Retry::GiveUp(detail) => {
                        return Ok(Attempt::Failed(ErrorKind::ActionFailed, detail));
                    }
                },
            }
        }
        Ok(Attempt::Failed(ErrorKind::ActionFailed, last_error))
    }

    async fn interact(&self, intent: &Intent, surface: &dyn LiveSurface) -> Result<Attempt> {
        let payload = intent.payload.clone().unwrap_or_default();
        let interaction = match intent.kind {
            IntentKind::Fill => Interaction::Fill(payload),
            IntentKind::Select => Interaction::Select(payload),
            _ => Interaction::Click,
        };

        let mut last_error = String::new();
        for attempt in 0..=self.config.action_retries {
            if attempt > 0 {
                pause(self.config.backoff(attempt)).await;
            }
            let Some(located) = self.resolve(intent, surface).await? else {
                return Ok(Attempt::Failed(
                    ErrorKind::ElementNotFound,
                    format!(
                        "no element matches '{}' after {} attempts",
                        intent.target_description,
                        self.config.locate_attempts.max(1)
                    ),
                ));
            };
            match surface.interact(&located.handle, &interaction).await {
                Ok(()) => {
                    surface.settle().await;
                    return Ok(Attempt::Done);
                }
                Err(err) => match classify(err)? {
                    Retry::Again(detail) => {
                        warn!(handle = %located.handle, attempt, %detail, "transient interaction failure, retrying");
                        last_error = detail;
                    }
                    Retry::GiveUp(detail) => {
                        return Ok(Attempt::Failed(ErrorKind::ActionFailed, detail));
                    }
                },
            }
        }
        Ok(Attempt::Failed(ErrorKind::ActionFailed, last_error))
    }

    /// Resolve the target within the bounded retry window, re-reading the
    /// surface before each attempt.
    async fn resolve(&self, intent: &Intent, surface: &dyn LiveSurface) -> Result<Option<Located>> {
        let attempts = self.config.locate_attempts.max(1);
        for attempt in 1..=attempts {
            match surface.snapshot().await {
                Ok(snapshot) => {
                    if let Some(found) = locate(&snapshot, &intent.target_description, intent.kind) {
                        return Ok(Some(found));
                    }
                }
                Err(err) if err.is_unavailable() => return Err(err.into()),
                Err(err) => debug!(attempt, %err, "snapshot failed during resolution"),
            }
            if attempt < attempts {
                debug!(target = %intent.target_description, attempt, "element not found yet");
                pause(self.config.backoff(attempt)).await;
            }
        }
        Ok(None)
    }
}

enum Retry {
    Again(String),
    GiveUp(String),
}

fn classify(err: SurfaceError) -> Result<Retry> {
    if err.is_unavailable() {
        return Err(WorkflowError::Surface(err));
    }
    if err.is_transient() {
        Ok(Retry::Again(err.to_string()))
    } else {
        Ok(Retry::GiveUp(err.to_string()))
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
