//! Workflow state machine: Analyzing -> Navigating -> Executing -> Finalizing,
//! with a terminal Failed phase that keeps whatever was captured.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::detector::{StateChangeDetector, signature};
use crate::errors::{ErrorKind, Result, WorkflowError};
use crate::executor::ActionExecutor;
use crate::extractor::SignatureExtractor;
use crate::recorder::{CaptureRecorder, ScreenshotCapturer, StepLog};
use crate::resolver::UrlResolver;
use crate::surface::LiveSurface;
use crate::types::{ChangeKind, Intent, IntentKind, Phase, StateSignature, StepRecord};

/// Produces the ordered intents for a task.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str, app_name: &str) -> Result<Vec<Intent>>;
}

/// Blocks until a human confirms that login is complete. No timeout.
#[async_trait]
pub trait LoginGate: Send + Sync {
    async fn wait_for_login(&self, app_name: &str, url: &str);
}

/// Receives the finished or partial step sequence and persists it.
#[async_trait]
pub trait DocumentationGenerator: Send + Sync {
    async fn publish(&self, request: &TaskRequest, outcome: &RunOutcome) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task: String,
    pub app_name: String,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            app_name: app_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    BudgetExceeded,
    Cancelled,
    Failed,
}

/// Result of a run. Returned on every path, fatal ones included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub intents: Vec<Intent>,
    pub executed: usize,
    pub phases: Vec<Phase>,
    pub steps: Vec<StepRecord>,
}

impl RunOutcome {
    pub fn final_phase(&self) -> Option<Phase> {
        self.phases.last().copied()
    }
}

/// Per-run state. Owned by one `run` call and never shared.
#[derive(Debug)]
pub struct RunState {
    pub phase: Phase,
    pub phases: Vec<Phase>,
    pub last_signature: Option<StateSignature>,
    pub steps: StepLog,
    pub plan: Vec<Intent>,
    pub cursor: usize,
    pub remaining_budget: usize,
    pub executed: usize,
    pub consecutive_failures: u32,
}

impl RunState {
    fn new(step_budget: usize) -> Self {
        Self {
            phase: Phase::Analyzing,
            phases: Vec::new(),
            last_signature: None,
            steps: StepLog::new(),
            plan: Vec::new(),
            cursor: 0,
            remaining_budget: step_budget,
            executed: 0,
            consecutive_failures: 0,
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
        self.phases.push(phase);
    }
}

/// Per-run collaborators built fresh for every task.
struct RunContext<'a> {
    surface: &'a dyn LiveSurface,
    cancel: &'a CancellationToken,
    extractor: SignatureExtractor,
    detector: StateChangeDetector,
    executor: ActionExecutor,
    recorder: CaptureRecorder,
}

pub struct Orchestrator {
    config: Config,
    planner: Arc<dyn Planner>,
    resolver: Arc<dyn UrlResolver>,
    login: Arc<dyn LoginGate>,
    generator: Arc<dyn DocumentationGenerator>,
    authenticated_app: Option<String>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        planner: Arc<dyn Planner>,
        resolver: Arc<dyn UrlResolver>,
        login: Arc<dyn LoginGate>,
        generator: Arc<dyn DocumentationGenerator>,
    ) -> Self {
        Self {
            config,
            planner,
            resolver,
            login,
            generator,
            authenticated_app: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one task to completion. Never discards captured steps: fatal
    /// errors end in `Failed` with the partial sequence attached.
    pub async fn run(
        &mut self,
        request: &TaskRequest,
        surface: &dyn LiveSurface,
        capturer: Arc<dyn ScreenshotCapturer>,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        info!(task = %request.task, app = %request.app_name, "starting workflow");

        let mut state = RunState::new(self.config.step_budget);
        let ctx = RunContext {
            surface,
            cancel,
            extractor: SignatureExtractor::new(),
            detector: StateChangeDetector::new(),
            executor: ActionExecutor::new(self.config.clone()),
            recorder: CaptureRecorder::new(capturer),
        };
        state.phases.push(Phase::Analyzing);

        let (status, error_kind, error) = match self.drive(request, &ctx, &mut state).await {
            Ok(status) => {
                state.enter(Phase::Finalizing);
                let kind = (status == RunStatus::BudgetExceeded).then_some(ErrorKind::BudgetExceeded);
                (status, kind, None)
            }
            Err(err) => {
                error!(kind = %err.kind(), error = %err, "workflow failed");
                state.enter(Phase::Failed);
                (RunStatus::Failed, Some(err.kind()), Some(err.to_string()))
            }
        };

        let outcome = RunOutcome {
            status,
            error_kind,
            error,
            intents: std::mem::take(&mut state.plan),
            executed: state.executed,
            phases: state.phases,
            steps: state.steps.into_records(),
        };
        if let Err(err) = self.generator.publish(request, &outcome).await {
            warn!(error = %err, "documentation generator failed");
        }
        info!(
            status = ?outcome.status,
            steps = outcome.steps.len(),
            executed = outcome.executed,
            "workflow finished"
        );
        outcome
    }

    async fn drive(
        &mut self,
        request: &TaskRequest,
        ctx: &RunContext<'_>,
        state: &mut RunState,
    ) -> Result<RunStatus> {
        let (url, same_app) = self.analyze(request, state).await?;

        state.enter(Phase::Navigating);
        self.navigate(request, ctx, state, &url, same_app).await?;

        state.enter(Phase::Executing);
        self.execute(ctx, state).await
    }

    async fn analyze(&self, request: &TaskRequest, state: &mut RunState) -> Result<(String, bool)> {
        let intents = self
            .planner
            .plan(&request.task, &request.app_name)
            .await
            .map_err(|err| match err {
                WorkflowError::Planning(_) => err,
                other => WorkflowError::Planning(other.to_string()),
            })?;
        if intents.is_empty() {
            return Err(WorkflowError::Planning("planner returned no intents".into()));
        }
        for (idx, intent) in intents.iter().enumerate() {
            intent
                .validate()
                .map_err(|reason| WorkflowError::Planning(format!("intent {}: {reason}", idx + 1)))?;
        }
        info!(intents = intents.len(), "plan ready");

        let same_app = self
            .authenticated_app
            .as_deref()
            .is_some_and(|app| app.trim().eq_ignore_ascii_case(request.app_name.trim()));
        let resolved = if same_app {
            self.resolver.resolve_home(&request.app_name).await
        } else {
            self.resolver.resolve(&request.app_name).await
        };
        let url = resolved.map_err(|err| WorkflowError::Planning(err.to_string()))?;

        state.plan = intents;
        Ok((url, same_app))
    }

    /// Open the app and capture step 0 unconditionally. A leading navigate
    /// intent in the plan is consumed here.
    async fn navigate(
        &mut self,
        request: &TaskRequest,
        ctx: &RunContext<'_>,
        state: &mut RunState,
        base_url: &str,
        same_app: bool,
    ) -> Result<()> {
        let leading = state
            .plan
            .first()
            .filter(|intent| intent.kind == IntentKind::Navigate && !intent.optional);
        let url = leading
            .and_then(Intent::url)
            .unwrap_or(base_url)
            .to_string();
        let consumed = usize::from(leading.is_some());

        info!(%url, same_app, "navigating to app");
        if let Some(detail) = ctx.executor.navigate_to(&url, ctx.surface).await? {
            return Err(WorkflowError::Aborted(format!("could not open {url}: {detail}")));
        }

        let mut observation = ctx.executor.observe(ctx.surface, &ctx.extractor).await?;
        if observation.text_signals.login_required() && !same_app {
            info!(app = %request.app_name, url = %observation.url, "login required, waiting for confirmation");
            self.login
                .wait_for_login(&request.app_name, &observation.url)
                .await;
            info!("login confirmed");
            observation = ctx.executor.observe(ctx.surface, &ctx.extractor).await?;
        }
        self.authenticated_app = Some(request.app_name.clone());

        let initial = signature(&observation);
        ctx.recorder
            .record(
                &mut state.steps,
                ctx.surface,
                ChangeKind::Navigation,
                initial.clone(),
                &observation,
                format!("Initial view of {}", request.app_name),
            )
            .await?;
        state.last_signature = Some(initial);
        state.cursor = consumed;
        Ok(())
    }

    async fn execute(&self, ctx: &RunContext<'_>, state: &mut RunState) -> Result<RunStatus> {
        let pending = state.plan[state.cursor..].to_vec();
        let threshold = self.config.abort_after_failures.max(1);

        for intent in &pending {
            if ctx.cancel.is_cancelled() {
                warn!(executed = state.executed, "run cancelled");
                return Ok(RunStatus::Cancelled);
            }
            if state.remaining_budget == 0 {
                warn!(budget = self.config.step_budget, "step budget exhausted");
                return Ok(RunStatus::BudgetExceeded);
            }
            state.remaining_budget -= 1;
            state.executed += 1;
            state.cursor += 1;

            let result = ctx.executor.apply(intent, ctx.surface, &ctx.extractor).await?;
            let (current, kind) = match &state.last_signature {
                Some(previous) => ctx.detector.classify(previous, &result.observation),
                None => (signature(&result.observation), ChangeKind::Navigation),
            };

            if kind.is_change() {
                let description = match (result.succeeded, &result.detail) {
                    (false, Some(detail)) => format!("{} (failed: {detail})", intent.describe()),
                    _ => intent.describe(),
                };
                ctx.recorder
                    .record(
                        &mut state.steps,
                        ctx.surface,
                        kind,
                        current.clone(),
                        &result.observation,
                        description,
                    )
                    .await?;
            } else {
                info!(intent = %intent.describe(), "no state change");
            }
            state.last_signature = Some(current);

            if result.succeeded {
                state.consecutive_failures = 0;
            } else if !intent.is_optional() {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= threshold {
                    return Err(WorkflowError::Aborted(format!(
                        "{} consecutive intents failed, last: {}",
                        state.consecutive_failures,
                        result.detail.unwrap_or_else(|| intent.describe())
                    )));
                }
            }
        }
        Ok(RunStatus::Completed)
    }
}
