#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ui_workflow_capture::errors::Result;
use ui_workflow_capture::orchestrator::RunOutcome;
use ui_workflow_capture::types::ScreenshotHandle;
use ui_workflow_capture::{
    CaptureRequest, Config, DocumentationGenerator, Intent, Interaction, LiveSurface, LoginGate,
    Orchestrator, Planner, ScreenshotCapturer, StaticUrlResolver, SurfaceError, SurfaceNode,
    SurfaceSnapshot, TaskRequest, WorkflowError,
};

pub const APP_URL: &str = "https://tracker.test/login";
pub const HOME_URL: &str = "https://tracker.test";

#[derive(Default)]
pub struct Inner {
    pub current: SurfaceSnapshot,
    pub pages: HashMap<String, SurfaceSnapshot>,
    pub reactions: HashMap<String, SurfaceSnapshot>,
    pub rejected: HashSet<String>,
    pub vanish_on: HashSet<String>,
    pub transient_failures: u32,
    pub unreadable_after_interact: u32,
    pub pending_unreadable: u32,
    pub refuse_navigation: bool,
    pub unavailable: bool,
    pub interactions: Vec<(String, Interaction)>,
    pub navigations: Vec<String>,
    pub snapshots: usize,
    pub screenshots: usize,
}

/// In-memory surface driven by a script of pages and click reactions.
#[derive(Default)]
pub struct ScriptedSurface {
    pub inner: Mutex<Inner>,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, snapshot: SurfaceSnapshot) -> Self {
        self.inner.lock().unwrap().pages.insert(url.to_string(), snapshot);
        self
    }

    pub fn on_interact(self, handle: &str, snapshot: SurfaceSnapshot) -> Self {
        self.inner
            .lock()
            .unwrap()
            .reactions
            .insert(handle.to_string(), snapshot);
        self
    }

    pub fn reject(self, handle: &str) -> Self {
        self.inner.lock().unwrap().rejected.insert(handle.to_string());
        self
    }

    /// Interacting with `handle` makes the surface unreachable.
    pub fn vanish_on(self, handle: &str) -> Self {
        self.inner.lock().unwrap().vanish_on.insert(handle.to_string());
        self
    }

    pub fn transient_failures(self, count: u32) -> Self {
        self.inner.lock().unwrap().transient_failures = count;
        self
    }

    /// After each successful interaction the next `count` snapshots fail as
    /// if the page were still navigating.
    pub fn unreadable_after_interact(self, count: u32) -> Self {
        self.inner.lock().unwrap().unreadable_after_interact = count;
        self
    }

    /// Every navigation fails, as when the host does not resolve.
    pub fn refuse_navigation(self) -> Self {
        self.inner.lock().unwrap().refuse_navigation = true;
        self
    }

    pub fn set_current(&self, snapshot: SurfaceSnapshot) {
        self.inner.lock().unwrap().current = snapshot;
    }

    pub fn interactions(&self) -> Vec<(String, Interaction)> {
        self.inner.lock().unwrap().interactions.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.inner.lock().unwrap().navigations.clone()
    }

    pub fn snapshots(&self) -> usize {
        self.inner.lock().unwrap().snapshots
    }

    pub fn screenshots(&self) -> usize {
        self.inner.lock().unwrap().screenshots
    }
}

#[async_trait]
impl LiveSurface for ScriptedSurface {
    async fn snapshot(&self) -> std::result::Result<SurfaceSnapshot, SurfaceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unavailable {
            return Err(SurfaceError::Unavailable("tab closed".into()));
        }
        inner.snapshots += 1;
        if inner.pending_unreadable > 0 {
            inner.pending_unreadable -= 1;
            return Err(SurfaceError::Interrupted(
                "execution context was destroyed".into(),
            ));
        }
        Ok(inner.current.clone())
    }

    async fn navigate(&self, url: &str) -> std::result::Result<(), SurfaceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unavailable {
            return Err(SurfaceError::Unavailable("tab closed".into()));
        }
        inner.navigations.push(url.to_string());
        if inner.refuse_navigation {
            return Err(SurfaceError::Rejected("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        inner.current = inner
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| SurfaceSnapshot::new(url));
        Ok(())
    }

    async fn interact(
        &self,
        handle: &str,
        interaction: &Interaction,
    ) -> std::result::Result<(), SurfaceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unavailable {
            return Err(SurfaceError::Unavailable("tab closed".into()));
        }
        inner.interactions.push((handle.to_string(), interaction.clone()));
        if inner.transient_failures > 0 {
            inner.transient_failures -= 1;
            return Err(SurfaceError::Detached(handle.to_string()));
        }
        // A rejected control can still change the page, e.g. an inline error.
        if let Some(next) = inner.reactions.get(handle).cloned() {
            inner.current = next;
        }
        if inner.rejected.contains(handle) {
            return Err(SurfaceError::Rejected(format!("{handle} is disabled")));
        }
        if inner.vanish_on.contains(handle) {
            inner.unavailable = true;
            return Ok(());
        }
        inner.pending_unreadable = inner.unreadable_after_interact;
        Ok(())
    }

    async fn screenshot(&self) -> std::result::Result<Vec<u8>, SurfaceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

/// Keeps capture requests in memory.
#[derive(Default)]
pub struct MemoryCapturer {
    pub requests: Mutex<Vec<CaptureRequest>>,
}

#[async_trait]
impl ScreenshotCapturer for MemoryCapturer {
    async fn capture(
        &self,
        surface: &dyn LiveSurface,
        request: &CaptureRequest,
    ) -> std::result::Result<ScreenshotHandle, SurfaceError> {
        surface.screenshot().await?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(ScreenshotHandle(format!("mem://{}", request.file_name())))
    }
}

/// Stores the first `succeed` screenshots, then reports a full disk.
pub struct FailingCapturer {
    pub succeed: usize,
    pub taken: Mutex<usize>,
}

impl FailingCapturer {
    pub fn after(succeed: usize) -> Self {
        Self {
            succeed,
            taken: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ScreenshotCapturer for FailingCapturer {
    async fn capture(
        &self,
        surface: &dyn LiveSurface,
        request: &CaptureRequest,
    ) -> std::result::Result<ScreenshotHandle, SurfaceError> {
        surface.screenshot().await?;
        let mut taken = self.taken.lock().unwrap();
        if *taken >= self.succeed {
            return Err(SurfaceError::Storage("disk full".into()));
        }
        *taken += 1;
        Ok(ScreenshotHandle(format!("mem://{}", request.file_name())))
    }
}

pub struct StaticPlanner {
    pub intents: std::result::Result<Vec<Intent>, String>,
}

impl StaticPlanner {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self {
            intents: Ok(intents),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            intents: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(&self, _task: &str, _app_name: &str) -> Result<Vec<Intent>> {
        self.intents.clone().map_err(WorkflowError::Planning)
    }
}

/// Simulates a human logging in: swaps the page to `after` when asked.
pub struct ScriptedLogin {
    pub surface: Arc<ScriptedSurface>,
    pub after: SurfaceSnapshot,
    pub calls: Mutex<Vec<String>>,
    pub screenshots_during_wait: Mutex<Vec<usize>>,
}

impl ScriptedLogin {
    pub fn new(surface: Arc<ScriptedSurface>, after: SurfaceSnapshot) -> Self {
        Self {
            surface,
            after,
            calls: Mutex::new(Vec::new()),
            screenshots_during_wait: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LoginGate for ScriptedLogin {
    async fn wait_for_login(&self, app_name: &str, _url: &str) {
        self.calls.lock().unwrap().push(app_name.to_string());
        self.screenshots_during_wait
            .lock()
            .unwrap()
            .push(self.surface.screenshots());
        self.surface.set_current(self.after.clone());
    }
}

pub struct NoLogin;

#[async_trait]
impl LoginGate for NoLogin {
    async fn wait_for_login(&self, app_name: &str, _url: &str) {
        panic!("unexpected login wait for {app_name}");
    }
}

#[derive(Default)]
pub struct RecordingGenerator {
    pub published: Mutex<Vec<RunOutcome>>,
}

#[async_trait]
impl DocumentationGenerator for RecordingGenerator {
    async fn publish(&self, _request: &TaskRequest, outcome: &RunOutcome) -> Result<()> {
        self.published.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

pub fn button(handle: &str, name: &str) -> SurfaceNode {
    SurfaceNode::new(handle, "button").with_name(name).interactive()
}

/// Tracker home page: two buttons and a heading.
pub fn home() -> SurfaceSnapshot {
    SurfaceSnapshot::new(HOME_URL)
        .with_node(SurfaceNode::new("", "h1").with_text("My issues"))
        .with_node(button("e1", "New issue"))
        .with_node(button("e2", "Refresh"))
}

/// Home page with the "new issue" dialog open.
pub fn home_with_dialog() -> SurfaceSnapshot {
    home()
        .with_node(SurfaceNode::new("", "div").with_role("dialog"))
        .with_node(
            SurfaceNode::new("e3", "input")
                .with_placeholder("Issue title")
                .interactive(),
        )
}

pub fn resolver() -> Arc<StaticUrlResolver> {
    Arc::new(StaticUrlResolver::new().with_app("Tracker", APP_URL))
}

pub fn orchestrator(
    config: Config,
    planner: StaticPlanner,
    login: Arc<dyn LoginGate>,
    generator: Arc<RecordingGenerator>,
) -> Orchestrator {
    Orchestrator::new(config, Arc::new(planner), resolver(), login, generator)
}

pub fn request() -> TaskRequest {
    TaskRequest::new("Create an issue", "Tracker")
}
