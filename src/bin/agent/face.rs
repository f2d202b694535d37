use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ui_workflow_capture::types::ScreenshotHandle;
use ui_workflow_capture::{
    CaptureRequest, LiveSurface, LoginGate, RunOutcome, RunStatus, ScreenshotCapturer,
    SurfaceError, TaskRequest,
};

/// Events streamed to the browser via SSE.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    Started { task: String, app: String },
    Step { number: usize, kind: String, description: String, screenshot: String },
    LoginRequired { app: String, url: String },
    TaskComplete { status: String, steps: usize, output: String },
    TaskError { message: String },
    Ready,
}

impl AgentEvent {
    fn to_sse_event(&self) -> Event {
        let (name, data) = match self {
            AgentEvent::Started { task, app } => ("started", json!({"task": task, "app": app})),
            AgentEvent::Step {
                number,
                kind,
                description,
                screenshot,
            } => (
                "step",
                json!({
                    "number": number,
                    "kind": kind,
                    "description": description,
                    "screenshot": screenshot,
                }),
            ),
            AgentEvent::LoginRequired { app, url } => {
                ("login_required", json!({"app": app, "url": url}))
            }
            AgentEvent::TaskComplete {
                status,
                steps,
                output,
            } => (
                "task_complete",
                json!({"status": status, "steps": steps, "output": output}),
            ),
            AgentEvent::TaskError { message } => ("task_error", json!({"message": message})),
            AgentEvent::Ready => ("ready", json!({})),
        };
        Event::default().event(name).data(data.to_string())
    }

    /// Terminal event for a finished run.
    pub fn finished(outcome: &RunOutcome, output: String) -> Self {
        match outcome.status {
            RunStatus::Failed => AgentEvent::TaskError {
                message: outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "workflow failed".to_string()),
            },
            status => AgentEvent::TaskComplete {
                status: format!("{status:?}"),
                steps: outcome.steps.len(),
                output,
            },
        }
    }
}

/// Cancellation token of the run in flight, if any.
#[derive(Clone, Default)]
pub struct CancelSlot(Arc<Mutex<Option<CancellationToken>>>);

impl CancelSlot {
    /// Install a fresh token for a new run.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(token.clone());
        }
        token
    }

    pub fn disarm(&self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
    }

    fn cancel(&self) -> bool {
        match self.0.lock() {
            Ok(slot) => slot.as_ref().map(|token| token.cancel()).is_some(),
            Err(_) => false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub task_tx: mpsc::Sender<TaskRequest>,
    pub login_tx: mpsc::Sender<()>,
    pub event_tx: broadcast::Sender<AgentEvent>,
    pub cancel: CancelSlot,
}

#[derive(Deserialize)]
struct TaskPayload {
    task: String,
    app: String,
}

/// Everything the run loop needs from the web side.
pub struct Server {
    pub tasks: mpsc::Receiver<TaskRequest>,
    pub events: broadcast::Sender<AgentEvent>,
    pub login: WebLoginGate,
    pub cancel: CancelSlot,
}

/// Start the web server on localhost:3000 (or the next free port up to 3009).
pub async fn start_server() -> Result<Server> {
    let (task_tx, tasks) = mpsc::channel::<TaskRequest>(1);
    let (login_tx, login_rx) = mpsc::channel::<()>(4);
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);
    let cancel = CancelSlot::default();

    let state = Arc::new(AppState {
        task_tx,
        login_tx,
        event_tx: event_tx.clone(),
        cancel: cancel.clone(),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/task", post(task_handler))
        .route("/login-confirmed", post(login_handler))
        .route("/cancel", post(cancel_handler))
        .route("/events", get(sse_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state);

    let mut bound = None;
    for port in 3000..3010 {
        if let Ok(listener) = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await {
            bound = Some((listener, port));
            break;
        }
    }
    let (listener, port) = bound
        .ok_or_else(|| anyhow!("could not bind to any port 3000-3009, stop the old agent first"))?;

    info!("web UI running at http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "web server stopped");
        }
    });

    Ok(Server {
        tasks,
        login: WebLoginGate {
            events: event_tx.clone(),
            confirmations: tokio::sync::Mutex::new(login_rx),
        },
        events: event_tx,
        cancel,
    })
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn task_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TaskPayload>,
) -> (StatusCode, &'static str) {
    let task = payload.task.trim();
    let app = payload.app.trim();
    if task.is_empty() || app.is_empty() {
        return (StatusCode::BAD_REQUEST, "task and app are required");
    }
    info!(task, app, "task submitted");
    match state.task_tx.try_send(TaskRequest::new(task, app)) {
        Ok(()) => (StatusCode::ACCEPTED, "queued"),
        Err(_) => (StatusCode::CONFLICT, "a task is already running"),
    }
}

async fn login_handler(State(state): State<Arc<AppState>>) -> &'static str {
    info!("login confirmed from web UI");
    let _ = state.login_tx.try_send(());
    "ok"
}

async fn cancel_handler(State(state): State<Arc<AppState>>) -> &'static str {
    if state.cancel.cancel() {
        info!("cancellation requested");
        "cancelling"
    } else {
        "idle"
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream =
        BroadcastStream::new(rx).filter_map(|result: Result<AgentEvent, _>| match result {
            Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
            Err(_) => None,
        });
    Sse::new(stream)
}

/// Suspends the run until the user presses "I'm logged in" in the web UI.
pub struct WebLoginGate {
    events: broadcast::Sender<AgentEvent>,
    confirmations: tokio::sync::Mutex<mpsc::Receiver<()>>,
}

#[async_trait]
impl LoginGate for WebLoginGate {
    async fn wait_for_login(&self, app_name: &str, url: &str) {
        let mut confirmations = self.confirmations.lock().await;
        // Drop clicks that arrived while no login was pending.
        while confirmations.try_recv().is_ok() {}
        let _ = self.events.send(AgentEvent::LoginRequired {
            app: app_name.to_string(),
            url: url.to_string(),
        });
        if confirmations.recv().await.is_none() {
            warn!("login confirmation channel closed");
        }
    }
}

/// Forwards every captured step to the web UI.
pub struct NotifyingCapturer {
    inner: Arc<dyn ScreenshotCapturer>,
    events: broadcast::Sender<AgentEvent>,
}

impl NotifyingCapturer {
    pub fn new(inner: Arc<dyn ScreenshotCapturer>, events: broadcast::Sender<AgentEvent>) -> Self {
        Self { inner, events }
    }
}

#[async_trait]
impl ScreenshotCapturer for NotifyingCapturer {
    async fn capture(
        &self,
        surface: &dyn LiveSurface,
        request: &CaptureRequest,
    ) -> Result<ScreenshotHandle, SurfaceError> {
        let handle = self.inner.capture(surface, request).await?;
        let _ = self.events.send(AgentEvent::Step {
            number: request.ordinal,
            kind: request.kind.to_string(),
            description: request.description.clone(),
            screenshot: handle.to_string(),
        });
        Ok(handle)
    }
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Workflow Capture</title>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body {
    background: #0a0a0f;
    color: #e0e0e0;
    font-family: 'Segoe UI', system-ui, -apple-system, sans-serif;
    height: 100vh;
    display: flex;
    flex-direction: column;
  }
  header {
    padding: 24px 32px;
    border-bottom: 1px solid #1a1a2e;
    display: flex;
    align-items: center;
    gap: 12px;
  }
  header h1 { font-size: 20px; font-weight: 600; color: #fff; }
  header .dot {
    width: 8px; height: 8px;
    border-radius: 50%;
    background: #22c55e;
    animation: pulse 2s infinite;
  }
  header .dot.busy { background: #f59e0b; }
  @keyframes pulse { 0%, 100% { opacity: 1; } 50% { opacity: 0.4; } }
  .main {
    flex: 1;
    display: flex;
    flex-direction: column;
    max-width: 800px;
    width: 100%;
    margin: 0 auto;
    padding: 24px 32px;
    gap: 16px;
    overflow: hidden;
  }
  #log { flex: 1; overflow-y: auto; display: flex; flex-direction: column; gap: 8px; padding-right: 8px; }
  .entry { padding: 10px 14px; border-radius: 8px; font-size: 14px; line-height: 1.5; }
  .entry.user { background: #1a1a2e; border-left: 3px solid #6366f1; }
  .entry.step {
    background: #111118;
    border-left: 3px solid #3b82f6;
    font-family: 'Cascadia Code', 'Fira Code', monospace;
    font-size: 13px;
  }
  .entry.step .num { color: #6366f1; font-weight: 700; margin-right: 8px; }
  .entry.step .kind { color: #94a3b8; margin-left: 8px; }
  .entry.error { background: #1a0a0a; border-left: 3px solid #ef4444; color: #fca5a5; }
  .entry.done { background: #0a1a0a; border-left: 3px solid #22c55e; color: #86efac; }
  .entry.login { background: #1a160a; border-left: 3px solid #f59e0b; color: #fcd34d; }
  .input-area { display: flex; gap: 8px; }
  input {
    background: #111118;
    border: 1px solid #222;
    border-radius: 8px;
    padding: 12px 16px;
    color: #fff;
    font-size: 16px;
    outline: none;
  }
  #task { flex: 1; }
  #app { width: 160px; }
  input:focus { border-color: #6366f1; }
  input:disabled { opacity: 0.5; }
  button {
    background: #6366f1;
    color: #fff;
    border: none;
    border-radius: 8px;
    padding: 12px 20px;
    font-size: 15px;
    font-weight: 600;
    cursor: pointer;
  }
  button:disabled { background: #333; cursor: not-allowed; }
  button.secondary { background: #333; }
  button.warn { background: #b45309; }
</style>
</head>
<body>
  <header>
    <div class="dot" id="status-dot"></div>
    <h1>Workflow Capture</h1>
  </header>
  <div class="main">
    <div id="log"></div>
    <div class="input-area">
      <input type="text" id="app" placeholder="App (e.g. Linear)" />
      <input type="text" id="task" placeholder="How do I ...?" autofocus />
      <button id="send" onclick="send()">Capture</button>
      <button id="cancel" class="secondary" onclick="cancelRun()" disabled>Cancel</button>
    </div>
  </div>
<script>
  const log = document.getElementById('log');
  const task = document.getElementById('task');
  const app = document.getElementById('app');
  const sendBtn = document.getElementById('send');
  const cancelBtn = document.getElementById('cancel');
  const dot = document.getElementById('status-dot');
  let busy = false;

  const esc = s => String(s).replace(/</g, '&lt;');

  function addEntry(cls, html) {
    const div = document.createElement('div');
    div.className = 'entry ' + cls;
    div.innerHTML = html;
    log.appendChild(div);
    log.scrollTop = log.scrollHeight;
    return div;
  }

  function setBusy(b) {
    busy = b;
    task.disabled = b;
    app.disabled = b;
    sendBtn.disabled = b;
    cancelBtn.disabled = !b;
    dot.className = b ? 'dot busy' : 'dot';
    if (!b) task.focus();
  }

  async function send() {
    const t = task.value.trim();
    const a = app.value.trim();
    if (!t || !a || busy) return;
    task.value = '';
    addEntry('user', '<strong>' + esc(a) + ':</strong> ' + esc(t));
    setBusy(true);
    const res = await fetch('/task', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({task: t, app: a}),
    });
    if (!res.ok) {
      addEntry('error', esc(await res.text()));
      setBusy(false);
    }
  }

  async function cancelRun() {
    await fetch('/cancel', { method: 'POST' });
  }

  async function confirmLogin(btn) {
    btn.disabled = true;
    await fetch('/login-confirmed', { method: 'POST' });
  }

  task.addEventListener('keydown', e => { if (e.key === 'Enter') send(); });

  const es = new EventSource('/events');

  es.addEventListener('step', e => {
    const d = JSON.parse(e.data);
    addEntry('step', '<span class="num">Step ' + d.number + '</span>' + esc(d.description)
      + '<span class="kind">' + esc(d.kind) + '</span>');
  });

  es.addEventListener('login_required', e => {
    const d = JSON.parse(e.data);
    const div = addEntry('login', '<strong>Login required for ' + esc(d.app) + '.</strong> '
      + 'Sign in in the browser window, then press the button. ');
    const btn = document.createElement('button');
    btn.className = 'warn';
    btn.textContent = "I'm logged in";
    btn.onclick = () => confirmLogin(btn);
    div.appendChild(btn);
  });

  es.addEventListener('task_complete', e => {
    const d = JSON.parse(e.data);
    addEntry('done', '<strong>' + esc(d.status) + ':</strong> ' + d.steps + ' states captured in ' + esc(d.output));
    setBusy(false);
  });

  es.addEventListener('task_error', e => {
    const d = JSON.parse(e.data);
    addEntry('error', '<strong>Task failed:</strong> ' + esc(d.message));
    setBusy(false);
  });

  es.addEventListener('ready', () => setBusy(false));

  addEntry('done', 'Ready. Name an app and describe a task to capture.');
</script>
</body>
</html>
"##;
