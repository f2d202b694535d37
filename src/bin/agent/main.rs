mod brain;
mod dom;
mod face;
mod hands;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use dotenvy::dotenv;
use face::AgentEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use ui_workflow_capture::guide::run_dir;
use ui_workflow_capture::{
    Config, FileScreenshotCapturer, LoginGate, MarkdownGuide, Orchestrator, RunOutcome,
    ScreenshotCapturer, StaticUrlResolver, TaskRequest,
};

#[derive(Parser, Debug)]
#[command(name = "agent", about = "Capture step-by-step UI walkthroughs of web apps")]
struct Cli {
    /// Task to capture. Without it the web UI is started instead.
    #[arg(long, requires = "app")]
    task: Option<String>,

    /// Application the task runs in (e.g. Linear, Notion).
    #[arg(long)]
    app: Option<String>,

    /// Maximum number of planned actions to execute.
    #[arg(long)]
    step_budget: Option<usize>,

    /// Run Chrome without a window.
    #[arg(long)]
    headless: bool,

    /// Root directory for screenshots and guides.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(budget) = self.step_budget {
            config.step_budget = budget;
        }
        if self.headless {
            config.headless = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = cli.config();
    info!(?config, "starting workflow capture agent");

    let planner = Arc::new(brain::LlmPlanner::from_env()?);
    let resolver = Arc::new(StaticUrlResolver::new());
    let guide = Arc::new(MarkdownGuide::new(&config.output_dir));

    // Launching can take a while and blocks on CDP, keep it off the runtime.
    let launch_config = config.clone();
    let surface = tokio::task::spawn_blocking(move || hands::ChromeSurface::launch(&launch_config))
        .await
        .context("browser launch panicked")??;

    match cli.task {
        Some(task) => {
            let app = cli.app.unwrap_or_default();
            let mut orchestrator =
                Orchestrator::new(config.clone(), planner, resolver, Arc::new(ConsoleLogin), guide);
            let request = TaskRequest::new(task, app);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing current intent");
                    on_interrupt.cancel();
                }
            });

            let dir = run_dir(&config.output_dir, &request.app_name, &request.task);
            let capturer: Arc<dyn ScreenshotCapturer> = Arc::new(FileScreenshotCapturer::new(&dir));
            let outcome = orchestrator.run(&request, &surface, capturer, &cancel).await;
            report(&outcome, &dir);
        }
        None => {
            let mut server = face::start_server().await?;
            let login = Arc::new(server.login);
            let mut orchestrator = Orchestrator::new(config.clone(), planner, resolver, login, guide);
            info!("waiting for tasks from the web UI");

            while let Some(request) = server.tasks.recv().await {
                let _ = server.events.send(AgentEvent::Started {
                    task: request.task.clone(),
                    app: request.app_name.clone(),
                });
                let dir = run_dir(&config.output_dir, &request.app_name, &request.task);
                let capturer: Arc<dyn ScreenshotCapturer> = Arc::new(face::NotifyingCapturer::new(
                    Arc::new(FileScreenshotCapturer::new(&dir)),
                    server.events.clone(),
                ));

                let cancel = server.cancel.arm();
                let outcome = orchestrator.run(&request, &surface, capturer, &cancel).await;
                server.cancel.disarm();

                report(&outcome, &dir);
                let _ = server
                    .events
                    .send(AgentEvent::finished(&outcome, dir.display().to_string()));
                let _ = server.events.send(AgentEvent::Ready);
            }
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install tracing subscriber")
}

fn report(outcome: &RunOutcome, dir: &std::path::Path) {
    info!(
        status = ?outcome.status,
        steps = outcome.steps.len(),
        executed = outcome.executed,
        output = %dir.display(),
        "run finished"
    );
    if let Some(error) = &outcome.error {
        warn!(kind = ?outcome.error_kind, %error, "run ended with an error");
    }
}

/// Terminal login gate: the user signs in in the browser window, then
/// presses Enter.
struct ConsoleLogin;

#[async_trait]
impl LoginGate for ConsoleLogin {
    async fn wait_for_login(&self, app_name: &str, url: &str) {
        eprintln!("Login required for {app_name} at {url}.");
        eprintln!("Sign in in the browser window, then press Enter to continue...");
        let mut line = String::new();
        if let Err(err) = BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            warn!(error = %err, "could not read confirmation from stdin, continuing");
        }
    }
}
