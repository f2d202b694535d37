use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use ui_workflow_capture::{Config, Interaction, LiveSurface, SurfaceError, SurfaceSnapshot};

use crate::dom;

const DEBUG_ENDPOINT: &str = "http://127.0.0.1:9222";

/// Persistent browser session. Created once, reused for all tasks so that a
/// login survives between runs against the same app.
pub struct ChromeSurface {
    _browser: Browser,
    tab: Arc<Tab>,
    settle: Duration,
}

impl ChromeSurface {
    pub fn launch(config: &Config) -> Result<Self> {
        let settle = config.settle();

        // Attach to a Chrome started with --remote-debugging-port=9222 if there is one.
        info!(endpoint = DEBUG_ENDPOINT, "attempting to attach to existing Chrome");
        if let Ok(browser) = Browser::connect(DEBUG_ENDPOINT.to_string()) {
            let existing = browser
                .get_tabs()
                .lock()
                .map_err(|_| anyhow!("tab list lock poisoned"))?
                .first()
                .cloned();
            let tab = match existing {
                Some(tab) => tab,
                None => browser.new_tab()?,
            };
            info!("attached to existing Chrome");
            return Ok(Self {
                _browser: browser,
                tab,
                settle,
            });
        }

        // Dedicated profile so logins persist between agent runs.
        let profile = profile_dir()?;
        std::fs::create_dir_all(&profile)
            .with_context(|| format!("creating browser profile at {}", profile.display()))?;
        info!(profile = %profile.display(), headless = config.headless, "launching Chrome");

        let options = LaunchOptions {
            headless: config.headless,
            user_data_dir: Some(profile),
            window_size: Some((1440, 900)),
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                std::ffi::OsStr::new("--disable-infobars"),
                std::ffi::OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| anyhow!("browser launch failed: {e}"))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
            settle,
        })
    }

    /// Run a blocking CDP call off the async runtime.
    async fn blocking<T, F>(&self, op: F) -> Result<T, SurfaceError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| SurfaceError::Unavailable(format!("browser task panicked: {e}")))?
            .map_err(classify_error)
    }
}

fn profile_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| anyhow!("no local data directory"))?;
    Ok(base.join("ui-workflow-capture").join("chrome-profile"))
}

fn selector(handle: &str) -> String {
    format!("[data-eid=\"{handle}\"]")
}

/// Map a CDP failure onto the engine's retry classes.
fn classify_error(err: anyhow::Error) -> SurfaceError {
    let message = format!("{err:#}");
    let lower = message.to_lowercase();
    if lower.contains("connection is closed")
        || lower.contains("target closed")
        || lower.contains("no such target")
        || lower.contains("browser closed")
    {
        SurfaceError::Unavailable(message)
    } else if lower.contains("no node")
        || lower.contains("detached")
        || lower.contains("could not find node")
        || lower.contains("not attached")
    {
        SurfaceError::Detached(message)
    } else if lower.contains("navigat") || lower.contains("timed out") || lower.contains("timeout") {
        SurfaceError::Interrupted(message)
    } else {
        SurfaceError::Rejected(message)
    }
}

#[async_trait]
impl LiveSurface for ChromeSurface {
    async fn snapshot(&self) -> Result<SurfaceSnapshot, SurfaceError> {
        self.blocking(|tab| dom::capture_snapshot(tab)).await
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            tab.wait_for_element("body")?;
            Ok(())
        })
        .await
    }

    async fn interact(&self, handle: &str, interaction: &Interaction) -> Result<(), SurfaceError> {
        let selector = selector(handle);
        let interaction = interaction.clone();
        self.blocking(move |tab| {
            let element = tab.find_element(&selector)?;
            match interaction {
                Interaction::Click => {
                    element.scroll_into_view()?;
                    element.click()?;
                }
                Interaction::Fill(text) => {
                    element.scroll_into_view()?;
                    element.click()?;
                    element.call_js_fn(dom::CLEAR_VALUE_JS, vec![], false)?;
                    tab.type_str(&text)?;
                }
                Interaction::Select(option) => {
                    let result =
                        element.call_js_fn(dom::SELECT_OPTION_JS, vec![json!(option)], false)?;
                    let picked = result.value.and_then(|v| v.as_bool()).unwrap_or(false);
                    if !picked {
                        anyhow::bail!("option '{option}' not available in {selector}");
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        self.blocking(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }
}
