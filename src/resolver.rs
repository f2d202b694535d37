//! App name to base URL resolution.

use async_trait::async_trait;

use crate::errors::Result;

const LOGIN_PATHS: &[&str] = &["/login", "/signin", "/sign-in", "/auth"];

/// Resolves an application name to the URL the run starts from.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Entry URL for a first visit, usually the login page.
    async fn resolve(&self, app_name: &str) -> Result<String>;

    /// Entry URL when the app was already visited in this session.
    async fn resolve_home(&self, app_name: &str) -> Result<String> {
        Ok(home_url(&self.resolve(app_name).await?))
    }
}

/// Built-in table of well-known apps with a `https://{app}.com/login`
/// fallback.
#[derive(Debug, Default, Clone)]
pub struct StaticUrlResolver {
    overrides: Vec<(String, String)>,
}

impl StaticUrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the URL for `app_name`.
    pub fn with_app(mut self, app_name: &str, url: impl Into<String>) -> Self {
        let key = app_key(app_name);
        self.overrides.retain(|(k, _)| *k != key);
        self.overrides.push((key, url.into()));
        self
    }

    pub fn lookup(&self, app_name: &str) -> String {
        let key = app_key(app_name);
        if let Some((_, url)) = self.overrides.iter().find(|(k, _)| *k == key) {
            return url.clone();
        }
        let known = match key.as_str() {
            "linear" => Some("https://linear.app/login"),
            "notion" => Some("https://www.notion.so/login"),
            "asana" => Some("https://app.asana.com/login"),
            _ => None,
        };
        if let Some(url) = known {
            return url.to_string();
        }
        let family = [
            ("trello", "https://trello.com/login"),
            ("jira", "https://id.atlassian.com/login"),
            ("github", "https://github.com/login"),
            ("slack", "https://slack.com/signin#/signin"),
            ("figma", "https://figma.com/login"),
        ];
        family
            .iter()
            .find(|(needle, _)| key.contains(needle))
            .map(|(_, url)| url.to_string())
            .unwrap_or_else(|| format!("https://{key}.com/login"))
    }
}

#[async_trait]
impl UrlResolver for StaticUrlResolver {
    async fn resolve(&self, app_name: &str) -> Result<String> {
        Ok(self.lookup(app_name))
    }
}

fn app_key(app_name: &str) -> String {
    app_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Strip the login path (and any query) from a login URL.
pub fn home_url(login_url: &str) -> String {
    for path in LOGIN_PATHS {
        if let Some(idx) = login_url.find(path) {
            let base = &login_url[..idx];
            return base.split('?').next().unwrap_or(base).to_string();
        }
    }
    login_url.to_string()
}
