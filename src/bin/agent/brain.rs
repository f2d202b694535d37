use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use ui_workflow_capture::errors::Result as WorkflowResult;
use ui_workflow_capture::{Intent, Planner, WorkflowError};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = r#"You plan UI walkthroughs for web applications. Given a task and an app name, list the user actions needed to accomplish the task in that app, starting from the app's home screen after login.

Return ONLY a JSON array. Each element is one action:
- {"kind":"click","target":"New project"}
- {"kind":"fill","target":"Project name","payload":"Q3 Roadmap"}
- {"kind":"select","target":"Priority","payload":"High"}
- {"kind":"navigate","target":"https://app.example.com/settings"}
- {"kind":"wait","target":"project page to load"}

Rules:
1. "target" is the visible label, button text, or placeholder of the element, as a user would read it on screen.
2. Add "optional": true for steps that may not appear (confirmation dialogs, onboarding tips).
3. Fill every required form field before clicking the submit button.
4. Do not include login steps. The user is already signed in.
5. Keep the plan short: 3 to 12 actions. No markdown, no explanation."#;

/// Planner backed by an OpenAI-compatible chat completion endpoint.
pub struct LlmPlanner {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanReply {
    Steps(Vec<Intent>),
    Wrapped { steps: Vec<Intent> },
}

impl LlmPlanner {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY not set in environment"))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        info!(%model, "planner ready");
        Ok(Self {
            client: Client::new(),
            api_key,
            model,
        })
    }

    async fn complete(&self, task: &str, app_name: &str) -> Result<String> {
        let response = self
            .client
            .post(ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": format!("App: {app_name}\nTask: {task}")},
                ],
                "temperature": 0.2,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown API error");
            warn!(%status, message, "planner API error");
            return Err(anyhow!("OpenAI API error ({status}): {message}"));
        }

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow!("no content in LLM response: {body}"))
    }
}

/// Strip markdown fences the model might add and parse the intent list.
pub fn parse_plan(content: &str) -> Result<Vec<Intent>> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let reply: PlanReply = serde_json::from_str(cleaned)
        .map_err(|e| anyhow!("failed to parse plan: {e}. Content: {cleaned}"))?;
    Ok(match reply {
        PlanReply::Steps(steps) | PlanReply::Wrapped { steps } => steps,
    })
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, task: &str, app_name: &str) -> WorkflowResult<Vec<Intent>> {
        let content = self
            .complete(task, app_name)
            .await
            .map_err(|e| WorkflowError::Planning(format!("{e:#}")))?;
        debug!(%content, "planner reply");
        let intents = parse_plan(&content).map_err(|e| WorkflowError::Planning(format!("{e:#}")))?;
        info!(count = intents.len(), "plan received");
        Ok(intents)
    }
}
