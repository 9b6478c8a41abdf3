use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::Result;

#[derive(Serialize)]
struct RunRequest {
    task: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<RunResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub evaluation: Option<Evaluation>,
    #[serde(default)]
    pub action_results: Option<ActionResults>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionResults {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Serialize)]
struct ExecuteRequest {
    code: String,
    language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<ExecuteResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResult {
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Pick the chat reply for an agent response. Priority: evaluation feedback,
/// then action message, then action output, then a generic notice.
pub fn agent_reply(response: &RunResponse) -> String {
    if !response.success {
        let detail = response.error.as_deref().unwrap_or("unknown error");
        return format!("An error occurred: {detail}");
    }

    let result = response.result.clone().unwrap_or_default();

    // Empty strings count as absent, matching the server's optional fields
    if let Some(feedback) = result
        .evaluation
        .and_then(|e| e.feedback)
        .filter(|s| !s.is_empty())
    {
        return feedback;
    }

    match result.action_results {
        Some(actions) => actions
            .message
            .filter(|s| !s.is_empty())
            .or(actions.output.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "Task executed.".to_string()),
        None => "Task received.".to_string(),
    }
}

#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn run_task(&self, task: &str, api_key: &str) -> Result<RunResponse> {
        let url = format!("{}/api/run", self.base_url);

        let request = RunRequest {
            task: task.to_string(),
            api_key: api_key.to_string(),
        };

        // The server reports logical failures as a JSON body with a non-2xx
        // status, so the body is parsed regardless of the status code.
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        let run_response: RunResponse = response.json().await?;
        Ok(run_response)
    }

    pub async fn execute_code(&self, code: &str, language: &str) -> Result<ExecuteResponse> {
        let url = format!("{}/api/execute_code", self.base_url);

        let request = ExecuteRequest {
            code: code.to_string(),
            language: language.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        let execute_response: ExecuteResponse = response.json().await?;
        Ok(execute_response)
    }
}
