use super::{CompletionRequest, CompletionResponse, CompletionService};
use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the OpenAI Responses endpoint.
pub struct OpenAiResponses {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    id: String,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl OpenAiResponses {
    pub fn new(config: &Config, api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: config.openai_api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

fn request_body(request: &CompletionRequest) -> Value {
    let mut content = vec![json!({ "type": "input_text", "text": request.text })];
    content.extend(request.image_urls.iter().map(|url| {
        json!({ "type": "input_image", "image_url": url, "detail": "auto" })
    }));

    let mut body = json!({
        "model": request.model,
        "instructions": request.instructions,
        "input": [{ "role": "user", "content": content }],
    });
    if let Some(previous) = &request.previous_response_id {
        body["previous_response_id"] = json!(previous);
    }
    body
}

/// Concatenated text parts of every output message.
fn output_text(body: &ResponseBody) -> String {
    body.output
        .iter()
        .flat_map(|item| &item.content)
        .filter(|part| part.kind == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect()
}

#[async_trait]
impl CompletionService for OpenAiResponses {
    async fn respond(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        debug!(
            model = %request.model,
            continued = request.previous_response_id.is_some(),
            images = request.image_urls.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(format!("{}/responses", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request_body(&request))
            .send()
            .await
            .context("Completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "Completion API error");
            anyhow::bail!("Completion API error HTTP {status}: {body_text}");
        }

        let body: ResponseBody = response
            .json()
            .await
            .context("Invalid completion response")?;

        Ok(CompletionResponse {
            output_text: output_text(&body),
            id: body.id,
        })
    }
}
