//! Chat-completion API client.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, info};

use crate::{Config, Error, Result};

/// A chat message sent to the model.
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Something that turns a system prompt and a user message into a reply.
pub trait Completion: Send + Sync {
    fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct CompletionClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(http_client: reqwest::Client, config: &Config, api_key: String) -> Self {
        Self {
            http_client,
            base_url: config.completion_base_url.clone(),
            model: config.completion_model.clone(),
            api_key,
        }
    }
}

/// Text of the first choice.
fn first_choice(body: &[u8]) -> Result<String> {
    let response: CompletionResponse = serde_json::from_slice(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::Completion("Response has no choices".to_string()))
}

impl Completion for CompletionClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_message },
            ],
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            error!(status = %status, "Completion request failed");
            return Err(Error::Completion(format!(
                "Completion API returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        let reply = first_choice(&body)?;
        info!(model = %self.model, reply_len = reply.len(), "Completion received");
        Ok(reply)
    }
}
