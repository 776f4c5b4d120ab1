use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BackendError, SummaryError};
use crate::models::Provider;
use crate::summarizer::{summary_prompt, SUMMARY_SYSTEM_PROMPT};
use crate::traits::SummaryBackend;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn health_check(&self) -> Result<(), BackendError> {
        let messages = vec![Message {
            role: "user".to_string(),
            content: "Hello".to_string(),
        }];
        self.chat(messages, 5, 1.0).await.map(|_| ())
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &error_text));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| BackendError::Rejected(format!("unparseable OpenAI response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| BackendError::Rejected("OpenAI returned no content".to_string()))
    }
}

#[async_trait]
impl SummaryBackend for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn summarize(&self, title: &str, base_summary: &str) -> Result<String, SummaryError> {
        let messages = vec![
            Message {
                role: "system".to_string(),
                content: SUMMARY_SYSTEM_PROMPT.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: summary_prompt(title, base_summary),
            },
        ];

        Ok(self.chat(messages, 150, 0.5).await?)
    }
}
