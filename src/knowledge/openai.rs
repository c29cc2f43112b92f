//! `OpenAI`-compatible chat-completions answer generation

use super::{AnswerDetail, AnswerService, KnowledgeError, Monument};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for the chat-completions backend
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Answer service backed by `/chat/completions`
pub struct OpenAiAnswers {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiAnswers {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
        }
    }

    fn translate_request(&self, query: &str, matches: &[Monument], detail: AnswerDetail) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(query, matches, detail),
            }],
            temperature: Some(0.3),
        }
    }

    fn normalize_response(resp: ChatResponse) -> Result<String, KnowledgeError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::unknown("No choices in response"))?;

        let text = choice.message.content.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(KnowledgeError::unknown("Empty answer in response"));
        }
        Ok(text.to_string())
    }
}

/// Build the prompt sent to the model
pub fn build_prompt(query: &str, matches: &[Monument], detail: AnswerDetail) -> String {
    let context = matches
        .iter()
        .map(Monument::context_line)
        .collect::<Vec<_>>()
        .join("\n");

    match detail {
        AnswerDetail::Brief => format!(
            "Using the information below, answer concisely.\n\n\
             User: {query}\n\nInformation:\n{context}\n\nBot:"
        ),
        AnswerDetail::Detailed => format!(
            "Using the information below, write a detailed visitor's guide.\n\n\
             User: {query}\nPlease give me a more detailed guide.\n\n\
             Information:\n{context}\n\nBot:"
        ),
    }
}

#[async_trait]
impl AnswerService for OpenAiAnswers {
    async fn compose(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError> {
        let request = self.translate_request(query, matches, detail);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| KnowledgeError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| KnowledgeError::unknown(format!("Invalid response body: {e}")))?;

        Self::normalize_response(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
