use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{ChatClient, DeltaSink};
use crate::error::LlmError;
use crate::sse::{parse_sse_line, LineBuffer, SseEvent};
use crate::types::{ChatMessage, Completion, CompletionRequest, TokenUsage};
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─── OpenAiClient ─────────────────────────────────────────────────────────

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// `base_url` may already name the full endpoint.
    fn chat_completions_url(&self) -> String {
        if self.base_url.ends_with("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let body = ApiRequest {
            model: &request.options.model,
            messages: &request.messages,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream,
        };

        let mut builder = self.client.post(self.chat_completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            model = %request.options.model,
            messages = request.messages.len(),
            stream,
            "sending chat completion"
        );
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let response = self.send(&request, false).await?;
        let text = response.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&text).map_err(|source| LlmError::Parse {
            payload: text.clone(),
            source,
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;
        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = parsed.usage.unwrap_or_default();
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "chat completion finished"
        );
        Ok(Completion {
            content,
            finish_reason: choice.finish_reason,
            model: parsed.model.unwrap_or(request.options.model),
            usage,
        })
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<Completion> {
        if !request.options.stream {
            let completion = self.complete(request).await?;
            on_delta(&completion.content);
            return Ok(completion);
        }

        let response = self.send(&request, true).await?;
        let mut bytes = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut state = StreamState::default();

        'read: while let Some(chunk) = bytes.next().await {
            for line in lines.push(&chunk?) {
                if state.apply(&line, &mut *on_delta)? {
                    break 'read;
                }
            }
        }
        if !state.done {
            if let Some(line) = lines.finish() {
                state.apply(&line, &mut *on_delta)?;
            }
        }

        if state.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(Completion {
            content: state.content,
            finish_reason: state.finish_reason,
            model: state.model.unwrap_or(request.options.model),
            usage: state.usage,
        })
    }
}

/// Accumulates a streamed reply.
#[derive(Default)]
struct StreamState {
    content: String,
    finish_reason: Option<String>,
    model: Option<String>,
    usage: TokenUsage,
    done: bool,
}

impl StreamState {
    /// Returns true once the `[DONE]` sentinel has been seen.
    fn apply(&mut self, line: &str, on_delta: &mut (dyn FnMut(&str) + Send)) -> Result<bool> {
        match parse_sse_line(line)? {
            Some(SseEvent::Done) => self.done = true,
            Some(SseEvent::Delta {
                content,
                finish_reason,
                model,
                usage,
            }) => {
                if let Some(delta) = content.filter(|d| !d.is_empty()) {
                    on_delta(&delta);
                    self.content.push_str(&delta);
                }
                if finish_reason.is_some() {
                    self.finish_reason = finish_reason;
                }
                if model.is_some() {
                    self.model = model;
                }
                if let Some(usage) = usage {
                    self.usage = usage;
                }
            }
            None => {}
        }
        Ok(self.done)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
