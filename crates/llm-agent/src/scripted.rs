use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::ChatClient;
use crate::error::LlmError;
use crate::types::{Completion, CompletionRequest, TokenUsage};
use crate::Result;

/// Replays queued replies in order and records every request it receives.
/// Used to drive agents deterministically in tests.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(reply.into());
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let model = request.options.model.clone();
        lock(&self.requests).push(request);
        let content = lock(&self.replies)
            .pop_front()
            .ok_or_else(|| LlmError::Config("scripted client has no replies left".to_string()))?;
        Ok(Completion {
            content,
            finish_reason: Some("stop".to_string()),
            model,
            usage: TokenUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, CompletionOptions};

    #[tokio::test]
    async fn replays_in_order_and_records() {
        let client = ScriptedClient::new(["one", "two"]);
        let req = |t: &str| {
            CompletionRequest::new(vec![ChatMessage::user(t)], CompletionOptions::default())
        };
        assert_eq!(client.complete(req("a")).await.unwrap().content, "one");
        assert_eq!(client.complete(req("b")).await.unwrap().content, "two");
        assert!(client.complete(req("c")).await.is_err());

        let seen = client.requests();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].last_user_message(), Some("b"));
        assert_eq!(client.remaining(), 0);
    }
}
