use async_trait::async_trait;

use crate::types::{Completion, CompletionRequest};
use crate::Result;

/// Callback receiving each streamed text fragment as it arrives.
pub type DeltaSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// A chat-completion backend.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Short name for logs ("openai_compatible", "offline", ...).
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Stream the reply through `on_delta`, returning the assembled
    /// completion. Backends without streaming deliver one delta.
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<Completion> {
        let completion = self.complete(request).await?;
        on_delta(&completion.content);
        Ok(completion)
    }
}
