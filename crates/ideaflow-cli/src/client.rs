use anyhow::Context;
use ideaflow_core::config::{Config, LlmConfig, LlmProvider, SearchConfig};
use llm_agent::{ChatClient, CompletionOptions, OfflineClient, OpenAiClient, SearchClient};
use std::path::Path;

/// Project config with environment overrides applied.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(root).context("failed to load config")?;
    config.apply_env(|key| std::env::var(key).ok());
    tracing::debug!(env = ?ideaflow_core::redact::relevant_env(), "environment");
    Ok(config)
}

pub fn chat_client(llm: &LlmConfig) -> Box<dyn ChatClient> {
    match llm.provider {
        LlmProvider::Offline => Box::new(OfflineClient::new()),
        LlmProvider::OpenaiCompatible => {
            Box::new(OpenAiClient::new(&llm.base_url, llm.api_key.clone()))
        }
    }
}

pub fn search_client(search: &SearchConfig) -> SearchClient {
    SearchClient::new(search.api_key.clone(), search.engine_id.clone())
}

pub fn completion_options(llm: &LlmConfig) -> CompletionOptions {
    CompletionOptions {
        model: llm.model.clone(),
        temperature: llm.temperature,
        max_tokens: llm.max_tokens,
        stream: false,
    }
}
