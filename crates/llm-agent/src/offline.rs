use async_trait::async_trait;

use crate::client::ChatClient;
use crate::types::{Completion, CompletionRequest, TokenUsage};
use crate::Result;

/// Network-free backend producing deterministic markdown.
///
/// The reply is headed by the first line of the last user message and
/// echoes a short excerpt of it, so a full pipeline can be exercised
/// without credentials. Requests asking for a JSON array receive a single
/// placeholder decision, and the criteria and ratings requests of a
/// technology evaluation receive one placeholder stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineClient;

const EXCERPT_CHARS: usize = 240;

impl OfflineClient {
    pub fn new() -> Self {
        Self
    }

    fn reply(request: &CompletionRequest) -> String {
        let prompt = request.last_user_message().unwrap_or_default();
        if prompt.contains("JSON array") {
            return PLACEHOLDER_DECISIONS.to_string();
        }
        if prompt.contains("\"ratings\" list") {
            return PLACEHOLDER_RATINGS.to_string();
        }
        if prompt.contains("\"criteria\" list") {
            return PLACEHOLDER_CRITERIA.to_string();
        }

        let heading = prompt
            .lines()
            .map(|l| l.trim().trim_start_matches('#').trim())
            .find(|l| !l.is_empty())
            .unwrap_or("Draft");
        let heading: String = heading.chars().take(80).collect();
        let excerpt: String = prompt.chars().take(EXCERPT_CHARS).collect();
        let ellipsis = if prompt.chars().count() > EXCERPT_CHARS {
            "..."
        } else {
            ""
        };
        let quoted = excerpt
            .lines()
            .map(|l| format!("> {l}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "# {heading}\n\n\
             _Offline draft: generated without a language model ({} context messages)._\n\n\
             ## Request\n\n{quoted}{ellipsis}\n\n\
             ## Next Steps\n\n- Configure an LLM provider and re-run this stage to replace this draft.\n",
            request.messages.len()
        )
    }
}

const PLACEHOLDER_DECISIONS: &str = r#"```json
[
  {
    "id": "placeholder-architecture-style",
    "category": "General",
    "title": "Architecture Style",
    "description": "Offline placeholder decision; choose the overall architecture style.",
    "options": [
      {"name": "Modular monolith", "pros": ["Simple to operate"], "cons": ["Scales as one unit"]},
      {"name": "Services", "pros": ["Independent scaling"], "cons": ["Operational overhead"]}
    ],
    "recommendation": "Modular monolith"
  }
]
```"#;

const PLACEHOLDER_CRITERIA: &str = r#"```json
{
  "criteria": [
    {"name": "Technology Alignment", "description": "Fits the core requirements without extra overhead", "importance": "VERY HIGH"},
    {"name": "Maturity", "description": "Stable releases and an active community", "importance": "HIGH"}
  ]
}
```"#;

const PLACEHOLDER_RATINGS: &str = r#"```json
{
  "ratings": [
    {"stack": "Offline placeholder stack", "criterion": "Technology Alignment", "rating": "Medium"},
    {"stack": "Offline placeholder stack", "criterion": "Maturity", "rating": "Medium"}
  ],
  "notes": [
    {"stack": "Offline placeholder stack", "note": "Configure an LLM provider for a real evaluation."}
  ]
}
```"#;

#[async_trait]
impl ChatClient for OfflineClient {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let content = Self::reply(&request);
        let completion_tokens = content.split_whitespace().count() as u32;
        Ok(Completion {
            content,
            finish_reason: Some("stop".to_string()),
            model: "offline".to_string(),
            usage: TokenUsage {
                prompt_tokens: 0,
                completion_tokens,
                total_tokens: completion_tokens,
            },
        })
    }
}
