use crate::error::{IdeaflowError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub name: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

/// One architectural question the user answers before the final
/// architecture document is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<DecisionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// DecisionLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionLog {
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl DecisionLog {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions,
            analyzed_at: Some(Utc::now()),
        }
    }

    /// The session's log, or an empty one before analysis has run.
    pub fn load(root: &Path, session_id: &Uuid) -> Result<Self> {
        Ok(crate::io::read_yaml(&paths::decisions_path(root, session_id))?.unwrap_or_default())
    }

    pub fn save(&self, root: &Path, session_id: &Uuid) -> Result<()> {
        crate::io::write_yaml(&paths::decisions_path(root, session_id), self)
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// First decision still waiting for an answer.
    pub fn current(&self) -> Option<&Decision> {
        self.decisions.iter().find(|d| !d.completed)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| !d.completed)
    }

    pub fn all_completed(&self) -> bool {
        self.decisions.iter().all(|d| d.completed)
    }

    /// Record an answer. `choice` may be an option name (case-insensitive)
    /// or its 1-based position; anything else is kept verbatim as a custom
    /// answer.
    pub fn decide(&mut self, id: &str, choice: &str, rationale: Option<String>) -> Result<&Decision> {
        let decision = self
            .decisions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| IdeaflowError::DecisionNotFound(id.to_string()))?;

        let choice = choice.trim();
        let by_index = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| decision.options.get(i));
        let by_name = decision
            .options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(choice));
        let resolved = by_index
            .or(by_name)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| choice.to_string());

        decision.choice = Some(resolved);
        decision.rationale = rationale.filter(|r| !r.trim().is_empty());
        decision.completed = true;
        Ok(&*decision)
    }

    /// Markdown summary of the completed decisions only.
    pub fn summary(&self) -> String {
        self.decisions
            .iter()
            .filter(|d| d.completed)
            .map(|d| {
                let mut s = format!(
                    "## {}\n**Decision**: {}\n",
                    d.title,
                    d.choice.as_deref().unwrap_or_default()
                );
                if let Some(r) = &d.rationale {
                    s.push_str(&format!("**Rationale**: {r}\n"));
                }
                s
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Extraction from model output
// ---------------------------------------------------------------------------

static JSON_FENCE_RE: OnceLock<Regex> = OnceLock::new();
static ARRAY_START_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn json_fence_re() -> &'static Regex {
    JSON_FENCE_RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap())
}

fn array_start_re() -> &'static Regex {
    ARRAY_START_RE.get_or_init(|| Regex::new(r"\[\s*\{").unwrap())
}

/// The JSON payload of a model reply: a fenced ```json block, else
/// everything from the first `[{`.
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(caps) = json_fence_re().captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    array_start_re().find(text).map(|m| &text[m.start()..])
}

/// Parse decisions from a model reply, filling gaps with positional
/// defaults. Trailing prose after the array is ignored.
pub fn parse_decisions(text: &str) -> Result<Vec<Decision>> {
    let json = extract_json_block(text).ok_or_else(|| {
        IdeaflowError::Json(serde::de::Error::custom("no JSON array found in response"))
    })?;
    let value = serde_json::Deserializer::from_str(json)
        .into_iter::<Value>()
        .next()
        .unwrap_or_else(|| Err(serde::de::Error::custom("empty JSON payload")))?;
    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(IdeaflowError::Json(serde::de::Error::custom(
                "expected a JSON array of decisions",
            )))
        }
    };

    Ok(items
        .iter()
        .enumerate()
        .map(|(i, item)| decision_from_value(i, item))
        .collect())
}

pub(crate) fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(item: &Value, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn decision_from_value(i: usize, item: &Value) -> Decision {
    let options = match item.get("options") {
        Some(Value::Array(opts)) => opts
            .iter()
            .filter_map(|o| match o {
                Value::String(name) => Some(DecisionOption {
                    name: name.clone(),
                    pros: Vec::new(),
                    cons: Vec::new(),
                }),
                Value::Object(_) => Some(DecisionOption {
                    name: str_field(o, "name")?,
                    pros: string_list(o, "pros"),
                    cons: string_list(o, "cons"),
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Decision {
        id: str_field(item, "id").unwrap_or_else(|| format!("decision-{}", i + 1)),
        category: str_field(item, "category").unwrap_or_else(|| "Uncategorized".to_string()),
        title: str_field(item, "title").unwrap_or_else(|| format!("Decision {}", i + 1)),
        description: str_field(item, "description").unwrap_or_default(),
        options,
        recommendation: str_field(item, "recommendation"),
        choice: None,
        rationale: None,
        completed: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPLY: &str = r#"Here are the decisions:

```json
[
  {
    "id": "frontend-framework",
    "category": "Frontend",
    "title": "Frontend Framework Selection",
    "description": "Choose the main frontend framework",
    "options": [
      {"name": "React", "pros": ["Large ecosystem"], "cons": ["Needs extra libraries"]},
      {"name": "Svelte", "pros": ["Small bundles"], "cons": ["Smaller ecosystem"]}
    ],
    "recommendation": "React"
  },
  {"description": "Where data lives", "options": ["Postgres", "SQLite"]}
]
```

Let me know."#;

    #[test]
    fn extracts_fenced_json() {
        let block = extract_json_block(REPLY).unwrap();
        assert!(block.starts_with('['));
        assert!(block.ends_with(']'));
    }

    #[test]
    fn extracts_bare_array_with_trailing_text() {
        let text = r#"Sure. [{"title": "Auth"}] hope this helps"#;
        let decisions = parse_decisions(text).unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].title, "Auth");
    }

    #[test]
    fn parse_fills_defaults() {
        let decisions = parse_decisions(REPLY).unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].id, "frontend-framework");
        assert_eq!(decisions[0].options.len(), 2);
        assert_eq!(decisions[0].options[0].pros, vec!["Large ecosystem"]);
        assert_eq!(decisions[0].recommendation.as_deref(), Some("React"));

        assert_eq!(decisions[1].id, "decision-2");
        assert_eq!(decisions[1].category, "Uncategorized");
        assert_eq!(decisions[1].title, "Decision 2");
        assert_eq!(decisions[1].options[1].name, "SQLite");
    }

    #[test]
    fn parse_without_json_fails() {
        assert!(parse_decisions("no structure here").is_err());
        assert!(parse_decisions("```json\n{\"a\": 1}\n```").is_err());
    }

    #[test]
    fn decide_advances_current() {
        let mut log = DecisionLog::new(parse_decisions(REPLY).unwrap());
        assert_eq!(log.current().unwrap().id, "frontend-framework");

        let d = log
            .decide("frontend-framework", "svelte", Some("team knows it".into()))
            .unwrap();
        assert_eq!(d.choice.as_deref(), Some("Svelte"));
        assert_eq!(log.current().unwrap().id, "decision-2");

        log.decide("decision-2", "1", None).unwrap();
        assert_eq!(log.decisions[1].choice.as_deref(), Some("Postgres"));
        assert!(log.all_completed());
        assert!(log.current().is_none());
    }

    #[test]
    fn decide_custom_answer_and_unknown_id() {
        let mut log = DecisionLog::new(parse_decisions(REPLY).unwrap());
        log.decide("decision-2", "DynamoDB", None).unwrap();
        assert_eq!(log.decisions[1].choice.as_deref(), Some("DynamoDB"));
        assert!(matches!(
            log.decide("nope", "x", None),
            Err(IdeaflowError::DecisionNotFound(_))
        ));
    }

    #[test]
    fn summary_lists_completed_only() {
        let mut log = DecisionLog::new(parse_decisions(REPLY).unwrap());
        log.decide("frontend-framework", "React", Some("ecosystem".into()))
            .unwrap();
        let summary = log.summary();
        assert!(summary.contains("## Frontend Framework Selection"));
        assert!(summary.contains("**Decision**: React"));
        assert!(summary.contains("**Rationale**: ecosystem"));
        assert!(!summary.contains("Decision 2"));
        assert_eq!(log.pending().count(), 1);
    }

    #[test]
    fn log_roundtrip() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        assert!(DecisionLog::load(dir.path(), &id).unwrap().is_empty());

        let log = DecisionLog::new(parse_decisions(REPLY).unwrap());
        log.save(dir.path(), &id).unwrap();
        let loaded = DecisionLog::load(dir.path(), &id).unwrap();
        assert_eq!(loaded.decisions, log.decisions);
    }
}
