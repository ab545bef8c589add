use crate::error::Result;
use crate::paths;
use crate::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// The conversation held with one stage's agent, kept on disk so a
/// brainstorm can continue across invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub stage: Stage,
    #[serde(default)]
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            entries: Vec::new(),
        }
    }

    /// Saved transcript for `stage`, or an empty one.
    pub fn load(root: &Path, session_id: &Uuid, stage: Stage) -> Result<Self> {
        let path = paths::transcript_path(root, session_id, stage);
        Ok(crate::io::read_yaml(&path)?.unwrap_or_else(|| Self::new(stage)))
    }

    pub fn save(&self, root: &Path, session_id: &Uuid) -> Result<()> {
        crate::io::write_yaml(&paths::transcript_path(root, session_id, self.stage), self)
    }

    pub fn push(&mut self, speaker: Speaker, content: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            speaker,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text rendering used as prompt context.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                let who = match e.speaker {
                    Speaker::User => "User",
                    Speaker::Assistant => "Assistant",
                };
                format!("{who}: {}", e.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn transcript_roundtrip() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        assert!(Transcript::load(dir.path(), &id, Stage::BusinessAnalyst)
            .unwrap()
            .is_empty());

        let mut t = Transcript::new(Stage::BusinessAnalyst);
        t.push(Speaker::User, "A recipe app");
        t.push(Speaker::Assistant, "Who cooks?");
        t.save(dir.path(), &id).unwrap();

        let loaded = Transcript::load(dir.path(), &id, Stage::BusinessAnalyst).unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[1].speaker, Speaker::Assistant);
        assert_eq!(loaded.render(), "User: A recipe app\n\nAssistant: Who cooks?");
    }
}
