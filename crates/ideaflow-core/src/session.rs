use crate::error::{IdeaflowError, Result};
use crate::paths;
use crate::types::{DocumentType, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// DocumentRef / WorkflowEvent
// ---------------------------------------------------------------------------

/// A pointer from a session to one version of a document. Revisions append
/// a new ref; the last ref of a type wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_type: DocumentType,
    /// Relative to the project root, forward slashes.
    pub path: String,
    pub version: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub state: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Started,
    Completed,
    Failed,
}

impl StageEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            StageEvent::Started => "started",
            StageEvent::Completed => "completed",
            StageEvent::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub project_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    #[serde(default)]
    pub workflow: Vec<WorkflowEvent>,
}

impl Session {
    fn new(id: Uuid, project_name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_name,
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
            documents: Vec::new(),
            workflow: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn create(root: &Path, project_name: impl Into<String>) -> Result<Self> {
        Self::create_with_id(root, Uuid::new_v4(), project_name)
    }

    pub fn create_with_id(root: &Path, id: Uuid, project_name: impl Into<String>) -> Result<Self> {
        let dir = paths::session_dir(root, &id);
        if dir.exists() {
            return Err(IdeaflowError::SessionExists(id.to_string()));
        }
        let session = Self::new(id, project_name.into());
        session.save(root)?;
        tracing::info!(session = %id, project = %session.project_name, "created session");
        Ok(session)
    }

    pub fn load(root: &Path, id: &Uuid) -> Result<Self> {
        crate::io::read_yaml(&paths::session_manifest(root, id))?
            .ok_or_else(|| IdeaflowError::SessionNotFound(id.to_string()))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::write_yaml(&paths::session_manifest(root, &self.id), self)
    }

    /// All sessions under `root`, oldest first. Directories that are not
    /// sessions are skipped.
    pub fn list(root: &Path) -> Result<Vec<Self>> {
        let sessions_dir = root.join(paths::SESSIONS_DIR);
        if !sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&sessions_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(id) = Uuid::parse_str(&name) else {
                continue;
            };
            match Self::load(root, &id) {
                Ok(s) => sessions.push(s),
                Err(IdeaflowError::SessionNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    // ---------------------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------------------

    pub fn add_document(&mut self, doc: DocumentRef) {
        self.documents.push(doc);
        self.updated_at = Utc::now();
    }

    /// Latest ref of `document_type`.
    pub fn document(&self, document_type: DocumentType) -> Option<&DocumentRef> {
        self.documents
            .iter()
            .rev()
            .find(|d| d.document_type == document_type)
    }

    pub fn has_document(&self, document_type: DocumentType) -> bool {
        self.document(document_type).is_some()
    }

    /// Latest ref of every type present, in pipeline order.
    pub fn latest_documents(&self) -> Vec<&DocumentRef> {
        DocumentType::all()
            .iter()
            .filter_map(|&t| self.document(t))
            .collect()
    }

    // ---------------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------------

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
        self.updated_at = Utc::now();
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    // ---------------------------------------------------------------------------
    // Workflow log
    // ---------------------------------------------------------------------------

    pub fn record_workflow_state(&mut self, state: impl Into<String>) {
        let now = Utc::now();
        self.workflow.push(WorkflowEvent {
            state: state.into(),
            at: now,
        });
        self.updated_at = now;
    }

    pub fn record_stage(&mut self, stage: Stage, event: StageEvent) {
        self.record_workflow_state(format!("{}:{}", stage.as_str(), event.as_str()));
    }

    pub fn last_workflow_state(&self) -> Option<&WorkflowEvent> {
        self.workflow.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
