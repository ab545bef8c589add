use crate::error::{IdeaflowError, Result};
use crate::session::Session;
use crate::types::{DocumentType, Stage};
use serde::Serialize;

/// Where a stage stands for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    /// Output exists; re-running the stage revises it.
    Done { version: String },
    Ready,
    Blocked { missing: Vec<DocumentType> },
}

impl StageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StageStatus::Done { .. } => "done",
            StageStatus::Ready => "ready",
            StageStatus::Blocked { .. } => "blocked",
        }
    }
}

fn missing_inputs(session: &Session, stage: Stage) -> Vec<DocumentType> {
    stage
        .inputs()
        .iter()
        .copied()
        .filter(|&t| !session.has_document(t))
        .collect()
}

pub fn stage_status(session: &Session, stage: Stage) -> StageStatus {
    if let Some(doc) = session.document(stage.output()) {
        return StageStatus::Done {
            version: doc.version.clone(),
        };
    }
    let missing = missing_inputs(session, stage);
    if missing.is_empty() {
        StageStatus::Ready
    } else {
        StageStatus::Blocked { missing }
    }
}

/// Status of every stage, in pipeline order.
pub fn status(session: &Session) -> Vec<(Stage, StageStatus)> {
    Stage::all()
        .iter()
        .map(|&stage| (stage, stage_status(session, stage)))
        .collect()
}

/// First stage that has not produced its document and can run now.
pub fn next_stage(session: &Session) -> Option<Stage> {
    Stage::all()
        .iter()
        .copied()
        .find(|&stage| stage_status(session, stage) == StageStatus::Ready)
}

/// Error with the first missing input when `stage` cannot run yet.
pub fn check_ready(session: &Session, stage: Stage) -> Result<()> {
    match missing_inputs(session, stage).first() {
        Some(missing) => Err(IdeaflowError::MissingDocument {
            document: missing.to_string(),
            stage: stage.to_string(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
