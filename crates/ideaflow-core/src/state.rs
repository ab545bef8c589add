use crate::error::{IdeaflowError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Per-project pointer to the session commands act on when none is named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub current_session: Option<Uuid>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: 1,
            current_session: None,
            last_updated: Utc::now(),
        }
    }
}

impl State {
    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        crate::io::read_yaml(&paths::state_path(root))?.ok_or(IdeaflowError::NotInitialized)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::write_yaml(&paths::state_path(root), self)
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    pub fn set_current(&mut self, id: Uuid) {
        self.current_session = Some(id);
        self.last_updated = Utc::now();
    }

    pub fn clear_current(&mut self) {
        self.current_session = None;
        self.last_updated = Utc::now();
    }

    /// The current session id, or `NoCurrentSession`.
    pub fn require_current(&self) -> Result<Uuid> {
        self.current_session.ok_or(IdeaflowError::NoCurrentSession)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        let mut state = State::default();
        state.set_current(id);
        state.save(dir.path()).unwrap();

        let loaded = State::load(dir.path()).unwrap();
        assert_eq!(loaded.current_session, Some(id));
        assert_eq!(loaded.require_current().unwrap(), id);
    }

    #[test]
    fn state_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            State::load(dir.path()),
            Err(IdeaflowError::NotInitialized)
        ));
    }

    #[test]
    fn cleared_state_has_no_current() {
        let mut state = State::default();
        state.set_current(Uuid::new_v4());
        state.clear_current();
        assert!(matches!(
            state.require_current(),
            Err(IdeaflowError::NoCurrentSession)
        ));
    }
}
