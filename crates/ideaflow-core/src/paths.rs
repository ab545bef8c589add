use crate::error::{IdeaflowError, Result};
use crate::types::{DocumentType, Stage};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const IDEAFLOW_DIR: &str = ".ideaflow";
pub const SESSIONS_DIR: &str = ".ideaflow/sessions";

pub const CONFIG_FILE: &str = ".ideaflow/config.yaml";
pub const STATE_FILE: &str = ".ideaflow/state.yaml";

pub const SESSION_MANIFEST: &str = "session.yaml";
pub const DECISIONS_FILE: &str = "decisions.yaml";
pub const DOCS_DIR: &str = "docs";
pub const TRANSCRIPTS_DIR: &str = "transcripts";

pub const USER_CONFIG_DIR: &str = ".config/ideaflow";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn ideaflow_dir(root: &Path) -> PathBuf {
    root.join(IDEAFLOW_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn session_dir(root: &Path, id: &Uuid) -> PathBuf {
    root.join(SESSIONS_DIR).join(id.to_string())
}

pub fn session_manifest(root: &Path, id: &Uuid) -> PathBuf {
    session_dir(root, id).join(SESSION_MANIFEST)
}

pub fn decisions_path(root: &Path, id: &Uuid) -> PathBuf {
    session_dir(root, id).join(DECISIONS_FILE)
}

pub fn transcript_path(root: &Path, id: &Uuid, stage: Stage) -> PathBuf {
    session_dir(root, id)
        .join(TRANSCRIPTS_DIR)
        .join(format!("{}.yaml", stage.as_str()))
}

pub fn document_dir(root: &Path, id: &Uuid, document_type: DocumentType) -> PathBuf {
    session_dir(root, id)
        .join(DOCS_DIR)
        .join(document_type.dir_name())
}

/// Absolute path of a document inside the session tree, from its title.
pub fn document_path(root: &Path, id: &Uuid, document_type: DocumentType, title: &str) -> PathBuf {
    document_dir(root, id, document_type).join(format!("{}.md", slugify(title)))
}

/// User-level config, consulted when a project has none.
pub fn user_config_path() -> Result<PathBuf> {
    let home = home::home_dir().ok_or(IdeaflowError::HomeNotFound)?;
    Ok(home.join(USER_CONFIG_DIR).join("config.yaml"))
}

/// Express `path` relative to `root` with forward slashes, for frontmatter
/// and session manifests. Paths outside `root` are returned as given.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Slugs and ids
// ---------------------------------------------------------------------------

static NON_ALNUM_RE: OnceLock<Regex> = OnceLock::new();

fn non_alnum_re() -> &'static Regex {
    NON_ALNUM_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Turn a document title into a filename stem: lowercase, runs of
/// non-alphanumerics collapsed to `-`, trimmed, at most 64 chars.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let slug = non_alnum_re().replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    let mut slug: String = slug.chars().take(64).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

pub fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| IdeaflowError::InvalidSessionId(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
