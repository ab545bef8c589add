use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdeaflowError {
    #[error("not initialized: run 'ideaflow init'")]
    NotInitialized,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already exists: {0}")]
    SessionExists(String),

    #[error("no current session: run 'ideaflow session new' or 'ideaflow session use <id>'")]
    NoCurrentSession,

    #[error("invalid session id '{0}': expected a UUID")]
    InvalidSessionId(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document already exists: {0} (documents are immutable; revise it instead)")]
    DocumentExists(String),

    #[error("missing required document '{document}' for stage '{stage}'")]
    MissingDocument { document: String, stage: String },

    #[error("invalid stage: {0}")]
    InvalidStage(String),

    #[error("invalid document type: {0}")]
    InvalidDocumentType(String),

    #[error("invalid document version '{0}': expected MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("decision not found: {0}")]
    DecisionNotFound(String),

    #[error("invalid frontmatter in {path}: {reason}")]
    Frontmatter { path: String, reason: String },

    #[error("version control error: {0}")]
    Vcs(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdeaflowError>;
