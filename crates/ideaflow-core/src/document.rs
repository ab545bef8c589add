use crate::error::{IdeaflowError, Result};
use crate::frontmatter;
use crate::paths;
use crate::session::DocumentRef;
use crate::types::DocumentType;
use crate::vcs::{Revision, Versioner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INITIAL_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// DocumentMeta / Document
// ---------------------------------------------------------------------------

/// Frontmatter of a generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    pub document_type: DocumentType,
    pub session_id: Uuid,
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Project-relative paths of the documents this one was generated from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone)]
pub struct Document {
    /// Project-relative path, forward slashes.
    pub path: String,
    pub meta: DocumentMeta,
    pub body: String,
}

impl Document {
    pub fn to_ref(&self) -> DocumentRef {
        DocumentRef {
            document_type: self.meta.document_type,
            path: self.path.clone(),
            version: self.meta.version.clone(),
            recorded_at: self.meta.updated_at.unwrap_or(self.meta.created_at),
        }
    }
}

/// Increment the patch component of a `MAJOR.MINOR.PATCH` version.
pub fn bump_patch(version: &str) -> Result<String> {
    let parts: Vec<&str> = version.trim().split('.').collect();
    let invalid = || IdeaflowError::InvalidVersion(version.to_string());
    if parts.len() != 3 {
        return Err(invalid());
    }
    let nums = parts
        .iter()
        .map(|p| p.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{}.{}.{}", nums[0], nums[1], nums[2] + 1))
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Reads and writes session documents, committing every write.
pub struct DocumentStore {
    root: PathBuf,
    vcs: Box<dyn Versioner>,
}

impl DocumentStore {
    pub fn new(root: &Path, vcs: Box<dyn Versioner>) -> Self {
        Self {
            root: root.to_path_buf(),
            vcs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versioning_enabled(&self) -> bool {
        self.vcs.is_enabled()
    }

    /// Absolute path for a project-relative or absolute `path`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write a new document. Existing files are never overwritten.
    pub fn create(
        &self,
        session_id: Uuid,
        document_type: DocumentType,
        title: &str,
        body: &str,
        derived_from: Vec<String>,
        extra: BTreeMap<String, serde_yaml::Value>,
    ) -> Result<Document> {
        let abs = paths::document_path(&self.root, &session_id, document_type, title);
        let rel = paths::relative_to(&self.root, &abs);
        if abs.exists() {
            return Err(IdeaflowError::DocumentExists(rel));
        }

        let meta = DocumentMeta {
            title: title.to_string(),
            document_type,
            session_id,
            version: INITIAL_VERSION.to_string(),
            created_at: Utc::now(),
            updated_at: None,
            derived_from,
            extra,
        };
        let raw = frontmatter::render(&meta, body)?;
        crate::io::atomic_write(&abs, raw.as_bytes())?;
        tracing::info!(path = %rel, document_type = %document_type, "created document");

        self.commit(&abs, &format!("Create {document_type}: {title}"));
        self.get(&rel)
    }

    /// Replace the body of an existing document, bumping its patch version.
    /// `extra` entries are merged into the frontmatter; a null entry removes
    /// the key.
    pub fn revise(
        &self,
        path: &str,
        body: &str,
        extra: BTreeMap<String, serde_yaml::Value>,
        message: Option<&str>,
    ) -> Result<Document> {
        let mut doc = self.get(path)?;
        doc.meta.version = bump_patch(&doc.meta.version)?;
        doc.meta.updated_at = Some(Utc::now());
        for (key, value) in extra {
            if value.is_null() {
                doc.meta.extra.remove(&key);
            } else {
                doc.meta.extra.insert(key, value);
            }
        }
        doc.body = body.to_string();

        let abs = self.resolve(&doc.path);
        let raw = frontmatter::render(&doc.meta, &doc.body)?;
        crate::io::atomic_write(&abs, raw.as_bytes())?;
        tracing::info!(path = %doc.path, version = %doc.meta.version, "revised document");

        let default_message;
        let message = match message {
            Some(m) => m,
            None => {
                let file = abs
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                default_message = format!("Update: {file}");
                &default_message
            }
        };
        self.commit(&abs, message);
        self.get(&doc.path)
    }

    /// Writes succeed even when the commit does not.
    fn commit(&self, abs: &Path, message: &str) {
        if let Err(e) = self.vcs.commit(&[abs], message) {
            tracing::warn!(path = %abs.display(), error = %e, "failed to commit document");
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, path: &str) -> Result<Document> {
        let abs = self.resolve(path);
        let rel = paths::relative_to(&self.root, &abs);
        if !abs.is_file() {
            return Err(IdeaflowError::DocumentNotFound(rel));
        }
        let raw = std::fs::read_to_string(&abs)?;
        let (meta, body) = frontmatter::parse::<DocumentMeta>(&raw, &rel)?;
        Ok(Document {
            path: rel,
            meta,
            body,
        })
    }

    /// Documents of a session, optionally of one type, oldest first.
    pub fn list(
        &self,
        session_id: Uuid,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<Document>> {
        let types: Vec<DocumentType> = match document_type {
            Some(t) => vec![t],
            None => DocumentType::all().to_vec(),
        };

        let mut docs = Vec::new();
        for t in types {
            let dir = paths::document_dir(&self.root, &session_id, t);
            if !dir.exists() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                match self.get(&paths::relative_to(&self.root, &path)) {
                    Ok(doc) => docs.push(doc),
                    Err(e @ IdeaflowError::Frontmatter { .. }) => {
                        tracing::warn!(error = %e, "skipping unreadable document");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        docs.sort_by(|a, b| a.meta.created_at.cmp(&b.meta.created_at));
        Ok(docs)
    }

    pub fn history(&self, path: &str) -> Result<Vec<Revision>> {
        let abs = self.resolve(path);
        if !abs.is_file() {
            return Err(IdeaflowError::DocumentNotFound(paths::relative_to(
                &self.root, &abs,
            )));
        }
        self.vcs.history(&abs)
    }

    /// Raw file contents (frontmatter included) at `commit`.
    pub fn show_at(&self, path: &str, commit: &str) -> Result<String> {
        self.vcs.show(&self.resolve(path), commit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
