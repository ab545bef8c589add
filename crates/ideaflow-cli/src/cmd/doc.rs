use crate::cmd::{block_on, load_session, runner};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::{ArgGroup, Subcommand};
use ideaflow_core::session::Session;
use ideaflow_core::types::DocumentType;
use ideaflow_core::IdeaflowError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// List the session's documents
    List {
        /// Only documents of this type
        #[arg(long = "type", value_name = "TYPE")]
        document_type: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Print a document
    Show {
        /// Document type (latest version) or project-relative path
        target: String,
        /// Show the document as of this commit
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// List the commits that touched a document
    History {
        /// Document type or project-relative path
        target: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Revise a document from feedback
    #[command(group(ArgGroup::new("source").required(true).args(["feedback", "file"])))]
    Revise {
        /// Document type
        document_type: String,
        /// Feedback text
        #[arg(long)]
        feedback: Option<String>,
        /// Read feedback from a file
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        session: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: DocSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DocSubcommand::List {
            document_type,
            session,
        } => list(root, document_type.as_deref(), session.as_deref(), json),
        DocSubcommand::Show {
            target,
            at,
            session,
        } => show(root, &target, at.as_deref(), session.as_deref(), json),
        DocSubcommand::History { target, session } => {
            history(root, &target, session.as_deref(), json)
        }
        DocSubcommand::Revise {
            document_type,
            feedback,
            file,
            session,
        } => revise(root, &document_type, feedback, file, session.as_deref(), json),
    }
}

/// Path of the latest document of a type, or `target` itself when it is
/// not a type name.
fn resolve_target(session: &Session, target: &str) -> anyhow::Result<String> {
    match DocumentType::from_str(target) {
        Ok(t) => session
            .document(t)
            .map(|r| r.path.clone())
            .ok_or_else(|| IdeaflowError::DocumentNotFound(t.to_string()).into()),
        Err(_) => Ok(target.to_string()),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(root: &Path, document_type: Option<&str>, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let document_type = document_type.map(DocumentType::from_str).transpose()?;
    let session = load_session(root, session)?;
    let runner = runner(root)?;
    let docs = runner
        .store()
        .list(session.id, document_type)
        .context("failed to list documents")?;

    if json {
        let summaries: Vec<_> = docs
            .iter()
            .map(|d| {
                serde_json::json!({
                    "document_type": d.meta.document_type,
                    "title": d.meta.title,
                    "version": d.meta.version,
                    "path": d.path,
                    "created_at": d.meta.created_at,
                    "updated_at": d.meta.updated_at,
                })
            })
            .collect();
        print_json(&summaries)?;
        return Ok(());
    }

    if docs.is_empty() {
        println!("No documents yet.");
        return Ok(());
    }

    let rows = docs
        .iter()
        .map(|d| {
            vec![
                d.meta.document_type.to_string(),
                d.meta.version.clone(),
                d.meta.title.clone(),
                d.path.clone(),
            ]
        })
        .collect();
    print_table(&["TYPE", "VERSION", "TITLE", "PATH"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// show / history
// ---------------------------------------------------------------------------

fn show(root: &Path, target: &str, at: Option<&str>, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = load_session(root, session)?;
    let path = resolve_target(&session, target)?;
    let runner = runner(root)?;
    let store = runner.store();

    if let Some(commit) = at {
        let raw = store
            .show_at(&path, commit)
            .with_context(|| format!("failed to read {path} at {commit}"))?;
        if json {
            print_json(&serde_json::json!({ "path": path, "commit": commit, "content": raw }))?;
        } else {
            print!("{raw}");
        }
        return Ok(());
    }

    let doc = store.get(&path)?;
    if json {
        print_json(&serde_json::json!({
            "path": doc.path,
            "meta": doc.meta,
            "body": doc.body,
        }))?;
    } else {
        println!("{} v{} ({})\n", doc.meta.title, doc.meta.version, doc.path);
        println!("{}", doc.body.trim_end());
    }
    Ok(())
}

fn history(root: &Path, target: &str, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = load_session(root, session)?;
    let path = resolve_target(&session, target)?;
    let runner = runner(root)?;
    let revisions = runner
        .store()
        .history(&path)
        .with_context(|| format!("failed to read history of {path}"))?;

    if json {
        print_json(&revisions)?;
        return Ok(());
    }

    if !runner.store().versioning_enabled() {
        println!("Version control is disabled; no history recorded.");
        return Ok(());
    }
    if revisions.is_empty() {
        println!("No commits for {path}.");
        return Ok(());
    }

    let rows = revisions
        .iter()
        .map(|r| {
            vec![
                r.commit.chars().take(10).collect::<String>(),
                r.date.format("%Y-%m-%d %H:%M").to_string(),
                r.author.clone(),
                r.message.clone(),
            ]
        })
        .collect();
    print_table(&["COMMIT", "DATE", "AUTHOR", "MESSAGE"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// revise
// ---------------------------------------------------------------------------

fn revise(
    root: &Path,
    document_type: &str,
    feedback: Option<String>,
    file: Option<PathBuf>,
    session: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let document_type = DocumentType::from_str(document_type)?;
    let feedback = match (feedback, file) {
        (Some(text), _) => text,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read feedback from {}", file.display()))?,
        (None, None) => anyhow::bail!("provide --feedback or --file"),
    };
    if feedback.trim().is_empty() {
        anyhow::bail!("feedback must not be empty");
    }

    let mut session = load_session(root, session)?;
    let runner = runner(root)?;
    let doc = block_on(runner.revise(&mut session, document_type, &feedback))??;

    if json {
        print_json(&serde_json::json!({
            "document_type": doc.meta.document_type,
            "path": doc.path,
            "version": doc.meta.version,
        }))?;
    } else {
        println!("Revised {} to v{} ({})", doc.meta.document_type, doc.meta.version, doc.path);
    }
    Ok(())
}
