use crate::cmd::{load_session, session_id};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use ideaflow_cli::client::load_config;
use ideaflow_cli::stages::IDEA_KEY;
use ideaflow_core::{paths, session::Session, state::State, workflow};
use std::path::Path;

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// Create a session and make it current
    New {
        /// Project name (default: the configured project)
        project: Option<String>,
        /// The idea the Business Analyst starts from
        #[arg(long)]
        idea: Option<String>,
    },
    /// List all sessions
    List,
    /// Show session details
    Show {
        /// Session id (default: current session)
        id: Option<String>,
    },
    /// Make a session current
    Use { id: String },
    /// Read or write session metadata
    Meta {
        #[command(subcommand)]
        subcommand: MetaSubcommand,
    },
}

#[derive(Subcommand)]
pub enum MetaSubcommand {
    /// Set a metadata value
    Set {
        key: String,
        value: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Print one metadata value, or all of them
    Get {
        key: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SessionSubcommand::New { project, idea } => new(root, project, idea, json),
        SessionSubcommand::List => list(root, json),
        SessionSubcommand::Show { id } => show(root, id.as_deref(), json),
        SessionSubcommand::Use { id } => use_session(root, &id, json),
        SessionSubcommand::Meta { subcommand } => match subcommand {
            MetaSubcommand::Set {
                key,
                value,
                session,
            } => meta_set(root, session.as_deref(), &key, &value, json),
            MetaSubcommand::Get { key, session } => {
                meta_get(root, session.as_deref(), key.as_deref(), json)
            }
        },
    }
}

/// Create a session, record `idea`, and point state.yaml at it.
pub fn create(root: &Path, project: Option<String>, idea: Option<&str>) -> anyhow::Result<Session> {
    let mut state = State::load(root).context("failed to load state")?;
    let project = match project {
        Some(p) => p,
        None => load_config(root)?.project,
    };

    let mut session = Session::create(root, &project).context("failed to create session")?;
    if let Some(idea) = idea.map(str::trim).filter(|i| !i.is_empty()) {
        session.set_metadata(IDEA_KEY, idea);
        session.save(root).context("failed to save session")?;
    }
    state.set_current(session.id);
    state.save(root).context("failed to save state")?;
    Ok(session)
}

fn new(root: &Path, project: Option<String>, idea: Option<String>, json: bool) -> anyhow::Result<()> {
    let session = create(root, project, idea.as_deref())?;
    if json {
        print_json(&serde_json::json!({
            "id": session.id,
            "project_name": session.project_name,
        }))?;
    } else {
        println!("Created session {} for '{}'", session.id, session.project_name);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let sessions = Session::list(root).context("failed to list sessions")?;
    let current = State::load(root).ok().and_then(|s| s.current_session);

    if json {
        let summaries: Vec<_> = sessions
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "project_name": s.project_name,
                    "created_at": s.created_at,
                    "documents": s.latest_documents().len(),
                    "next_stage": workflow::next_stage(s).map(|st| st.as_str()),
                    "current": Some(s.id) == current,
                })
            })
            .collect();
        print_json(&summaries)?;
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions yet. Run 'ideaflow session new <project>'.");
        return Ok(());
    }

    let rows = sessions
        .iter()
        .map(|s| {
            vec![
                if Some(s.id) == current { "*".to_string() } else { String::new() },
                s.id.to_string(),
                s.project_name.clone(),
                s.created_at.format("%Y-%m-%d %H:%M").to_string(),
                workflow::next_stage(s)
                    .map(|st| st.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["", "ID", "PROJECT", "CREATED", "NEXT"], rows);
    Ok(())
}

fn show(root: &Path, id: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = load_session(root, id)?;

    if json {
        print_json(&session)?;
        return Ok(());
    }

    println!("Session:  {}", session.id);
    println!("Project:  {}", session.project_name);
    println!("Created:  {}", session.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:  {}", session.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(state) = session.last_workflow_state() {
        println!("State:    {}", state.state);
    }

    if !session.metadata.is_empty() {
        println!("\nMetadata:");
        for (k, v) in &session.metadata {
            println!("  {k}: {v}");
        }
    }

    let docs = session.latest_documents();
    if docs.is_empty() {
        println!("\nNo documents yet.");
    } else {
        println!("\nDocuments:");
        for d in docs {
            println!("  {:<34} v{:<8} {}", d.document_type.as_str(), d.version, d.path);
        }
    }
    Ok(())
}

fn use_session(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let id = paths::parse_session_id(id)?;
    let session = Session::load(root, &id)?;
    let mut state = State::load(root).context("failed to load state")?;
    state.set_current(session.id);
    state.save(root).context("failed to save state")?;

    if json {
        print_json(&serde_json::json!({ "current_session": session.id }))?;
    } else {
        println!("Current session: {} ({})", session.id, session.project_name);
    }
    Ok(())
}

fn meta_set(root: &Path, session: Option<&str>, key: &str, value: &str, json: bool) -> anyhow::Result<()> {
    let id = session_id(root, session)?;
    let mut session = Session::load(root, &id)?;
    session.set_metadata(key, value);
    session.save(root).context("failed to save session")?;

    if json {
        print_json(&serde_json::json!({ "key": key, "value": value }))?;
    } else {
        println!("{key} = {value}");
    }
    Ok(())
}

fn meta_get(root: &Path, session: Option<&str>, key: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = load_session(root, session)?;
    match key {
        Some(key) => {
            let value = session
                .metadata(key)
                .with_context(|| format!("no metadata value for '{key}'"))?;
            if json {
                print_json(&serde_json::json!({ "key": key, "value": value }))?;
            } else {
                println!("{value}");
            }
        }
        None if json => print_json(&session.metadata)?,
        None => {
            for (k, v) in &session.metadata {
                println!("{k}: {v}");
            }
        }
    }
    Ok(())
}
