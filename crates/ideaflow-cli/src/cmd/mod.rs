pub mod architect;
pub mod brainstorm;
pub mod config;
pub mod doc;
pub mod init;
pub mod run;
pub mod session;
pub mod start;
pub mod status;

use anyhow::Context;
use ideaflow_cli::client::{chat_client, load_config, search_client};
use ideaflow_cli::StageRunner;
use ideaflow_core::{paths, session::Session, state::State};
use std::future::Future;
use std::path::Path;
use uuid::Uuid;

/// The named session, or the current one from state.yaml.
pub fn session_id(root: &Path, explicit: Option<&str>) -> anyhow::Result<Uuid> {
    match explicit {
        Some(raw) => Ok(paths::parse_session_id(raw)?),
        None => {
            let state = State::load(root).context("failed to load state")?;
            Ok(state.require_current()?)
        }
    }
}

pub fn load_session(root: &Path, explicit: Option<&str>) -> anyhow::Result<Session> {
    let id = session_id(root, explicit)?;
    Session::load(root, &id).with_context(|| format!("failed to load session {id}"))
}

/// Stage runner wired from the project config and environment.
pub fn runner(root: &Path) -> anyhow::Result<StageRunner> {
    let config = load_config(root)?;
    let client = chat_client(&config.llm);
    let search = search_client(&config.search);
    tracing::debug!(provider = client.name(), model = %config.llm.model, "using chat client");
    Ok(StageRunner::new(root, config, client, search))
}

/// Drive `future` to completion, reusing the ambient runtime when there is one.
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        Err(_) => {
            let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            Ok(rt.block_on(future))
        }
    }
}
