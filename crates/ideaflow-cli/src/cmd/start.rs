use crate::cmd::session::create as create_session;
use crate::cmd::{block_on, load_session, runner};
use anyhow::Context;
use ideaflow_cli::interactive;
use ideaflow_core::state::State;
use std::path::Path;

/// `ideaflow start`: resume the current session, or open a new one when an
/// idea or project is given or nothing is current yet.
pub fn run(
    root: &Path,
    idea: Option<String>,
    project: Option<String>,
    session_arg: Option<&str>,
) -> anyhow::Result<()> {
    let state = State::load(root).context("failed to load state")?;
    let fresh = session_arg.is_none()
        && (idea.is_some() || project.is_some() || state.current_session.is_none());

    let mut session = if fresh {
        let s = create_session(root, project, idea.as_deref())?;
        println!("Started session {} for '{}'", s.id, s.project_name);
        s
    } else {
        let s = load_session(root, session_arg)?;
        println!("Resuming session {} for '{}'", s.id, s.project_name);
        s
    };
    let runner = runner(root)?;
    tracing::info!(session = %session.id, "starting interactive session");

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    block_on(interactive::start(
        &runner,
        &mut session,
        idea.as_deref(),
        &mut input,
        &mut out,
    ))?
}
