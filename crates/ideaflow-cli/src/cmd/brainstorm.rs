use crate::cmd::{block_on, load_session, runner};
use crate::output::print_json;
use std::path::Path;

/// One Business Analyst turn. `ideaflow run business_analyst` then writes
/// the vision from the conversation.
pub fn run(root: &Path, message: &str, start: bool, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("message must not be empty");
    }
    let mut session = load_session(root, session)?;
    let runner = runner(root)?;

    let reply = block_on(runner.brainstorm(&mut session, message, start))??;
    if json {
        print_json(&serde_json::json!({
            "session": session.id,
            "reply": reply,
        }))?;
    } else {
        println!("{}", reply.trim());
    }
    Ok(())
}
