use crate::cmd::load_session;
use crate::output::{print_json, print_table};
use ideaflow_core::workflow::{self, StageStatus};
use std::path::Path;

pub fn run(root: &Path, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = load_session(root, session)?;
    let stages = workflow::status(&session);
    let next = workflow::next_stage(&session);

    if json {
        let entries: Vec<_> = stages
            .iter()
            .map(|(stage, status)| {
                serde_json::json!({
                    "stage": stage.as_str(),
                    "role": stage.role().as_str(),
                    "output": stage.output().as_str(),
                    "status": status,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "session": session.id,
            "project_name": session.project_name,
            "next_stage": next.map(|s| s.as_str()),
            "stages": entries,
        }))?;
        return Ok(());
    }

    println!("{} ({})\n", session.project_name, session.id);
    let rows = stages
        .iter()
        .map(|(stage, status)| {
            let detail = match status {
                StageStatus::Done { version } => format!("v{version}"),
                StageStatus::Ready => String::new(),
                StageStatus::Blocked { missing } => format!(
                    "needs {}",
                    missing
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            vec![
                stage.to_string(),
                stage.role().display_name().to_string(),
                status.label().to_string(),
                detail,
            ]
        })
        .collect();
    print_table(&["STAGE", "ROLE", "STATUS", "DETAIL"], rows);

    match next {
        Some(stage) => println!("\nNext: ideaflow run {stage}"),
        None if stages.iter().all(|(_, s)| matches!(s, StageStatus::Done { .. })) => {
            println!("\nAll stages complete.")
        }
        None => {}
    }
    Ok(())
}
