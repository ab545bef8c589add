use crate::cmd::{block_on, load_session, runner};
use crate::output::print_json;
use ideaflow_core::document::Document;
use ideaflow_core::types::Stage;
use std::path::Path;
use std::str::FromStr;

fn report(stage: Stage, doc: &Document, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({
            "stage": stage.as_str(),
            "document_type": doc.meta.document_type,
            "path": doc.path,
            "version": doc.meta.version,
        }))?;
    } else {
        println!("{stage}: wrote {} v{} ({})", doc.meta.document_type, doc.meta.version, doc.path);
    }
    Ok(())
}

/// `ideaflow run <stage>`
pub fn run(root: &Path, stage: &str, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let stage = Stage::from_str(stage)?;
    let mut session = load_session(root, session)?;
    let runner = runner(root)?;

    let doc = block_on(runner.run(&mut session, stage))??;
    report(stage, &doc, json)
}

/// `ideaflow next`
pub fn next(root: &Path, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut session = load_session(root, session)?;
    let runner = runner(root)?;

    match block_on(runner.run_next(&mut session))?? {
        Some((stage, doc)) => report(stage, &doc, json),
        None => {
            if json {
                print_json(&serde_json::json!({ "stage": null }))?;
            } else {
                println!("All stages complete.");
            }
            Ok(())
        }
    }
}
