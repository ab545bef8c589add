use crate::cmd::{block_on, load_session, runner};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use ideaflow_cli::interactive::describe_decision;
use ideaflow_core::decision::DecisionLog;
use std::path::Path;

#[derive(Subcommand)]
pub enum ArchitectSubcommand {
    /// Identify the architectural decisions the final architecture depends on
    Analyze {
        #[arg(long)]
        session: Option<String>,
    },
    /// List decisions and their answers
    Decisions {
        #[arg(long)]
        session: Option<String>,
    },
    /// Answer a decision with an option name, its number, or free text
    Decide {
        id: String,
        choice: String,
        #[arg(long)]
        rationale: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: ArchitectSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ArchitectSubcommand::Analyze { session } => analyze(root, session.as_deref(), json),
        ArchitectSubcommand::Decisions { session } => decisions(root, session.as_deref(), json),
        ArchitectSubcommand::Decide {
            id,
            choice,
            rationale,
            session,
        } => decide(root, &id, &choice, rationale, session.as_deref(), json),
    }
}

fn print_log(log: &DecisionLog, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(log);
    }
    if log.is_empty() {
        println!("No decisions yet. Run 'ideaflow architect analyze'.");
        return Ok(());
    }
    let rows = log
        .decisions
        .iter()
        .map(|d| {
            vec![
                d.id.clone(),
                d.category.clone(),
                d.title.clone(),
                d.choice.clone().unwrap_or_else(|| "pending".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "CATEGORY", "TITLE", "DECISION"], rows);
    Ok(())
}

fn analyze(root: &Path, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut session = load_session(root, session)?;
    let runner = runner(root)?;
    let log = block_on(runner.analyze(&mut session))??;

    if json {
        return print_json(&log);
    }
    for d in &log.decisions {
        println!("{}", describe_decision(d));
    }
    println!("{} decision(s). Answer with 'ideaflow architect decide <id> <option>'.", log.decisions.len());
    Ok(())
}

fn decisions(root: &Path, session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = load_session(root, session)?;
    let log = DecisionLog::load(root, &session.id).context("failed to load decisions")?;
    print_log(&log, json)
}

fn decide(
    root: &Path,
    id: &str,
    choice: &str,
    rationale: Option<String>,
    session: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let session = load_session(root, session)?;
    let mut log = DecisionLog::load(root, &session.id).context("failed to load decisions")?;
    let decided = log.decide(id, choice, rationale)?.clone();
    log.save(root, &session.id).context("failed to save decisions")?;

    if json {
        print_json(&decided)?;
    } else {
        println!(
            "{}: {}",
            decided.title,
            decided.choice.as_deref().unwrap_or_default()
        );
        match log.current() {
            Some(next) => println!("Next pending decision: {}", next.id),
            None => println!("All decisions made. Run 'ideaflow run architect_final' to write the architecture."),
        }
    }
    Ok(())
}
