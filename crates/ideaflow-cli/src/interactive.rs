//! Line-oriented terminal loop behind `ideaflow start`.
//!
//! ```text
//! brainstorm ── /done ──▶ vision ──▶ review ── a ──▶ next stage ──▶ review ...
//!     │                                 │  └─ r <feedback> ──▶ revision
//!     └─ /quit                          └─ q
//! ```
//!
//! Errors are printed inline and the loop carries on. End of input leaves
//! the loop; every document already written stays on disk.

use crate::stages::{StageRunner, IDEA_KEY};
use ideaflow_core::decision::Decision;
use ideaflow_core::document::Document;
use ideaflow_core::session::Session;
use ideaflow_core::types::{DocumentType, Stage};
use ideaflow_core::workflow;
use std::io::{BufRead, Write};

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Accept,
    Revise(String),
    Quit,
    Unknown,
}

fn parse_step(line: &str) -> Step {
    let line = line.trim();
    match line {
        "a" | "accept" => Step::Accept,
        "q" | "quit" | "/quit" => Step::Quit,
        _ => line
            .strip_prefix("r ")
            .or_else(|| line.strip_prefix("revise "))
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| Step::Revise(f.to_string()))
            .unwrap_or(Step::Unknown),
    }
}

/// Print `prompt` and read one line. `None` at end of input.
fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> anyhow::Result<Option<String>> {
    write!(out, "{prompt}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        writeln!(out)?;
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

fn show<W: Write>(out: &mut W, doc: &Document) -> anyhow::Result<()> {
    writeln!(out, "\n{} v{} ({})\n", doc.meta.title, doc.meta.version, doc.path)?;
    writeln!(out, "{}\n", doc.body.trim_end())?;
    Ok(())
}

/// Human-readable rendering of one decision and its options.
pub fn describe_decision(d: &Decision) -> String {
    let mut s = format!("[{}] {} ({})\n", d.id, d.title, d.category);
    if !d.description.is_empty() {
        s.push_str(&format!("  {}\n", d.description));
    }
    for (i, o) in d.options.iter().enumerate() {
        s.push_str(&format!("  {}. {}\n", i + 1, o.name));
        for p in &o.pros {
            s.push_str(&format!("       + {p}\n"));
        }
        for c in &o.cons {
            s.push_str(&format!("       - {c}\n"));
        }
    }
    if let Some(r) = &d.recommendation {
        s.push_str(&format!("  Recommended: {r}\n"));
    }
    if let Some(c) = &d.choice {
        s.push_str(&format!("  Decision: {c}\n"));
    }
    s
}

/// Run the interactive session until the user quits, input ends, or every
/// stage is done.
pub async fn start<R: BufRead, W: Write>(
    runner: &StageRunner,
    session: &mut Session,
    idea: Option<&str>,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    if !session.has_document(DocumentType::ProjectVision)
        && !brainstorm(runner, session, idea, input, out).await?
    {
        return Ok(());
    }
    review(runner, session, input, out).await
}

/// Returns false when the user left before the vision was written.
async fn brainstorm<R: BufRead, W: Write>(
    runner: &StageRunner,
    session: &mut Session,
    idea: Option<&str>,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<bool> {
    let transcript = runner.transcript(session)?;
    if transcript.is_empty() {
        let stored = session.metadata(IDEA_KEY).map(str::to_string);
        let idea = match idea.map(str::to_string).or(stored) {
            Some(idea) => idea,
            None => loop {
                match ask(input, out, "Describe your idea: ")? {
                    None => return Ok(false),
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => break line,
                }
            },
        };
        match runner.brainstorm(session, &idea, true).await {
            Ok(reply) => writeln!(out, "\n{}\n", reply.trim())?,
            Err(e) => writeln!(out, "error: {e:#}")?,
        }
    } else {
        writeln!(out, "Resuming brainstorm ({} messages).", transcript.entries.len())?;
    }
    writeln!(out, "Type /done to write the project vision, /quit to leave.")?;

    loop {
        let Some(line) = ask(input, out, "you> ")? else {
            return Ok(false);
        };
        match line.trim() {
            "" => {}
            "/quit" => return Ok(false),
            "/done" => match runner.run(session, Stage::BusinessAnalyst).await {
                Ok(doc) => {
                    show(out, &doc)?;
                    return Ok(true);
                }
                Err(e) => writeln!(out, "error: {e:#}")?,
            },
            text => match runner.brainstorm(session, text, false).await {
                Ok(reply) => writeln!(out, "\n{}\n", reply.trim())?,
                Err(e) => writeln!(out, "error: {e:#}")?,
            },
        }
    }
}

fn last_completed(session: &Session) -> Option<Stage> {
    Stage::all()
        .iter()
        .rev()
        .copied()
        .find(|s| session.has_document(s.output()))
}

async fn review<R: BufRead, W: Write>(
    runner: &StageRunner,
    session: &mut Session,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut reviewing = last_completed(session);
    loop {
        let Some(stage) = reviewing else {
            let Some(next) = workflow::next_stage(session) else {
                writeln!(out, "All stages complete.")?;
                return Ok(());
            };
            if next == Stage::ArchitectFinal && !walk_decisions(runner, session, input, out).await? {
                return Ok(());
            }
            writeln!(out, "\n== {} ({}) ==", next, next.role())?;
            match runner.run(session, next).await {
                Ok(doc) => {
                    show(out, &doc)?;
                    reviewing = Some(next);
                }
                Err(e) => {
                    writeln!(out, "error: {e:#}")?;
                    let answer = ask(input, out, "[a] retry, [q]uit: ")?;
                    if matches!(answer.as_deref().map(parse_step), None | Some(Step::Quit)) {
                        return Ok(());
                    }
                }
            }
            continue;
        };

        let prompt = format!("{stage}: [a]ccept, [r] <feedback> to revise, [q]uit: ");
        let Some(line) = ask(input, out, &prompt)? else {
            return Ok(());
        };
        match parse_step(&line) {
            Step::Accept => reviewing = None,
            Step::Revise(feedback) => match runner.revise(session, stage.output(), &feedback).await {
                Ok(doc) => show(out, &doc)?,
                Err(e) => writeln!(out, "error: {e:#}")?,
            },
            Step::Quit => return Ok(()),
            Step::Unknown => writeln!(out, "Use 'a' to accept, 'r <feedback>' to revise, or 'q' to quit.")?,
        }
    }
}

/// Walk the pending architectural decisions. Returns false when the user
/// quits.
async fn walk_decisions<R: BufRead, W: Write>(
    runner: &StageRunner,
    session: &mut Session,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<bool> {
    let mut log = runner.decisions(session)?;
    if log.is_empty() {
        writeln!(out, "Identifying architectural decisions...")?;
        log = match runner.analyze(session).await {
            Ok(log) => log,
            Err(e) => {
                writeln!(out, "error: {e:#}")?;
                return Ok(true);
            }
        };
    }

    while let Some(decision) = log.current().cloned() {
        writeln!(out, "\n{}", describe_decision(&decision))?;
        let Some(line) = ask(
            input,
            out,
            "choice (number, name, or text; enter = recommended, s = skip, q = quit): ",
        )?
        else {
            return Ok(false);
        };
        let choice = match line.trim() {
            "q" => return Ok(false),
            "s" => break,
            "" => match &decision.recommendation {
                Some(r) => r.clone(),
                None => {
                    writeln!(out, "No recommendation; pick an option.")?;
                    continue;
                }
            },
            other => other.to_string(),
        };
        if let Err(e) = log.decide(&decision.id, &choice, None) {
            writeln!(out, "error: {e}")?;
            continue;
        }
        log.save(runner.root(), &session.id)?;
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::config::Config;
    use ideaflow_core::types::Paradigm;
    use llm_agent::{ChatClient, OfflineClient, ScriptedClient, SearchClient};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn runner(dir: &TempDir, client: Box<dyn ChatClient>) -> StageRunner {
        let mut config = Config::new("recipes");
        config.versioning.enabled = false;
        config.research.paradigms = vec![Paradigm::MainstreamCurrent];
        StageRunner::new(dir.path(), config, client, SearchClient::new(None, None))
    }

    async fn drive(runner: &StageRunner, session: &mut Session, idea: Option<&str>, script: &str) -> String {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        start(runner, session, idea, &mut input, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_review_steps() {
        assert_eq!(parse_step(" a "), Step::Accept);
        assert_eq!(parse_step("q"), Step::Quit);
        assert_eq!(parse_step("r add pricing"), Step::Revise("add pricing".into()));
        assert_eq!(parse_step("revise  tighten scope "), Step::Revise("tighten scope".into()));
        assert_eq!(parse_step("r "), Step::Unknown);
        assert_eq!(parse_step("maybe"), Step::Unknown);
    }

    #[tokio::test]
    async fn brainstorm_then_quit_keeps_transcript() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Box::new(ScriptedClient::new(["Who is it for?", "Noted."])));
        let mut session = Session::create(dir.path(), "Recipes").unwrap();

        let out = drive(&runner, &mut session, Some("A recipe app"), "home cooks\n/quit\n").await;
        assert!(out.contains("Who is it for?"));
        assert!(out.contains("Noted."));
        assert!(!session.has_document(DocumentType::ProjectVision));
        assert_eq!(runner.transcript(&session).unwrap().entries.len(), 4);
    }

    #[tokio::test]
    async fn errors_are_printed_inline() {
        let dir = TempDir::new().unwrap();
        // One reply for the opening; the next turn finds the script empty.
        let runner = runner(&dir, Box::new(ScriptedClient::new(["Tell me more."])));
        let mut session = Session::create(dir.path(), "Recipes").unwrap();

        let out = drive(&runner, &mut session, Some("A recipe app"), "more\n/quit\n").await;
        assert!(out.contains("error: Business Analyst request failed"));
    }

    #[tokio::test]
    async fn done_writes_vision_and_review_revises() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(["Who?", "# Vision", "# Vision\n\nWith pricing."]);
        let runner = runner(&dir, Box::new(client));
        let mut session = Session::create(dir.path(), "Recipes").unwrap();

        let out = drive(&runner, &mut session, Some("A recipe app"), "/done\nhuh\nr add pricing\nq\n").await;
        assert!(out.contains("v1.0.0"));
        assert!(out.contains("Use 'a' to accept"));
        assert!(out.contains("With pricing."));
        assert_eq!(
            session.document(DocumentType::ProjectVision).unwrap().version,
            "1.0.1"
        );
        assert!(!session.has_document(DocumentType::Prd));
    }

    #[tokio::test]
    async fn accepting_everything_finishes_the_pipeline() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Box::new(OfflineClient::new()));
        let mut session = Session::create(dir.path(), "Recipes").unwrap();

        // Accept every stage; take the recommended option for the decision.
        let mut script = String::from("/done\n");
        for _ in 0..6 {
            script.push_str("a\n");
        }
        script.push('\n');
        for _ in 0..4 {
            script.push_str("a\n");
        }
        let out = drive(&runner, &mut session, Some("A recipe app"), &script).await;

        assert!(out.contains("All stages complete."));
        assert!(out.contains("[placeholder-architecture-style] Architecture Style"));
        assert!(workflow::next_stage(&session).is_none());
        let log = runner.decisions(&session).unwrap();
        assert!(log.all_completed());
        assert_eq!(log.decisions[0].choice.as_deref(), Some("Modular monolith"));
    }

    #[tokio::test]
    async fn end_of_input_leaves_quietly() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Box::new(ScriptedClient::new(Vec::<String>::new())));
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        let out = drive(&runner, &mut session, None, "").await;
        assert!(out.starts_with("Describe your idea: "));
    }
}
