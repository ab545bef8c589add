//! Runs one pipeline stage end to end: inputs in, document out, session
//! updated.

use crate::agents::{self, AgentContext, ArchitectInputs, ResearchKind, ResearchTeam};
use crate::client::completion_options;
use anyhow::Context;
use ideaflow_core::config::Config;
use ideaflow_core::decision::DecisionLog;
use ideaflow_core::document::{Document, DocumentStore};
use ideaflow_core::session::{Session, StageEvent};
use ideaflow_core::transcript::Transcript;
use ideaflow_core::types::{DocumentType, Stage};
use ideaflow_core::{vcs, workflow, IdeaflowError};
use llm_agent::{ChatClient, SearchClient, SearchResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Session metadata key holding the idea the session started from.
pub const IDEA_KEY: &str = "idea";

/// Frontmatter key holding the feedback behind the latest revision.
pub const LAST_FEEDBACK_KEY: &str = "last_feedback";

pub struct StageRunner {
    root: PathBuf,
    config: Config,
    client: Box<dyn ChatClient>,
    search: SearchClient,
    store: DocumentStore,
}

impl StageRunner {
    pub fn new(root: &Path, config: Config, client: Box<dyn ChatClient>, search: SearchClient) -> Self {
        let store = DocumentStore::new(root, vcs::open(root, config.versioning.enabled));
        Self {
            root: root.to_path_buf(),
            config,
            client,
            search,
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn ctx(&self) -> AgentContext<'_> {
        AgentContext::new(self.client.as_ref(), completion_options(&self.config.llm))
    }

    // -----------------------------------------------------------------------
    // Brainstorm
    // -----------------------------------------------------------------------

    pub fn transcript(&self, session: &Session) -> anyhow::Result<Transcript> {
        Transcript::load(&self.root, &session.id, Stage::BusinessAnalyst)
            .context("failed to load brainstorm transcript")
    }

    /// One Business Analyst turn. With `start` (or an empty transcript) the
    /// message opens a fresh conversation as the project idea.
    pub async fn brainstorm(&self, session: &mut Session, message: &str, start: bool) -> anyhow::Result<String> {
        let mut transcript = self.transcript(session)?;
        let ctx = self.ctx();
        let reply = if start || transcript.is_empty() {
            transcript = Transcript::new(Stage::BusinessAnalyst);
            session.set_metadata(IDEA_KEY, message.trim());
            session.save(&self.root).context("failed to save session")?;
            agents::start_brainstorm(&ctx, &mut transcript, message).await?
        } else {
            agents::reply(&ctx, &mut transcript, message).await?
        };
        transcript
            .save(&self.root, &session.id)
            .context("failed to save brainstorm transcript")?;
        Ok(reply)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Run `stage`, writing its document (or a revision when it already
    /// exists) and recording the outcome in the session's workflow log.
    pub async fn run(&self, session: &mut Session, stage: Stage) -> anyhow::Result<Document> {
        workflow::check_ready(session, stage)?;

        session.record_stage(stage, StageEvent::Started);
        session.save(&self.root).context("failed to save session")?;
        tracing::info!(session = %session.id, stage = %stage, "running stage");

        match self.execute(session, stage).await {
            Ok(doc) => {
                session.add_document(doc.to_ref());
                session.record_stage(stage, StageEvent::Completed);
                session.save(&self.root).context("failed to save session")?;
                tracing::info!(
                    session = %session.id,
                    stage = %stage,
                    path = %doc.path,
                    version = %doc.meta.version,
                    "stage completed"
                );
                Ok(doc)
            }
            Err(e) => {
                tracing::error!(session = %session.id, stage = %stage, error = %format!("{e:#}"), "stage failed");
                session.record_stage(stage, StageEvent::Failed);
                if let Err(save_err) = session.save(&self.root) {
                    tracing::warn!(error = %save_err, "failed to record stage failure");
                }
                Err(e.context(format!("stage '{stage}' failed")))
            }
        }
    }

    /// Run the first stage that is ready. `None` once every stage is done.
    pub async fn run_next(&self, session: &mut Session) -> anyhow::Result<Option<(Stage, Document)>> {
        let Some(stage) = workflow::next_stage(session) else {
            return Ok(None);
        };
        let doc = self.run(session, stage).await?;
        Ok(Some((stage, doc)))
    }

    async fn execute(&self, session: &Session, stage: Stage) -> anyhow::Result<Document> {
        let inputs = self.load_inputs(session, stage)?;
        let text = |t: DocumentType| inputs.get(&t).map(|d| d.body.as_str()).unwrap_or_default();
        let ctx = self.ctx();
        let mut extra = BTreeMap::new();

        let body = match stage {
            Stage::BusinessAnalyst => {
                let transcript = self.vision_transcript(session)?;
                agents::create_vision(&ctx, &transcript).await?
            }
            Stage::ProductManager => {
                let references = self.references(&session.project_name).await;
                if !references.is_empty() {
                    extra.insert("references".to_string(), yaml_list(references.iter().map(|r| r.link.clone())));
                }
                agents::create_prd(&ctx, text(DocumentType::ProjectVision), &references).await?
            }
            Stage::ArchitectFoundation => {
                agents::foundation_requirements(&ctx, text(DocumentType::ProjectVision), text(DocumentType::Prd))
                    .await?
            }
            Stage::FoundationResearch | Stage::TechnologyResearch => {
                let (kind, requirements) = if stage == Stage::FoundationResearch {
                    (ResearchKind::Foundation, DocumentType::FoundationResearchRequirements)
                } else {
                    (ResearchKind::Technology, DocumentType::TechnologyResearchRequirements)
                };
                let team = ResearchTeam {
                    kind,
                    paradigms: &self.config.research.paradigms,
                    preview_chars: self.config.research.preview_chars,
                };
                extra.insert(
                    "paradigms".to_string(),
                    yaml_list(team.paradigms.iter().map(|p| p.as_str().to_string())),
                );
                team.run(&ctx, text(requirements)).await?
            }
            Stage::ArchitectTechnology => {
                agents::technology_requirements(
                    &ctx,
                    text(DocumentType::ProjectVision),
                    text(DocumentType::Prd),
                    text(DocumentType::FoundationResearchReport),
                )
                .await?
            }
            Stage::ArchitectFinal => {
                let architect_inputs = ArchitectInputs {
                    vision: text(DocumentType::ProjectVision),
                    prd: text(DocumentType::Prd),
                    foundation: text(DocumentType::FoundationResearchReport),
                    technology: text(DocumentType::TechnologyResearchReport),
                };
                let mut log = self.decisions(session)?;
                if log.is_empty() {
                    log = DecisionLog::new(agents::analyze(&ctx, architect_inputs).await?);
                    log.save(&self.root, &session.id)
                        .context("failed to save decisions")?;
                }
                extra.insert(
                    "decisions".to_string(),
                    yaml_list(log.decisions.iter().filter(|d| d.completed).map(|d| d.id.clone())),
                );
                agents::architecture(&ctx, architect_inputs, &log).await?
            }
            Stage::Standards => agents::standards(&ctx, text(DocumentType::Architecture)).await?,
            Stage::ProductOwner => {
                agents::epics(
                    &ctx,
                    text(DocumentType::Prd),
                    text(DocumentType::Architecture),
                    text(DocumentType::StandardsPatterns),
                )
                .await?
            }
            Stage::ScrumMaster => {
                agents::stories(
                    &ctx,
                    text(DocumentType::EpicsStories),
                    text(DocumentType::Architecture),
                    text(DocumentType::StandardsPatterns),
                )
                .await?
            }
        };

        extra.insert("stage".to_string(), stage.as_str().into());
        extra.insert("role".to_string(), stage.role().as_str().into());
        extra.insert("model".to_string(), self.config.llm.model.clone().into());
        let derived_from = inputs.values().map(|d| d.path.clone()).collect();
        self.write(session, stage.output(), &body, derived_from, extra)
    }

    /// Latest document of each input type.
    fn load_inputs(&self, session: &Session, stage: Stage) -> anyhow::Result<BTreeMap<DocumentType, Document>> {
        let mut inputs = BTreeMap::new();
        for &t in stage.inputs() {
            let r = session.document(t).ok_or_else(|| IdeaflowError::MissingDocument {
                document: t.to_string(),
                stage: stage.to_string(),
            })?;
            let doc = self
                .store
                .get(&r.path)
                .with_context(|| format!("failed to read {t} input"))?;
            inputs.insert(t, doc);
        }
        Ok(inputs)
    }

    /// The brainstorm transcript, or one seeded from the stored idea when no
    /// conversation took place.
    fn vision_transcript(&self, session: &Session) -> anyhow::Result<Transcript> {
        let mut transcript = self.transcript(session)?;
        if transcript.is_empty() {
            let idea = session.metadata(IDEA_KEY).ok_or_else(|| {
                anyhow::anyhow!("no idea recorded for this session; run 'ideaflow brainstorm --start <idea>' first")
            })?;
            transcript.push(ideaflow_core::transcript::Speaker::User, idea);
        }
        Ok(transcript)
    }

    /// Web results for the PRD. Search failures never fail the stage.
    async fn references(&self, project: &str) -> Vec<SearchResult> {
        if !self.search.is_configured() {
            return Vec::new();
        }
        match self.search.search(project, self.config.search.results).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "web search failed; continuing without references");
                Vec::new()
            }
        }
    }

    fn write(
        &self,
        session: &Session,
        document_type: DocumentType,
        body: &str,
        derived_from: Vec<String>,
        mut extra: BTreeMap<String, serde_yaml::Value>,
    ) -> anyhow::Result<Document> {
        let doc = match session.document(document_type) {
            Some(existing) => {
                // A regenerated document no longer reflects earlier feedback.
                extra.insert(LAST_FEEDBACK_KEY.to_string(), serde_yaml::Value::Null);
                self.store.revise(
                    &existing.path,
                    body,
                    extra,
                    Some(&format!("Regenerate {document_type}")),
                )
            }
            None => {
                let title = format!("{} {}", session.project_name, document_type.title());
                self.store
                    .create(session.id, document_type, &title, body, derived_from, extra)
            }
        };
        doc.with_context(|| format!("failed to write {document_type}"))
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    pub fn decisions(&self, session: &Session) -> anyhow::Result<DecisionLog> {
        DecisionLog::load(&self.root, &session.id).context("failed to load decisions")
    }

    /// Identify the open architectural decisions, replacing any earlier
    /// analysis.
    pub async fn analyze(&self, session: &mut Session) -> anyhow::Result<DecisionLog> {
        workflow::check_ready(session, Stage::ArchitectFinal)?;
        let inputs = self.load_inputs(session, Stage::ArchitectFinal)?;
        let text = |t: DocumentType| inputs.get(&t).map(|d| d.body.as_str()).unwrap_or_default();
        let architect_inputs = ArchitectInputs {
            vision: text(DocumentType::ProjectVision),
            prd: text(DocumentType::Prd),
            foundation: text(DocumentType::FoundationResearchReport),
            technology: text(DocumentType::TechnologyResearchReport),
        };

        let log = DecisionLog::new(agents::analyze(&self.ctx(), architect_inputs).await?);
        log.save(&self.root, &session.id)
            .context("failed to save decisions")?;
        session.record_workflow_state(format!("{}:analyzed", Stage::ArchitectFinal.as_str()));
        session.save(&self.root).context("failed to save session")?;
        Ok(log)
    }

    // -----------------------------------------------------------------------
    // Revision
    // -----------------------------------------------------------------------

    /// Revise the latest document of `document_type` from `feedback`.
    pub async fn revise(
        &self,
        session: &mut Session,
        document_type: DocumentType,
        feedback: &str,
    ) -> anyhow::Result<Document> {
        let latest = session
            .document(document_type)
            .ok_or_else(|| IdeaflowError::DocumentNotFound(document_type.to_string()))?;
        let current = self.store.get(&latest.path)?;

        let stage = document_type.produced_by();
        let agent = agents::for_role(stage.role());
        let body = agent.revise(&self.ctx(), &current.body, feedback).await?;

        let summary = feedback.lines().next().unwrap_or_default().trim();
        let mut extra = BTreeMap::new();
        extra.insert(LAST_FEEDBACK_KEY.to_string(), feedback.trim().into());
        let doc = self
            .store
            .revise(&current.path, &body, extra, Some(&format!("Revise {document_type}: {summary}")))
            .with_context(|| format!("failed to revise {document_type}"))?;

        session.add_document(doc.to_ref());
        session.record_workflow_state(format!("{}:revised", stage.as_str()));
        session.save(&self.root).context("failed to save session")?;
        tracing::info!(path = %doc.path, version = %doc.meta.version, "revised document");
        Ok(doc)
    }
}

fn yaml_list(items: impl Iterator<Item = String>) -> serde_yaml::Value {
    serde_yaml::Value::Sequence(items.map(serde_yaml::Value::String).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::types::Paradigm;
    use llm_agent::{OfflineClient, ScriptedClient};
    use mockito::Matcher;
    use tempfile::TempDir;

    fn config(paradigms: Vec<Paradigm>) -> Config {
        let mut config = Config::new("recipes");
        config.versioning.enabled = false;
        config.research.paradigms = paradigms;
        config
    }

    fn runner(dir: &TempDir, client: Box<dyn ChatClient>, paradigms: Vec<Paradigm>) -> StageRunner {
        StageRunner::new(dir.path(), config(paradigms), client, SearchClient::new(None, None))
    }

    /// Runner whose web search goes to `search_url`, with a vision already
    /// written so the PM stage can run.
    async fn pm_runner(dir: &TempDir, search_url: &str) -> (StageRunner, Session) {
        let client = ScriptedClient::new(["# Vision", "# PRD"]);
        let search = SearchClient::with_base_url(search_url, Some("key".into()), Some("engine".into()));
        let runner = StageRunner::new(dir.path(), config(vec![]), Box::new(client), search);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        session.set_metadata(IDEA_KEY, "A recipe app");
        runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();
        (runner, session)
    }

    #[tokio::test]
    async fn stage_refuses_to_run_without_inputs() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Box::new(ScriptedClient::new(["unused"])), vec![Paradigm::Experimental]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();

        let err = runner.run(&mut session, Stage::ProductManager).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IdeaflowError>(),
            Some(IdeaflowError::MissingDocument { .. })
        ));
        assert!(session.workflow.is_empty());
    }

    #[tokio::test]
    async fn vision_from_brainstorm_then_prd() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(["Who cooks?", "# Vision\n\nShare recipes.", "# PRD"]);
        let runner = runner(&dir, Box::new(client), vec![Paradigm::Experimental]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();

        let reply = runner.brainstorm(&mut session, "A recipe app", false).await.unwrap();
        assert_eq!(reply, "Who cooks?");
        assert_eq!(session.metadata(IDEA_KEY), Some("A recipe app"));

        let vision = runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();
        assert_eq!(vision.meta.version, "1.0.0");
        assert_eq!(vision.body, "# Vision\n\nShare recipes.\n");
        assert_eq!(vision.meta.extra["stage"], serde_yaml::Value::from("business_analyst"));

        let prd = runner.run(&mut session, Stage::ProductManager).await.unwrap();
        assert_eq!(prd.meta.derived_from, vec![vision.path.clone()]);

        let states: Vec<&str> = session.workflow.iter().map(|e| e.state.as_str()).collect();
        assert_eq!(
            states,
            [
                "business_analyst:started",
                "business_analyst:completed",
                "product_manager:started",
                "product_manager:completed"
            ]
        );
        let reloaded = Session::load(dir.path(), &session.id).unwrap();
        assert_eq!(reloaded.documents.len(), 2);
    }

    #[tokio::test]
    async fn failed_stage_is_recorded() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Box::new(ScriptedClient::new(Vec::<String>::new())), vec![]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        session.set_metadata(IDEA_KEY, "A recipe app");

        let err = runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap_err();
        assert!(format!("{err:#}").contains("stage 'business_analyst' failed"));
        let reloaded = Session::load(dir.path(), &session.id).unwrap();
        assert_eq!(
            reloaded.last_workflow_state().map(|e| e.state.as_str()),
            Some("business_analyst:failed")
        );
        assert!(reloaded.documents.is_empty());
    }

    #[tokio::test]
    async fn rerun_revises_instead_of_overwriting() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(["# Vision v1", "# Vision v2"]);
        let runner = runner(&dir, Box::new(client), vec![]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        session.set_metadata(IDEA_KEY, "A recipe app");

        let first = runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();
        let second = runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(second.meta.version, "1.0.1");
        assert_eq!(session.documents.len(), 2);
        assert_eq!(session.document(DocumentType::ProjectVision).unwrap().version, "1.0.1");
    }

    #[tokio::test]
    async fn revise_bumps_version_and_appends_ref() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(["# Vision", "# Vision\n\nNow with meal plans."]);
        let runner = runner(&dir, Box::new(client), vec![]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        session.set_metadata(IDEA_KEY, "A recipe app");
        runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();

        let doc = runner
            .revise(&mut session, DocumentType::ProjectVision, "Add meal plans")
            .await
            .unwrap();
        assert_eq!(doc.meta.version, "1.0.1");
        assert!(doc.body.contains("meal plans"));
        assert_eq!(doc.meta.extra["last_feedback"], serde_yaml::Value::from("Add meal plans"));
        assert_eq!(session.documents.len(), 2);
        assert_eq!(
            session.last_workflow_state().map(|e| e.state.as_str()),
            Some("business_analyst:revised")
        );
    }

    #[tokio::test]
    async fn regenerating_drops_last_feedback() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(["# Vision", "# Vision\n\nWith meal plans.", "# Vision v3"]);
        let runner = runner(&dir, Box::new(client), vec![]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        session.set_metadata(IDEA_KEY, "A recipe app");
        runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();
        runner
            .revise(&mut session, DocumentType::ProjectVision, "Add meal plans")
            .await
            .unwrap();

        let regenerated = runner.run(&mut session, Stage::BusinessAnalyst).await.unwrap();
        assert_eq!(regenerated.meta.version, "1.0.2");
        assert!(!regenerated.meta.extra.contains_key(LAST_FEEDBACK_KEY));
        assert_eq!(regenerated.meta.extra["stage"], serde_yaml::Value::from("business_analyst"));
        let stored = runner.store().get(&regenerated.path).unwrap();
        assert!(!stored.meta.extra.contains_key(LAST_FEEDBACK_KEY));
    }

    #[tokio::test]
    async fn prd_records_search_references() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex("^/customsearch/v1".into()))
            .match_query(Matcher::UrlEncoded("q".into(), "Recipes".into()))
            .with_status(200)
            .with_body(
                r#"{"items":[
                    {"title":"Paprika","link":"https://example.com/paprika","snippet":"Recipe manager"},
                    {"title":"Mealie","link":"https://example.com/mealie","snippet":"Self-hosted"}
                ]}"#,
            )
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let (runner, mut session) = pm_runner(&dir, &server.url()).await;

        let prd = runner.run(&mut session, Stage::ProductManager).await.unwrap();
        mock.assert_async().await;
        assert_eq!(prd.body, "# PRD\n");
        assert_eq!(
            prd.meta.extra["references"],
            serde_yaml::Value::Sequence(vec![
                "https://example.com/paprika".into(),
                "https://example.com/mealie".into(),
            ])
        );
    }

    #[tokio::test]
    async fn search_rejection_does_not_fail_prd() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .with_status(403)
            .with_body("daily limit exceeded")
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let (runner, mut session) = pm_runner(&dir, &server.url()).await;

        let prd = runner.run(&mut session, Stage::ProductManager).await.unwrap();
        mock.assert_async().await;
        assert_eq!(prd.body, "# PRD\n");
        assert!(!prd.meta.extra.contains_key("references"));
        assert_eq!(
            session.last_workflow_state().map(|e| e.state.as_str()),
            Some("product_manager:completed")
        );
    }

    #[tokio::test]
    async fn revise_without_document_fails() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Box::new(ScriptedClient::new(["x"])), vec![]);
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        assert!(runner
            .revise(&mut session, DocumentType::Prd, "more detail")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn offline_pipeline_runs_to_completion() {
        let dir = TempDir::new().unwrap();
        let paradigms = vec![Paradigm::EstablishedApproaches, Paradigm::FirstPrinciples];
        let runner = runner(&dir, Box::new(OfflineClient::new()), paradigms.clone());
        let mut session = Session::create(dir.path(), "Recipes").unwrap();
        session.set_metadata(IDEA_KEY, "A recipe app");

        let mut ran = Vec::new();
        while let Some((stage, _)) = runner.run_next(&mut session).await.unwrap() {
            ran.push(stage);
        }
        assert_eq!(ran, Stage::all());
        assert!(workflow::next_stage(&session).is_none());

        let report_ref = session.document(DocumentType::FoundationResearchReport).unwrap();
        let report = runner.store().get(&report_ref.path).unwrap();
        for p in &paradigms {
            assert!(report.body.contains(&format!("### {}", p.team_name())));
        }

        // The offline model proposes one decision, which stays pending.
        let log = runner.decisions(&session).unwrap();
        assert_eq!(log.decisions.len(), 1);
        assert!(!log.all_completed());

        let stories = session.document(DocumentType::Stories).unwrap();
        let doc = runner.store().get(&stories.path).unwrap();
        assert_eq!(doc.meta.derived_from.len(), 3);
    }
}
