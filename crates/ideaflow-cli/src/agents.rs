//! Agent roles: one system prompt per role plus the prompts each stage sends.

use anyhow::Context;
use ideaflow_core::decision::{self, Decision, DecisionLog};
use ideaflow_core::evaluation::{self, EvaluationMatrix};
use ideaflow_core::prompt::PromptTemplate;
use ideaflow_core::transcript::{Speaker, Transcript};
use ideaflow_core::types::{Paradigm, Role};
use llm_agent::{format_results, ChatClient, ChatMessage, CompletionOptions, CompletionRequest, SearchResult};

// ─── Context ──────────────────────────────────────────────────────────────

/// The model an agent talks to and the sampling options it uses.
pub struct AgentContext<'a> {
    pub client: &'a dyn ChatClient,
    pub options: CompletionOptions,
}

impl<'a> AgentContext<'a> {
    pub fn new(client: &'a dyn ChatClient, options: CompletionOptions) -> Self {
        Self { client, options }
    }
}

// ─── Agent ────────────────────────────────────────────────────────────────

/// A workflow role bound to its system prompt.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    pub role: Role,
    pub system_prompt: &'static str,
}

impl Agent {
    pub const fn new(role: Role, system_prompt: &'static str) -> Self {
        Self {
            role,
            system_prompt,
        }
    }

    /// Send `messages` after the system prompt and return the cleaned reply.
    pub async fn ask(&self, ctx: &AgentContext<'_>, messages: Vec<ChatMessage>) -> anyhow::Result<String> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(self.system_prompt));
        all.extend(messages);

        tracing::debug!(role = self.role.as_str(), messages = all.len(), "asking agent");
        let completion = ctx
            .client
            .complete(CompletionRequest::new(all, ctx.options.clone()))
            .await
            .with_context(|| format!("{} request failed", self.role.display_name()))?;
        if completion.truncated() {
            tracing::warn!(
                role = self.role.as_str(),
                max_tokens = ctx.options.max_tokens,
                "reply was cut off at the token limit"
            );
        }
        Ok(clean_markdown(&completion.content))
    }

    async fn prompt(&self, ctx: &AgentContext<'_>, text: String) -> anyhow::Result<String> {
        self.ask(ctx, vec![ChatMessage::user(text)]).await
    }

    /// Rewrite `document` according to `feedback`.
    pub async fn revise(&self, ctx: &AgentContext<'_>, document: &str, feedback: &str) -> anyhow::Result<String> {
        let text = REVISION.render(&[("document", document), ("feedback", feedback)]);
        self.prompt(ctx, text).await
    }
}

pub static BUSINESS_ANALYST: Agent = Agent::new(
    Role::BusinessAnalyst,
    "You are an experienced Business Analyst. You help people turn rough ideas into \
     clear project visions by asking focused questions about goals, users, and scope. \
     Keep replies short during discovery and ask one or two questions at a time.",
);

pub static PRODUCT_MANAGER: Agent = Agent::new(
    Role::ProductManager,
    "You are a senior Product Manager. You write precise product requirements documents \
     with measurable goals, user personas, functional and non-functional requirements, \
     and explicit out-of-scope items.",
);

pub static ARCHITECT: Agent = Agent::new(
    Role::Architect,
    "You are a pragmatic Software Architect. You identify what must be researched before \
     committing to a design, weigh trade-offs openly, and produce architecture documents \
     that a delivery team can act on.",
);

pub static RESEARCH_TEAM: Agent = Agent::new(
    Role::ResearchTeam,
    "You are a technical research team. You investigate options thoroughly, cite concrete \
     tools and prior art, and report findings with their strengths, weaknesses, and risks.",
);

pub static STANDARDS_ENGINEER: Agent = Agent::new(
    Role::StandardsEngineer,
    "You are a Standards Engineer. You turn an architecture into concrete coding \
     standards, project layout, naming conventions, and reusable patterns.",
);

pub static PRODUCT_OWNER: Agent = Agent::new(
    Role::ProductOwner,
    "You are a Product Owner. You break requirements into prioritized epics with clear \
     business value and acceptance criteria.",
);

pub static SCRUM_MASTER: Agent = Agent::new(
    Role::ScrumMaster,
    "You are a Scrum Master. You split epics into small, independently deliverable user \
     stories with acceptance criteria, estimates, and dependencies.",
);

/// The agent that speaks for `role`.
pub fn for_role(role: Role) -> &'static Agent {
    match role {
        Role::BusinessAnalyst => &BUSINESS_ANALYST,
        Role::ProductManager => &PRODUCT_MANAGER,
        Role::Architect => &ARCHITECT,
        Role::ResearchTeam => &RESEARCH_TEAM,
        Role::StandardsEngineer => &STANDARDS_ENGINEER,
        Role::ProductOwner => &PRODUCT_OWNER,
        Role::ScrumMaster => &SCRUM_MASTER,
    }
}

// ─── Prompts ──────────────────────────────────────────────────────────────

const REVISION: PromptTemplate<'static> = PromptTemplate::new(
    "## Revise the Document\n\n\
     Update the document below according to the feedback. Return the complete updated \
     document in markdown and nothing else.\n\n\
     ### Feedback\n\n{feedback}\n\n### Current Document\n\n{document}",
);

const BRAINSTORM_OPENING: PromptTemplate<'static> = PromptTemplate::new(
    "I have a project idea I would like to explore:\n\n{idea}\n\n\
     Ask me the questions you need to understand the problem, the users, and what \
     success looks like.",
);

const VISION: &str = "## Create the Project Vision\n\n\
     Based on our conversation, write the project vision document in markdown with these \
     sections: Overview, Problem Statement, Target Users, Goals, Key Features, Success \
     Metrics, Constraints and Assumptions, Open Questions. Return only the document.";

const PRD: PromptTemplate<'static> = PromptTemplate::new(
    "## Create the Product Requirements Document\n\n\
     Write a PRD for the project described by this vision. Include: Summary, Personas, \
     User Journeys, Functional Requirements (numbered), Non-Functional Requirements, \
     Success Metrics, Release Scope, Out of Scope.\n\n\
     ### Project Vision\n\n{vision}{references}",
);

const FOUNDATION_REQUIREMENTS: PromptTemplate<'static> = PromptTemplate::new(
    "## Define Foundation Research Requirements\n\n\
     Before any technology is chosen, list what must be researched about the problem \
     domain: comparable products, domain constraints, data and integration needs, \
     regulatory concerns, and scale expectations. For each topic give the question, why \
     it matters, and what a good answer looks like.\n\n\
     ### Project Vision\n\n{vision}\n\n### PRD\n\n{prd}",
);

const TECHNOLOGY_REQUIREMENTS: PromptTemplate<'static> = PromptTemplate::new(
    "## Define Technology Research Requirements\n\n\
     Using the foundation research, list the technology questions to investigate: \
     languages and frameworks, storage, hosting, integration protocols, security, and \
     tooling. For each topic give the candidate options and the evaluation criteria.\n\n\
     ### Project Vision\n\n{vision}\n\n### PRD\n\n{prd}\n\n\
     ### Foundation Research Report\n\n{foundation}",
);

const DECISION_ANALYSIS: PromptTemplate<'static> = PromptTemplate::new(
    "## Identify Architectural Decisions\n\n\
     From the material below, identify the key architectural decisions that still need \
     a choice. Format your response as a JSON array of objects with the fields \
     \"id\" (kebab-case), \"category\", \"title\", \"description\", \"options\" (objects \
     with \"name\", \"pros\", \"cons\"), and \"recommendation\" (an option name). Return \
     only the JSON array.\n\n\
     ### Project Vision\n\n{vision}\n\n### PRD\n\n{prd}\n\n\
     ### Foundation Research Report\n\n{foundation}\n\n\
     ### Technology Research Report\n\n{technology}",
);

const ARCHITECTURE: PromptTemplate<'static> = PromptTemplate::new(
    "## Create the Architecture Document\n\n\
     Write the architecture document in markdown: System Overview, Components and \
     Responsibilities, Data Model, Integrations, Deployment, Security, Observability, \
     Risks. Honour the decisions below.\n\n\
     ### Decisions\n\n{decisions}\n\n\
     ### Project Vision\n\n{vision}\n\n### PRD\n\n{prd}\n\n\
     ### Foundation Research Report\n\n{foundation}\n\n\
     ### Technology Research Report\n\n{technology}",
);

const RESEARCH_LENS: PromptTemplate<'static> = PromptTemplate::new(
    "## {team} Findings\n\n\
     You are the {team}. Investigate the {kind} research requirements below through \
     one lens: {focus}. Report concrete options, prior art, strengths, weaknesses, and \
     risks.\n\n### Research Requirements\n\n{requirements}",
);

const RESEARCH_SYNTHESIS: PromptTemplate<'static> = PromptTemplate::new(
    "## {title}\n\n\
     Synthesize the team findings below into one {kind} research report: key findings, \
     a comparison of the options, recommendations, and open risks.\n\n\
     ### Research Requirements\n\n{requirements}\n\n### Team Findings\n\n{findings}",
);

const EVALUATION_CRITERIA: PromptTemplate<'static> = PromptTemplate::new(
    "## Extract Technology Evaluation Criteria\n\n\
     From the requirements and research below, identify 5 to 7 criteria for choosing \
     between the candidate technology stacks. Always include \"Technology Alignment\": how \
     well a stack fits the core requirements without adding needless complexity. Format \
     your response as a JSON object with a \"criteria\" list of objects with the fields \
     \"name\", \"description\", and \"importance\" (LOW, MEDIUM, HIGH, or VERY HIGH).\n\n\
     ### Research Requirements\n\n{requirements}\n\n### Research Synthesis\n\n{synthesis}",
);

const STACK_RATINGS: PromptTemplate<'static> = PromptTemplate::new(
    "## Rate the Technology Stacks\n\n\
     Rate every candidate technology stack in the research below against each criterion \
     (Very Low, Low, Medium, High, or Very High). Note where a stack adds, enhances, or \
     changes a capability beyond the requested scope, and whether that helps or hurts. \
     Format your response as a JSON object with a \"ratings\" list of objects with the \
     fields \"stack\", \"criterion\", and \"rating\", and a \"notes\" list of objects \
     with the fields \"stack\" and \"note\".\n\n\
     ### Criteria\n\n{criteria}\n\n### Research Synthesis\n\n{synthesis}",
);

const STANDARDS: PromptTemplate<'static> = PromptTemplate::new(
    "## Create Standards and Patterns\n\n\
     From this architecture, write the engineering standards: repository layout, coding \
     conventions, error handling, logging, testing strategy, and reusable patterns with \
     short examples.\n\n### Architecture\n\n{architecture}",
);

const EPICS: PromptTemplate<'static> = PromptTemplate::new(
    "## Create Epics and Stories\n\n\
     Break the product into prioritized epics. For each epic give the goal, business \
     value, acceptance criteria, and the high-level stories it contains.\n\n\
     ### PRD\n\n{prd}\n\n### Architecture\n\n{architecture}\n\n\
     ### Standards and Patterns\n\n{standards}",
);

const STORIES: PromptTemplate<'static> = PromptTemplate::new(
    "## Create User Stories\n\n\
     Split every epic into implementable user stories. Each story needs: title, \"As a / \
     I want / so that\" statement, acceptance criteria, technical notes that follow the \
     standards, an estimate, and dependencies.\n\n\
     ### Epics\n\n{epics}\n\n### Architecture\n\n{architecture}\n\n\
     ### Standards and Patterns\n\n{standards}",
);

// ─── Business Analyst ─────────────────────────────────────────────────────

fn transcript_messages(transcript: &Transcript) -> Vec<ChatMessage> {
    transcript
        .entries
        .iter()
        .map(|e| match e.speaker {
            Speaker::User => ChatMessage::user(e.content.clone()),
            Speaker::Assistant => ChatMessage::assistant(e.content.clone()),
        })
        .collect()
}

/// Open the discovery conversation with `idea`. Both turns are appended to
/// `transcript`.
pub async fn start_brainstorm(
    ctx: &AgentContext<'_>,
    transcript: &mut Transcript,
    idea: &str,
) -> anyhow::Result<String> {
    transcript.push(Speaker::User, BRAINSTORM_OPENING.render(&[("idea", idea.trim())]));
    let reply = BUSINESS_ANALYST.ask(ctx, transcript_messages(transcript)).await?;
    transcript.push(Speaker::Assistant, reply.clone());
    Ok(reply)
}

/// Continue the conversation with the user's `text`.
pub async fn reply(ctx: &AgentContext<'_>, transcript: &mut Transcript, text: &str) -> anyhow::Result<String> {
    transcript.push(Speaker::User, text.trim());
    let reply = BUSINESS_ANALYST.ask(ctx, transcript_messages(transcript)).await?;
    transcript.push(Speaker::Assistant, reply.clone());
    Ok(reply)
}

/// Turn the conversation into the vision document. The creation request is
/// sent after the transcript but never recorded in it.
pub async fn create_vision(ctx: &AgentContext<'_>, transcript: &Transcript) -> anyhow::Result<String> {
    let mut messages = transcript_messages(transcript);
    messages.push(ChatMessage::user(VISION));
    BUSINESS_ANALYST.ask(ctx, messages).await
}

// ─── Product Manager ──────────────────────────────────────────────────────

pub async fn create_prd(ctx: &AgentContext<'_>, vision: &str, references: &[SearchResult]) -> anyhow::Result<String> {
    let references = if references.is_empty() {
        String::new()
    } else {
        format!(
            "\n\n### Reference Material\n\nWeb results that may inform the market context:\n\n{}",
            format_results(references)
        )
    };
    PRODUCT_MANAGER
        .prompt(ctx, PRD.render(&[("vision", vision), ("references", &references)]))
        .await
}

// ─── Architect ────────────────────────────────────────────────────────────

pub async fn foundation_requirements(ctx: &AgentContext<'_>, vision: &str, prd: &str) -> anyhow::Result<String> {
    ARCHITECT
        .prompt(ctx, FOUNDATION_REQUIREMENTS.render(&[("vision", vision), ("prd", prd)]))
        .await
}

pub async fn technology_requirements(
    ctx: &AgentContext<'_>,
    vision: &str,
    prd: &str,
    foundation: &str,
) -> anyhow::Result<String> {
    let text = TECHNOLOGY_REQUIREMENTS.render(&[
        ("vision", vision),
        ("prd", prd),
        ("foundation", foundation),
    ]);
    ARCHITECT.prompt(ctx, text).await
}

/// Inputs the final architect pass reads.
#[derive(Debug, Clone, Copy)]
pub struct ArchitectInputs<'a> {
    pub vision: &'a str,
    pub prd: &'a str,
    pub foundation: &'a str,
    pub technology: &'a str,
}

impl ArchitectInputs<'_> {
    fn vars(&self) -> [(&str, &str); 4] {
        [
            ("vision", self.vision),
            ("prd", self.prd),
            ("foundation", self.foundation),
            ("technology", self.technology),
        ]
    }
}

/// Ask for the open architectural decisions in a separate request whose
/// reply is parsed as JSON.
pub async fn analyze(ctx: &AgentContext<'_>, inputs: ArchitectInputs<'_>) -> anyhow::Result<Vec<Decision>> {
    let reply = ARCHITECT
        .prompt(ctx, DECISION_ANALYSIS.render(&inputs.vars()))
        .await?;
    let decisions = decision::parse_decisions(&reply).context("failed to parse architectural decisions")?;
    tracing::info!(decisions = decisions.len(), "identified architectural decisions");
    Ok(decisions)
}

/// Final architecture document built from the completed decisions.
pub async fn architecture(
    ctx: &AgentContext<'_>,
    inputs: ArchitectInputs<'_>,
    decisions: &DecisionLog,
) -> anyhow::Result<String> {
    for d in decisions.pending() {
        tracing::warn!(decision = %d.id, title = %d.title, "decision still pending; skipping");
    }
    let summary = decisions.summary();
    let summary = if summary.trim().is_empty() {
        "No decisions were recorded. State the assumptions you make.".to_string()
    } else {
        summary
    };

    let mut vars = inputs.vars().to_vec();
    vars.push(("decisions", &summary));
    ARCHITECT.prompt(ctx, ARCHITECTURE.render(&vars)).await
}

// ─── Research Team ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchKind {
    Foundation,
    Technology,
}

impl ResearchKind {
    fn label(self) -> &'static str {
        match self {
            ResearchKind::Foundation => "foundation",
            ResearchKind::Technology => "technology",
        }
    }

    fn report_title(self) -> &'static str {
        match self {
            ResearchKind::Foundation => "Foundation Research Report",
            ResearchKind::Technology => "Technology Research Report",
        }
    }
}

/// One finding per paradigm lens.
#[derive(Debug, Clone)]
pub struct Finding {
    pub paradigm: Paradigm,
    pub content: String,
}

/// Research teams, one per paradigm, queried one after another and then
/// synthesized into a single report.
pub struct ResearchTeam<'a> {
    pub kind: ResearchKind,
    pub paradigms: &'a [Paradigm],
    /// Characters of each finding passed to the synthesis prompt.
    pub preview_chars: usize,
}

impl ResearchTeam<'_> {
    pub async fn investigate(&self, ctx: &AgentContext<'_>, requirements: &str) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::with_capacity(self.paradigms.len());
        for &paradigm in self.paradigms {
            tracing::info!(team = paradigm.team_name(), kind = self.kind.label(), "research team working");
            let text = RESEARCH_LENS.render(&[
                ("team", paradigm.team_name()),
                ("kind", self.kind.label()),
                ("focus", paradigm.focus()),
                ("requirements", requirements),
            ]);
            let content = RESEARCH_TEAM
                .prompt(ctx, text)
                .await
                .with_context(|| format!("{} failed", paradigm.team_name()))?;
            findings.push(Finding { paradigm, content });
        }
        Ok(findings)
    }

    /// Full report: synthesis followed by every team's complete findings.
    pub async fn run(&self, ctx: &AgentContext<'_>, requirements: &str) -> anyhow::Result<String> {
        let findings = self.investigate(ctx, requirements).await?;

        let previews = findings
            .iter()
            .map(|f| {
                format!(
                    "#### {}\n\n{}",
                    f.paradigm.team_name(),
                    preview(&f.content, self.preview_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let synthesis = RESEARCH_TEAM
            .prompt(
                ctx,
                RESEARCH_SYNTHESIS.render(&[
                    ("title", self.kind.report_title()),
                    ("kind", self.kind.label()),
                    ("requirements", requirements),
                    ("findings", &previews),
                ]),
            )
            .await
            .context("research synthesis failed")?;

        let mut report = synthesis.trim_end().to_string();
        if self.kind == ResearchKind::Technology {
            match self.evaluate(ctx, requirements, &synthesis).await {
                Ok(matrix) if !matrix.is_empty() => {
                    report.push_str("\n\n## Evaluation Matrix\n\n");
                    report.push_str(matrix.render().trim_end());
                }
                Ok(_) => tracing::warn!("no stacks were rated; writing the report without a matrix"),
                Err(e) => tracing::warn!(
                    error = %format!("{e:#}"),
                    "technology evaluation failed; writing the report without a matrix"
                ),
            }
        }
        report.push_str("\n\n## Team Findings\n");
        for f in &findings {
            report.push_str(&format!("\n### {}\n\n{}\n", f.paradigm.team_name(), f.content.trim()));
        }
        Ok(report)
    }

    /// Extract evaluation criteria, then rate the stacks in `synthesis`
    /// against them.
    pub async fn evaluate(
        &self,
        ctx: &AgentContext<'_>,
        requirements: &str,
        synthesis: &str,
    ) -> anyhow::Result<EvaluationMatrix> {
        let reply = RESEARCH_TEAM
            .prompt(
                ctx,
                EVALUATION_CRITERIA.render(&[("requirements", requirements), ("synthesis", synthesis)]),
            )
            .await?;
        let criteria = evaluation::parse_criteria(&reply).context("failed to parse evaluation criteria")?;
        if criteria.is_empty() {
            anyhow::bail!("no evaluation criteria identified");
        }

        let listed = criteria
            .iter()
            .map(|c| match c.description.as_str() {
                "" => format!("- {} (importance: {})", c.name, c.importance),
                d => format!("- {} (importance: {}): {d}", c.name, c.importance),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let reply = RESEARCH_TEAM
            .prompt(ctx, STACK_RATINGS.render(&[("criteria", &listed), ("synthesis", synthesis)]))
            .await?;
        let ratings = evaluation::parse_ratings(&reply).context("failed to parse stack ratings")?;
        tracing::info!(
            criteria = criteria.len(),
            ratings = ratings.ratings.len(),
            "rated technology stacks"
        );
        Ok(EvaluationMatrix::new(criteria, ratings))
    }
}

/// At most `max` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ─── Standards / Product Owner / Scrum Master ─────────────────────────────

pub async fn standards(ctx: &AgentContext<'_>, architecture: &str) -> anyhow::Result<String> {
    STANDARDS_ENGINEER
        .prompt(ctx, STANDARDS.render(&[("architecture", architecture)]))
        .await
}

pub async fn epics(ctx: &AgentContext<'_>, prd: &str, architecture: &str, standards: &str) -> anyhow::Result<String> {
    let text = EPICS.render(&[
        ("prd", prd),
        ("architecture", architecture),
        ("standards", standards),
    ]);
    PRODUCT_OWNER.prompt(ctx, text).await
}

pub async fn stories(ctx: &AgentContext<'_>, epics: &str, architecture: &str, standards: &str) -> anyhow::Result<String> {
    let text = STORIES.render(&[
        ("epics", epics),
        ("architecture", architecture),
        ("standards", standards),
    ]);
    SCRUM_MASTER.prompt(ctx, text).await
}

// ─── Output cleanup ───────────────────────────────────────────────────────

/// Strip a single ```markdown (or ```md) fence wrapping the whole reply.
pub fn clean_markdown(text: &str) -> String {
    let trimmed = text.trim();
    let inner = ["```markdown", "```md"]
        .iter()
        .find_map(|fence| trimmed.strip_prefix(fence))
        .filter(|rest| rest.starts_with(['\n', '\r']))
        .and_then(|rest| rest.trim_end().strip_suffix("```"));
    match inner {
        Some(body) => body.trim().to_string(),
        None => trimmed.to_string(),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::types::Stage;
    use llm_agent::{ChatClient, Role as ChatRole, ScriptedClient};

    fn ctx(client: &dyn ChatClient) -> AgentContext<'_> {
        AgentContext::new(client, CompletionOptions::default())
    }

    #[test]
    fn clean_markdown_strips_wrapping_fence() {
        assert_eq!(clean_markdown("```markdown\n# Vision\n\nBody\n```\n"), "# Vision\n\nBody");
        assert_eq!(clean_markdown("```md\r\n# Vision\r\n```"), "# Vision");
        assert_eq!(clean_markdown("  # Plain  \n"), "# Plain");
        // An inner code block is not a wrapping fence.
        let text = "# Title\n\n```rust\nfn main() {}\n```";
        assert_eq!(clean_markdown(text), text);
        assert_eq!(clean_markdown("```markdownish\nx\n```"), "```markdownish\nx\n```");
    }

    #[test]
    fn preview_is_char_boundary_safe() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn every_role_has_an_agent() {
        for stage in Stage::all() {
            assert_eq!(for_role(stage.role()).role, stage.role());
        }
    }

    #[tokio::test]
    async fn brainstorm_records_turns_but_not_vision_request() {
        let client = ScriptedClient::new(["Who are the users?", "Got it.", "# Vision"]);
        let mut transcript = Transcript::new(Stage::BusinessAnalyst);

        let first = start_brainstorm(&ctx(&client), &mut transcript, "A recipe app").await.unwrap();
        assert_eq!(first, "Who are the users?");
        reply(&ctx(&client), &mut transcript, "Home cooks").await.unwrap();
        assert_eq!(transcript.entries.len(), 4);

        let vision = create_vision(&ctx(&client), &transcript).await.unwrap();
        assert_eq!(vision, "# Vision");
        assert_eq!(transcript.entries.len(), 4);

        let requests = client.requests();
        assert_eq!(requests[0].messages[0].role, ChatRole::System);
        assert!(requests[0].messages[1].content.contains("A recipe app"));
        let last = &requests[2];
        assert_eq!(last.messages.len(), 6);
        assert!(last.last_user_message().unwrap().contains("Project Vision"));
    }

    #[tokio::test]
    async fn prd_includes_references_only_when_present() {
        let client = ScriptedClient::new(["# PRD", "# PRD"]);
        let results = vec![SearchResult {
            title: "Paprika".into(),
            link: "https://example.com".into(),
            snippet: "Recipe manager".into(),
        }];
        create_prd(&ctx(&client), "the vision", &results).await.unwrap();
        create_prd(&ctx(&client), "the vision", &[]).await.unwrap();

        let requests = client.requests();
        let with = requests[0].last_user_message().unwrap();
        assert!(with.contains("the vision"));
        assert!(with.contains("- [Paprika](https://example.com): Recipe manager"));
        assert!(!requests[1].last_user_message().unwrap().contains("Reference Material"));
    }

    #[tokio::test]
    async fn research_report_has_one_section_per_paradigm() {
        let paradigms = [Paradigm::EstablishedApproaches, Paradigm::CuttingEdge, Paradigm::FirstPrinciples];
        let long_finding = "x".repeat(50);
        let client = ScriptedClient::new([
            long_finding.as_str(),
            "edge finding",
            "principles finding",
            "# Synthesis",
        ]);
        let team = ResearchTeam {
            kind: ResearchKind::Foundation,
            paradigms: &paradigms,
            preview_chars: 10,
        };

        let report = team.run(&ctx(&client), "What storage?").await.unwrap();
        assert!(report.starts_with("# Synthesis\n\n## Team Findings\n"));
        for p in paradigms {
            assert_eq!(report.matches(&format!("### {}\n", p.team_name())).count(), 1);
        }
        // Full findings in the appendix, previews in the synthesis prompt.
        assert!(report.contains(&long_finding));
        let requests = client.requests();
        assert_eq!(requests.len(), 4);
        let synthesis_prompt = requests[3].last_user_message().unwrap();
        assert!(synthesis_prompt.contains("xxxxxxxxxx..."));
        assert!(!synthesis_prompt.contains(&long_finding));
        assert!(requests[1].last_user_message().unwrap().contains("Cutting Edge Team"));
    }

    #[tokio::test]
    async fn technology_report_includes_evaluation_matrix() {
        let paradigms = [Paradigm::MainstreamCurrent, Paradigm::Experimental];
        let client = ScriptedClient::new([
            "Use Postgres with Axum.",
            "Try an event store.",
            "# Technology Synthesis",
            r#"```json
{"criteria": [
  {"name": "Technology Alignment", "description": "Fits the requirements", "importance": "very high"},
  {"name": "Performance", "importance": "HIGH"}
]}
```"#,
            r#"{"ratings": [
  {"stack": "Axum + Postgres", "criterion": "Technology Alignment", "rating": "High"},
  {"stack": "Axum + Postgres", "criterion": "Performance", "rating": "Very High"},
  {"stack": "Event store", "criterion": "Performance", "rating": "Medium"}
], "notes": [{"stack": "Event store", "note": "Adds full audit history"}]}"#,
        ]);
        let team = ResearchTeam {
            kind: ResearchKind::Technology,
            paradigms: &paradigms,
            preview_chars: 1000,
        };

        let report = team.run(&ctx(&client), "Which database?").await.unwrap();
        let matrix = report.find("## Evaluation Matrix").unwrap();
        let findings = report.find("## Team Findings").unwrap();
        assert!(report.starts_with("# Technology Synthesis\n\n## Evaluation Matrix\n\n"));
        assert!(matrix < findings);
        assert!(report.contains("| Axum + Postgres | High | Very High |"));
        assert!(report.contains("| Event store | - | Medium |"));
        assert!(report.contains("- Technology Alignment: VERY HIGH (Fits the requirements)"));
        assert!(report.contains("- Event store: Adds full audit history"));

        let requests = client.requests();
        assert_eq!(requests.len(), 5);
        let criteria_prompt = requests[3].last_user_message().unwrap();
        assert!(criteria_prompt.contains("Which database?"));
        assert!(criteria_prompt.contains("# Technology Synthesis"));
        let ratings_prompt = requests[4].last_user_message().unwrap();
        assert!(ratings_prompt.contains("- Performance (importance: HIGH)"));
        assert!(ratings_prompt.contains("- Technology Alignment (importance: VERY HIGH): Fits the requirements"));
    }

    #[tokio::test]
    async fn unusable_evaluation_leaves_report_without_matrix() {
        let paradigms = [Paradigm::FirstPrinciples];
        let client = ScriptedClient::new([
            "Start from the data model.",
            "# Technology Synthesis",
            "I could not think of any criteria.",
        ]);
        let team = ResearchTeam {
            kind: ResearchKind::Technology,
            paradigms: &paradigms,
            preview_chars: 1000,
        };

        let report = team.run(&ctx(&client), "Which database?").await.unwrap();
        assert!(!report.contains("## Evaluation Matrix"));
        assert!(report.contains("## Team Findings"));
        assert!(report.contains("Start from the data model."));
        // No ratings request once criteria parsing fails.
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn foundation_report_is_not_evaluated() {
        let paradigms = [Paradigm::CrossParadigm];
        let client = ScriptedClient::new(["finding", "# Foundation Synthesis"]);
        let team = ResearchTeam {
            kind: ResearchKind::Foundation,
            paradigms: &paradigms,
            preview_chars: 1000,
        };
        let report = team.run(&ctx(&client), "What shape?").await.unwrap();
        assert!(!report.contains("## Evaluation Matrix"));
        assert_eq!(client.remaining(), 0);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn analyze_parses_decisions_from_reply() {
        let client = ScriptedClient::new([r#"Here you go:
```json
[{"id": "db", "title": "Database", "options": ["Postgres", "SQLite"], "recommendation": "Postgres"}]
```"#]);
        let inputs = ArchitectInputs {
            vision: "v",
            prd: "p",
            foundation: "f",
            technology: "t",
        };
        let decisions = analyze(&ctx(&client), inputs).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].id, "db");
        assert_eq!(decisions[0].options[1].name, "SQLite");
        assert!(client.requests()[0].last_user_message().unwrap().contains("JSON array"));
    }

    #[tokio::test]
    async fn architecture_uses_only_completed_decisions() {
        let client = ScriptedClient::new(["# Architecture"]);
        let mut log = DecisionLog::new(
            decision::parse_decisions(
                r#"[{"id": "db", "title": "Database"}, {"id": "hosting", "title": "Hosting"}]"#,
            )
            .unwrap(),
        );
        log.decide("db", "Postgres", Some("Familiar".into())).unwrap();
        let inputs = ArchitectInputs {
            vision: "v",
            prd: "p",
            foundation: "f",
            technology: "t",
        };

        architecture(&ctx(&client), inputs, &log).await.unwrap();
        let prompt = client.requests()[0].last_user_message().unwrap().to_string();
        assert!(prompt.contains("## Database\n**Decision**: Postgres"));
        assert!(!prompt.contains("Hosting"));
    }

    #[tokio::test]
    async fn revision_sends_document_and_feedback() {
        let client = ScriptedClient::new(["```markdown\n# PRD v2\n```"]);
        let revised = PRODUCT_MANAGER
            .revise(&ctx(&client), "# PRD", "Add offline mode")
            .await
            .unwrap();
        assert_eq!(revised, "# PRD v2");
        let prompt = client.requests()[0].last_user_message().unwrap().to_string();
        assert!(prompt.contains("Add offline mode"));
        assert!(prompt.contains("# PRD"));
    }

    #[tokio::test]
    async fn client_errors_name_the_role() {
        let client = ScriptedClient::new(Vec::<String>::new());
        let err = standards(&ctx(&client), "arch").await.unwrap_err();
        assert!(format!("{err:#}").contains("Standards Engineer request failed"));
    }
}
