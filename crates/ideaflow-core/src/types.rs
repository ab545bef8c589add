use crate::error::IdeaflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    BusinessAnalyst,
    ProductManager,
    Architect,
    ResearchTeam,
    StandardsEngineer,
    ProductOwner,
    ScrumMaster,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::BusinessAnalyst => "business_analyst",
            Role::ProductManager => "product_manager",
            Role::Architect => "architect",
            Role::ResearchTeam => "research_team",
            Role::StandardsEngineer => "standards_engineer",
            Role::ProductOwner => "product_owner",
            Role::ScrumMaster => "scrum_master",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::BusinessAnalyst => "Business Analyst",
            Role::ProductManager => "Product Manager",
            Role::Architect => "Architect",
            Role::ResearchTeam => "Research Team",
            Role::StandardsEngineer => "Standards Engineer",
            Role::ProductOwner => "Product Owner",
            Role::ScrumMaster => "Scrum Master",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// DocumentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    ProjectVision,
    Prd,
    FoundationResearchRequirements,
    FoundationResearchReport,
    TechnologyResearchRequirements,
    TechnologyResearchReport,
    Architecture,
    StandardsPatterns,
    EpicsStories,
    Stories,
}

impl DocumentType {
    pub fn all() -> &'static [DocumentType] {
        &[
            DocumentType::ProjectVision,
            DocumentType::Prd,
            DocumentType::FoundationResearchRequirements,
            DocumentType::FoundationResearchReport,
            DocumentType::TechnologyResearchRequirements,
            DocumentType::TechnologyResearchReport,
            DocumentType::Architecture,
            DocumentType::StandardsPatterns,
            DocumentType::EpicsStories,
            DocumentType::Stories,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::ProjectVision => "project_vision",
            DocumentType::Prd => "prd",
            DocumentType::FoundationResearchRequirements => "foundation_research_requirements",
            DocumentType::FoundationResearchReport => "foundation_research_report",
            DocumentType::TechnologyResearchRequirements => "technology_research_requirements",
            DocumentType::TechnologyResearchReport => "technology_research_report",
            DocumentType::Architecture => "architecture",
            DocumentType::StandardsPatterns => "standards_patterns",
            DocumentType::EpicsStories => "epics_stories",
            DocumentType::Stories => "stories",
        }
    }

    /// Directory under `docs/` holding documents of this type.
    pub fn dir_name(self) -> &'static str {
        match self {
            DocumentType::ProjectVision => "project-vision",
            DocumentType::Prd => "prd",
            DocumentType::FoundationResearchRequirements => "foundation-research-requirements",
            DocumentType::FoundationResearchReport => "foundation-research-report",
            DocumentType::TechnologyResearchRequirements => "technology-research-requirements",
            DocumentType::TechnologyResearchReport => "technology-research-report",
            DocumentType::Architecture => "architecture",
            DocumentType::StandardsPatterns => "standards-patterns",
            DocumentType::EpicsStories => "epics-stories",
            DocumentType::Stories => "stories",
        }
    }

    /// Default document title; also the filename stem.
    pub fn title(self) -> &'static str {
        match self {
            DocumentType::ProjectVision => "Project Vision",
            DocumentType::Prd => "Product Requirements Document",
            DocumentType::FoundationResearchRequirements => "Foundation Research Requirements",
            DocumentType::FoundationResearchReport => "Foundational Research Report",
            DocumentType::TechnologyResearchRequirements => "Technology Research Requirements",
            DocumentType::TechnologyResearchReport => "Technology Research Report",
            DocumentType::Architecture => "Architecture",
            DocumentType::StandardsPatterns => "Standards and Patterns",
            DocumentType::EpicsStories => "Epics and Stories",
            DocumentType::Stories => "Story Backlog",
        }
    }

    /// The stage that produces this document type.
    pub fn produced_by(self) -> Stage {
        Stage::all()
            .iter()
            .copied()
            .find(|s| s.output() == self)
            .unwrap_or(Stage::BusinessAnalyst)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = IdeaflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        match normalized.as_str() {
            "project_vision" | "vision" => Ok(DocumentType::ProjectVision),
            "prd" | "research_report" => Ok(DocumentType::Prd),
            "foundation_research_requirements" => Ok(DocumentType::FoundationResearchRequirements),
            "foundation_research_report" => Ok(DocumentType::FoundationResearchReport),
            "technology_research_requirements" => Ok(DocumentType::TechnologyResearchRequirements),
            "technology_research_report" => Ok(DocumentType::TechnologyResearchReport),
            "architecture" => Ok(DocumentType::Architecture),
            "standards_patterns" | "standards" => Ok(DocumentType::StandardsPatterns),
            "epics_stories" | "epics" => Ok(DocumentType::EpicsStories),
            "stories" | "task_list" => Ok(DocumentType::Stories),
            _ => Err(IdeaflowError::InvalidDocumentType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BusinessAnalyst,
    ProductManager,
    ArchitectFoundation,
    FoundationResearch,
    ArchitectTechnology,
    TechnologyResearch,
    ArchitectFinal,
    Standards,
    ProductOwner,
    ScrumMaster,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::BusinessAnalyst,
            Stage::ProductManager,
            Stage::ArchitectFoundation,
            Stage::FoundationResearch,
            Stage::ArchitectTechnology,
            Stage::TechnologyResearch,
            Stage::ArchitectFinal,
            Stage::Standards,
            Stage::ProductOwner,
            Stage::ScrumMaster,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Stage::all().get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::BusinessAnalyst => "business_analyst",
            Stage::ProductManager => "product_manager",
            Stage::ArchitectFoundation => "architect_foundation",
            Stage::FoundationResearch => "foundation_research",
            Stage::ArchitectTechnology => "architect_technology",
            Stage::TechnologyResearch => "technology_research",
            Stage::ArchitectFinal => "architect_final",
            Stage::Standards => "standards",
            Stage::ProductOwner => "product_owner",
            Stage::ScrumMaster => "scrum_master",
        }
    }

    pub fn role(self) -> Role {
        match self {
            Stage::BusinessAnalyst => Role::BusinessAnalyst,
            Stage::ProductManager => Role::ProductManager,
            Stage::ArchitectFoundation | Stage::ArchitectTechnology | Stage::ArchitectFinal => {
                Role::Architect
            }
            Stage::FoundationResearch | Stage::TechnologyResearch => Role::ResearchTeam,
            Stage::Standards => Role::StandardsEngineer,
            Stage::ProductOwner => Role::ProductOwner,
            Stage::ScrumMaster => Role::ScrumMaster,
        }
    }

    pub fn output(self) -> DocumentType {
        match self {
            Stage::BusinessAnalyst => DocumentType::ProjectVision,
            Stage::ProductManager => DocumentType::Prd,
            Stage::ArchitectFoundation => DocumentType::FoundationResearchRequirements,
            Stage::FoundationResearch => DocumentType::FoundationResearchReport,
            Stage::ArchitectTechnology => DocumentType::TechnologyResearchRequirements,
            Stage::TechnologyResearch => DocumentType::TechnologyResearchReport,
            Stage::ArchitectFinal => DocumentType::Architecture,
            Stage::Standards => DocumentType::StandardsPatterns,
            Stage::ProductOwner => DocumentType::EpicsStories,
            Stage::ScrumMaster => DocumentType::Stories,
        }
    }

    /// Documents that must exist before this stage can run.
    pub fn inputs(self) -> &'static [DocumentType] {
        use DocumentType::*;
        match self {
            Stage::BusinessAnalyst => &[],
            Stage::ProductManager => &[ProjectVision],
            Stage::ArchitectFoundation => &[ProjectVision, Prd],
            Stage::FoundationResearch => &[FoundationResearchRequirements],
            Stage::ArchitectTechnology => &[ProjectVision, Prd, FoundationResearchReport],
            Stage::TechnologyResearch => &[TechnologyResearchRequirements],
            Stage::ArchitectFinal => &[
                ProjectVision,
                Prd,
                FoundationResearchReport,
                TechnologyResearchReport,
            ],
            Stage::Standards => &[Architecture],
            Stage::ProductOwner => &[Prd, Architecture, StandardsPatterns],
            Stage::ScrumMaster => &[EpicsStories, Architecture, StandardsPatterns],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = IdeaflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Stage::all()
            .iter()
            .copied()
            .find(|stage| stage.as_str() == normalized)
            .or(match normalized.as_str() {
                "ba" => Some(Stage::BusinessAnalyst),
                "pm" => Some(Stage::ProductManager),
                "architect" => Some(Stage::ArchitectFinal),
                "po" => Some(Stage::ProductOwner),
                "sm" => Some(Stage::ScrumMaster),
                _ => None,
            })
            .ok_or_else(|| IdeaflowError::InvalidStage(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Paradigm
// ---------------------------------------------------------------------------

/// The lens one research team applies to the requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Paradigm {
    EstablishedApproaches,
    MainstreamCurrent,
    CuttingEdge,
    Experimental,
    CrossParadigm,
    FirstPrinciples,
}

impl Paradigm {
    pub fn all() -> &'static [Paradigm] {
        &[
            Paradigm::EstablishedApproaches,
            Paradigm::MainstreamCurrent,
            Paradigm::CuttingEdge,
            Paradigm::Experimental,
            Paradigm::CrossParadigm,
            Paradigm::FirstPrinciples,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Paradigm::EstablishedApproaches => "established_approaches",
            Paradigm::MainstreamCurrent => "mainstream_current",
            Paradigm::CuttingEdge => "cutting_edge",
            Paradigm::Experimental => "experimental",
            Paradigm::CrossParadigm => "cross_paradigm",
            Paradigm::FirstPrinciples => "first_principles",
        }
    }

    pub fn team_name(self) -> &'static str {
        match self {
            Paradigm::EstablishedApproaches => "Established Approaches Team",
            Paradigm::MainstreamCurrent => "Mainstream Current Team",
            Paradigm::CuttingEdge => "Cutting Edge Team",
            Paradigm::Experimental => "Experimental Team",
            Paradigm::CrossParadigm => "Cross-Paradigm Team",
            Paradigm::FirstPrinciples => "First Principles Team",
        }
    }

    /// One-sentence brief handed to the team's prompt.
    pub fn focus(self) -> &'static str {
        match self {
            Paradigm::EstablishedApproaches => {
                "proven, battle-tested approaches with long track records and mature tooling"
            }
            Paradigm::MainstreamCurrent => {
                "what most teams choose today, with strong communities and current best practice"
            }
            Paradigm::CuttingEdge => {
                "recent approaches gaining traction that offer real advantages over the mainstream"
            }
            Paradigm::Experimental => {
                "emerging or research-stage ideas that could be transformative despite their risk"
            }
            Paradigm::CrossParadigm => {
                "hybrids that borrow from several paradigms or from unrelated domains"
            }
            Paradigm::FirstPrinciples => {
                "reasoning from the fundamental constraints of the problem, ignoring convention"
            }
        }
    }
}

impl fmt::Display for Paradigm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_chain_order() {
        assert_eq!(Stage::BusinessAnalyst.next(), Some(Stage::ProductManager));
        assert_eq!(
            Stage::FoundationResearch.next(),
            Some(Stage::ArchitectTechnology)
        );
        assert_eq!(Stage::ScrumMaster.next(), None);
    }

    #[test]
    fn every_stage_input_is_produced_earlier() {
        for &stage in Stage::all() {
            for &input in stage.inputs() {
                assert!(
                    input.produced_by() < stage,
                    "{stage} consumes {input} which is produced later"
                );
            }
        }
    }

    #[test]
    fn each_document_type_has_one_producer() {
        for &doc in DocumentType::all() {
            let producers = Stage::all().iter().filter(|s| s.output() == doc).count();
            assert_eq!(producers, 1, "{doc}");
        }
    }

    #[test]
    fn stage_from_str_accepts_dashes_and_aliases() {
        assert_eq!(
            Stage::from_str("product-manager").unwrap(),
            Stage::ProductManager
        );
        assert_eq!(Stage::from_str("pm").unwrap(), Stage::ProductManager);
        assert_eq!(Stage::from_str("architect").unwrap(), Stage::ArchitectFinal);
        assert!(Stage::from_str("qa").is_err());
    }

    #[test]
    fn document_type_from_str() {
        assert_eq!(
            DocumentType::from_str("project-vision").unwrap(),
            DocumentType::ProjectVision
        );
        assert_eq!(
            DocumentType::from_str("vision").unwrap(),
            DocumentType::ProjectVision
        );
        assert!(matches!(
            DocumentType::from_str("memo"),
            Err(IdeaflowError::InvalidDocumentType(_))
        ));
    }

    #[test]
    fn architect_owns_three_stages() {
        let count = Stage::all()
            .iter()
            .filter(|s| s.role() == Role::Architect)
            .count();
        assert_eq!(count, 3);
    }
}
