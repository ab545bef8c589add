//! `ideaflow_cli`: the agent roles and stage runner behind the `ideaflow`
//! binary.
//!
//! ```text
//! idea ─▶ Business Analyst ─▶ project_vision
//!                              │
//!         Product Manager ◀────┘ ─▶ prd
//!         Architect (1) ─▶ foundation_research_requirements ─▶ Research Team ─▶ report
//!         Architect (2) ─▶ technology_research_requirements ─▶ Research Team ─▶ report
//!         Architect (3) ─▶ decisions ─▶ architecture
//!         Standards Engineer ─▶ standards_patterns
//!         Product Owner ─▶ epics_stories
//!         Scrum Master ─▶ stories
//! ```

pub mod agents;
pub mod client;
pub mod interactive;
pub mod stages;

pub use stages::StageRunner;
