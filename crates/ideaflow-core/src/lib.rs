pub mod config;
pub mod decision;
pub mod document;
pub mod error;
pub mod evaluation;
pub mod frontmatter;
pub mod io;
pub mod paths;
pub mod prompt;
pub mod redact;
pub mod session;
pub mod state;
pub mod transcript;
pub mod types;
pub mod vcs;
pub mod workflow;

pub use error::{IdeaflowError, Result};
