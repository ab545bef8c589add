use crate::error::{IdeaflowError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;

const FALLBACK_NAME: &str = "ideaflow";
const FALLBACK_EMAIL: &str = "ideaflow@localhost";

/// One commit touching a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub commit: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
}

/// Version control over the `.ideaflow` tree.
pub trait Versioner: Send + Sync {
    fn init(&self) -> Result<()>;
    fn commit(&self, paths: &[&Path], message: &str) -> Result<()>;
    /// Commits touching `path`, newest first.
    fn history(&self, path: &Path) -> Result<Vec<Revision>>;
    /// Contents of `path` as of `commit`.
    fn show(&self, path: &Path, commit: &str) -> Result<String>;
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Pick a versioner for `root`: git when enabled and installed, otherwise a
/// no-op that keeps documents working without history.
pub fn open(root: &Path, enabled: bool) -> Box<dyn Versioner> {
    if !enabled {
        return Box::new(NoopVersioner);
    }
    match GitVersioner::new(root) {
        Ok(git) => Box::new(git),
        Err(e) => {
            tracing::warn!(error = %e, "continuing without version control");
            Box::new(NoopVersioner)
        }
    }
}

// ---------------------------------------------------------------------------
// NoopVersioner
// ---------------------------------------------------------------------------

pub struct NoopVersioner;

impl Versioner for NoopVersioner {
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self, _paths: &[&Path], _message: &str) -> Result<()> {
        Ok(())
    }

    fn history(&self, _path: &Path) -> Result<Vec<Revision>> {
        Ok(Vec::new())
    }

    fn show(&self, path: &Path, _commit: &str) -> Result<String> {
        Err(IdeaflowError::Vcs(format!(
            "version control is disabled; no history for {}",
            path.display()
        )))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// GitVersioner
// ---------------------------------------------------------------------------

pub struct GitVersioner {
    git: PathBuf,
    repo_dir: PathBuf,
}

impl GitVersioner {
    pub fn new(root: &Path) -> Result<Self> {
        let git = which::which("git")
            .map_err(|_| IdeaflowError::Vcs("git is not installed".to_string()))?;
        Ok(Self {
            git,
            repo_dir: std::path::absolute(paths::ideaflow_dir(root))?,
        })
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        std::process::Command::new(&self.git)
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()
            .map_err(|e| IdeaflowError::Vcs(format!("failed to run git: {e}")))
    }

    fn run_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IdeaflowError::Vcs(format!(
                "git {} failed: {}",
                args.iter()
                    .find(|a| !a.starts_with('-') && !a.contains('='))
                    .copied()
                    .unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `-c` overrides for commits on machines without a configured identity.
    fn identity_args(&self) -> Vec<String> {
        let configured = self
            .run(&["config", "user.email"])
            .map(|o| o.status.success())
            .unwrap_or(false);
        if configured {
            Vec::new()
        } else {
            vec![
                "-c".to_string(),
                format!("user.name={FALLBACK_NAME}"),
                "-c".to_string(),
                format!("user.email={FALLBACK_EMAIL}"),
            ]
        }
    }

    fn commit_staged(&self, message: &str, allow_empty: bool) -> Result<()> {
        let mut args = self.identity_args();
        args.extend(["commit".to_string(), "-q".to_string()]);
        if allow_empty {
            args.push("--allow-empty".to_string());
        }
        args.extend(["-m".to_string(), message.to_string()]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_ok(&args)?;
        Ok(())
    }

    /// Without its own `.git`, git would act on an enclosing repository.
    fn require_repo(&self) -> Result<()> {
        if self.repo_dir.join(".git").exists() {
            Ok(())
        } else {
            Err(IdeaflowError::Vcs(format!(
                "{} is not a git repository; run 'ideaflow init'",
                self.repo_dir.display()
            )))
        }
    }

    /// Path of `path` inside the repository, with forward slashes. Relative
    /// paths resolve against the working directory, like every other path
    /// handed to the store.
    fn repo_relative(&self, path: &Path) -> Result<String> {
        let abs = std::path::absolute(path)?;
        abs.strip_prefix(&self.repo_dir)
            .map(|_| paths::relative_to(&self.repo_dir, &abs))
            .map_err(|_| {
                IdeaflowError::Vcs(format!(
                    "{} is outside {}",
                    path.display(),
                    self.repo_dir.display()
                ))
            })
    }
}

fn validate_commit(commit: &str) -> Result<()> {
    let ok = !commit.is_empty()
        && !commit.starts_with('-')
        && commit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '~' | '^' | '_' | '.' | '/'));
    if ok {
        Ok(())
    } else {
        Err(IdeaflowError::Vcs(format!("invalid revision '{commit}'")))
    }
}

impl Versioner for GitVersioner {
    fn init(&self) -> Result<()> {
        crate::io::ensure_dir(&self.repo_dir)?;
        if self.repo_dir.join(".git").exists() {
            return Ok(());
        }
        self.run_ok(&["init", "-q"])?;
        // The current-session pointer is per checkout, not history.
        crate::io::ensure_gitignore_entry(&self.repo_dir, "state.yaml")?;
        self.run_ok(&["add", "-A"])?;
        self.commit_staged("Initialize ideaflow workspace", true)?;
        tracing::debug!(repo = %self.repo_dir.display(), "initialized git repository");
        Ok(())
    }

    fn commit(&self, paths: &[&Path], message: &str) -> Result<()> {
        self.require_repo()?;
        let rels = paths
            .iter()
            .map(|p| self.repo_relative(p))
            .collect::<Result<Vec<_>>>()?;
        let mut add = vec!["add", "--"];
        add.extend(rels.iter().map(String::as_str));
        self.run_ok(&add)?;

        // Exit status 0 means nothing is staged.
        let staged = self.run(&["diff", "--cached", "--quiet"])?;
        if staged.status.success() {
            tracing::debug!(commit_message = message, "nothing to commit");
            return Ok(());
        }
        self.commit_staged(message, false)
    }

    fn history(&self, path: &Path) -> Result<Vec<Revision>> {
        self.require_repo()?;
        let rel = self.repo_relative(path)?;
        let out = self.run_ok(&["log", "--format=%H%x1f%an%x1f%aI%x1f%s", "--", &rel])?;
        Ok(out.lines().filter_map(parse_log_line).collect())
    }

    fn show(&self, path: &Path, commit: &str) -> Result<String> {
        validate_commit(commit)?;
        self.require_repo()?;
        let rel = self.repo_relative(path)?;
        self.run_ok(&["show", &format!("{commit}:{rel}")])
    }
}

fn parse_log_line(line: &str) -> Option<Revision> {
    let mut parts = line.split('\x1f');
    let commit = parts.next()?.to_string();
    let author = parts.next()?.to_string();
    let date = DateTime::parse_from_rfc3339(parts.next()?)
        .ok()?
        .with_timezone(&Utc);
    let message = parts.next().unwrap_or_default().to_string();
    Some(Revision {
        commit,
        author,
        date,
        message,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
