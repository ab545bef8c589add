use crate::error::Result;
use crate::paths;
use crate::types::Paradigm;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any `/chat/completions` endpoint (OpenAI, gateways, local servers).
    OpenaiCompatible,
    /// Deterministic, network-free responses for dry runs.
    Offline,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().replace('-', "_").as_str() {
            "openai_compatible" | "openai" => Ok(LlmProvider::OpenaiCompatible),
            "offline" => Ok(LlmProvider::Offline),
            other => Err(format!("unknown LLM provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variables consulted for the credential, first set wins.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Vec<String>,
    /// Resolved credential. Never read from or written to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenaiCompatible
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_api_key_env() -> Vec<String> {
    vec!["IDEAFLOW_API_KEY".to_string(), "OPENAI_API_KEY".to_string()]
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            api_key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub engine_id: Option<String>,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_results")]
    pub results: u32,
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_search_key_env() -> String {
    "IDEAFLOW_SEARCH_API_KEY".to_string()
}

fn default_search_results() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine_id: None,
            api_key_env: default_search_key_env(),
            results: default_search_results(),
            api_key: None,
        }
    }
}

impl SearchConfig {
    pub fn is_configured(&self) -> bool {
        self.engine_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.api_key.as_deref().is_some_and(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ResearchConfig / VersioningConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_paradigms")]
    pub paradigms: Vec<Paradigm>,
    /// Characters of each team finding shown to the synthesis prompt.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_paradigms() -> Vec<Paradigm> {
    Paradigm::all().to_vec()
}

fn default_preview_chars() -> usize {
    1000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            paradigms: default_paradigms(),
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub versioning: VersioningConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            research: ResearchConfig::default(),
            versioning: VersioningConfig::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the project config, falling back to the user-level config and
    /// then to defaults named after the root directory.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with_user(root, paths::user_config_path().ok().as_deref())
    }

    /// As [`Config::load`] with an explicit user-level config path. Only the
    /// project file may name the project; otherwise the root directory does.
    pub fn load_with_user(root: &Path, user: Option<&Path>) -> Result<Self> {
        let mut cfg = match crate::io::read_yaml::<Config>(&paths::config_path(root))? {
            Some(cfg) => cfg,
            None => Self::load_user(user)?.unwrap_or_else(|| Self::new(String::new())),
        };
        if cfg.project.trim().is_empty() {
            cfg.project = project_name_from_root(root);
        }
        Ok(cfg)
    }

    fn load_user(user: Option<&Path>) -> Result<Option<Self>> {
        let Some(user) = user else {
            return Ok(None);
        };
        let Some(mut cfg) = crate::io::read_yaml::<Config>(user)? else {
            return Ok(None);
        };
        tracing::debug!(path = %user.display(), "using user-level config");
        cfg.project.clear();
        Ok(Some(cfg))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::write_yaml(&paths::config_path(root), self)
    }

    // -----------------------------------------------------------------------
    // Environment overrides
    // -----------------------------------------------------------------------

    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    /// Malformed numeric values are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("IDEAFLOW_LLM_PROVIDER") {
            match v.parse() {
                Ok(p) => self.llm.provider = p,
                Err(e) => tracing::warn!(error = %e, "ignoring IDEAFLOW_LLM_PROVIDER"),
            }
        }
        if let Some(v) = get("IDEAFLOW_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("IDEAFLOW_DEFAULT_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("IDEAFLOW_DEFAULT_TEMPERATURE") {
            match v.trim().parse() {
                Ok(t) => self.llm.temperature = t,
                Err(_) => tracing::warn!(value = %v, "ignoring IDEAFLOW_DEFAULT_TEMPERATURE"),
            }
        }
        if let Some(v) = get("IDEAFLOW_DEFAULT_MAX_TOKENS") {
            match v.trim().parse() {
                Ok(n) => self.llm.max_tokens = n,
                Err(_) => tracing::warn!(value = %v, "ignoring IDEAFLOW_DEFAULT_MAX_TOKENS"),
            }
        }
        self.llm.api_key = self.llm.api_key_env.iter().find_map(|k| get(k));

        if let Some(v) = get("IDEAFLOW_SEARCH_ENGINE_ID") {
            self.search.engine_id = Some(v);
        }
        self.search.api_key = get(&self.search.api_key_env);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            push(
                WarnLevel::Error,
                format!(
                    "llm.temperature {} is outside the supported range 0.0..=2.0",
                    self.llm.temperature
                ),
            );
        }
        if self.llm.max_tokens == 0 {
            push(WarnLevel::Error, "llm.max_tokens must be greater than zero".into());
        }
        if self.llm.model.trim().is_empty() {
            push(WarnLevel::Error, "llm.model is empty".into());
        }
        if self.llm.provider == LlmProvider::OpenaiCompatible && self.llm.api_key.is_none() {
            push(
                WarnLevel::Warning,
                format!(
                    "no LLM credential found; set one of: {}",
                    self.llm.api_key_env.join(", ")
                ),
            );
        }
        if self.research.paradigms.is_empty() {
            push(
                WarnLevel::Error,
                "research.paradigms is empty; research stages would produce nothing".into(),
            );
        }
        if self.search.engine_id.is_some() && self.search.api_key.is_none() {
            push(
                WarnLevel::Warning,
                format!(
                    "search.engine_id is set but {} is not; web search disabled",
                    self.search.api_key_env
                ),
            );
        }
        warnings
    }
}

fn project_name_from_root(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "project".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::new("demo");
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert!((cfg.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.llm.max_tokens, 4000);
        assert_eq!(cfg.research.paradigms.len(), 6);
        assert_eq!(cfg.research.preview_chars, 1000);
        assert!(cfg.versioning.enabled);
    }

    #[test]
    fn roundtrip_omits_secrets() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("demo");
        cfg.llm.api_key = Some("sk-secret".into());
        cfg.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(paths::config_path(dir.path())).unwrap();
        assert!(!raw.contains("sk-secret"));

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project, "demo");
        assert!(loaded.llm.api_key.is_none());
    }

    #[test]
    fn user_config_does_not_name_the_project() {
        let home = TempDir::new().unwrap();
        let user = home.path().join("config.yaml");
        std::fs::write(&user, "project: someone-elses\nllm:\n  model: local-llama\n").unwrap();
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("recipes");
        std::fs::create_dir(&root).unwrap();

        let cfg = Config::load_with_user(&root, Some(&user)).unwrap();
        assert_eq!(cfg.project, "recipes");
        assert_eq!(cfg.llm.model, "local-llama");

        std::fs::write(&user, "llm:\n  model: local-llama\n").unwrap();
        assert_eq!(Config::load_with_user(&root, Some(&user)).unwrap().project, "recipes");
    }

    #[test]
    fn project_config_wins_over_user_config() {
        let home = TempDir::new().unwrap();
        let user = home.path().join("config.yaml");
        std::fs::write(&user, "llm:\n  model: local-llama\n").unwrap();
        let dir = TempDir::new().unwrap();
        Config::new("demo").save(dir.path()).unwrap();

        let cfg = Config::load_with_user(dir.path(), Some(&user)).unwrap();
        assert_eq!(cfg.project, "demo");
        assert_eq!(cfg.llm.model, "gpt-4o");

        let missing = home.path().join("absent.yaml");
        let empty = TempDir::new().unwrap();
        let cfg = Config::load_with_user(empty.path(), Some(&missing)).unwrap();
        assert_eq!(cfg.project, project_name_from_root(empty.path()));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("project: x\nllm:\n  model: local-llama\n").unwrap();
        assert_eq!(cfg.llm.model, "local-llama");
        assert_eq!(cfg.llm.max_tokens, 4000);
        assert_eq!(cfg.llm.provider, LlmProvider::OpenaiCompatible);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::new("demo");
        cfg.apply_env(env(&[
            ("IDEAFLOW_DEFAULT_MODEL", "gpt-4o-mini"),
            ("IDEAFLOW_DEFAULT_TEMPERATURE", "0.2"),
            ("IDEAFLOW_DEFAULT_MAX_TOKENS", "1234"),
            ("IDEAFLOW_LLM_PROVIDER", "offline"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("IDEAFLOW_SEARCH_ENGINE_ID", "cx-1"),
            ("IDEAFLOW_SEARCH_API_KEY", "search-key"),
        ]));
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert!((cfg.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(cfg.llm.max_tokens, 1234);
        assert_eq!(cfg.llm.provider, LlmProvider::Offline);
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-openai"));
        assert!(cfg.search.is_configured());
    }

    #[test]
    fn first_credential_env_wins() {
        let mut cfg = Config::new("demo");
        cfg.apply_env(env(&[
            ("IDEAFLOW_API_KEY", "sk-ideaflow"),
            ("OPENAI_API_KEY", "sk-openai"),
        ]));
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-ideaflow"));
    }

    #[test]
    fn malformed_numbers_are_ignored() {
        let mut cfg = Config::new("demo");
        cfg.apply_env(env(&[("IDEAFLOW_DEFAULT_MAX_TOKENS", "lots")]));
        assert_eq!(cfg.llm.max_tokens, 4000);
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::new("demo");
        cfg.llm.temperature = 3.5;
        cfg.llm.max_tokens = 0;
        cfg.research.paradigms.clear();
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 3);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("no LLM credential")));
    }

    #[test]
    fn offline_provider_needs_no_credential() {
        let mut cfg = Config::new("demo");
        cfg.llm.provider = LlmProvider::Offline;
        assert!(cfg.validate().is_empty());
    }
}
