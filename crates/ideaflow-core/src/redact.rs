use regex::RegexSet;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const REDACTED: &str = "[REDACTED]";

/// Prefixes of the environment variables this tool reads.
const RELEVANT_PREFIXES: &[&str] = &["IDEAFLOW_", "OPENAI_", "RUST_LOG"];

static SENSITIVE_RE: OnceLock<RegexSet> = OnceLock::new();

fn sensitive_re() -> &'static RegexSet {
    SENSITIVE_RE.get_or_init(|| {
        RegexSet::new([
            r"(?i)api_?key",
            r"(?i)secret",
            r"(?i)password",
            r"(?i)token",
            r"(?i)credential",
            r"(?i)auth",
            r"(?i)^openai",
        ])
        .unwrap()
    })
}

/// Whether a variable with this name may hold a secret.
pub fn is_sensitive(name: &str) -> bool {
    sensitive_re().is_match(name)
}

/// Copy of `vars` with the values of sensitive names replaced.
pub fn sanitize<I, K, V>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(k, v)| {
            let k = k.into();
            let v = if is_sensitive(&k) {
                REDACTED.to_string()
            } else {
                v.into()
            };
            (k, v)
        })
        .collect()
}

/// The process variables this tool cares about, sanitized for display.
pub fn relevant_env() -> BTreeMap<String, String> {
    sanitize(
        std::env::vars().filter(|(k, _)| RELEVANT_PREFIXES.iter().any(|p| k.starts_with(p))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sensitive_names() {
        for name in [
            "IDEAFLOW_API_KEY",
            "IDEAFLOW_SEARCH_API_KEY",
            "OPENAI_ORG",
            "GITHUB_TOKEN",
            "db_password",
            "AWS_SECRET_ACCESS_KEY",
            "AUTH_HEADER",
            "apikey",
        ] {
            assert!(is_sensitive(name), "{name} should be sensitive");
        }
        for name in ["IDEAFLOW_DEFAULT_MODEL", "RUST_LOG", "HOME"] {
            assert!(!is_sensitive(name), "{name} should not be sensitive");
        }
    }

    #[test]
    fn sanitize_replaces_values() {
        let out = sanitize([
            ("IDEAFLOW_API_KEY", "sk-123"),
            ("IDEAFLOW_DEFAULT_MODEL", "gpt-4o"),
        ]);
        assert_eq!(out["IDEAFLOW_API_KEY"], REDACTED);
        assert_eq!(out["IDEAFLOW_DEFAULT_MODEL"], "gpt-4o");
    }
}
