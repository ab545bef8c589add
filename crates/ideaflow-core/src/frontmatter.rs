use crate::error::{IdeaflowError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Split `raw` into its YAML frontmatter (between a leading `---` line and
/// the next `---` line) and the body that follows. CRLF line endings are
/// accepted. Without frontmatter the whole input is the body.
pub fn split(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw.strip_prefix("---") else {
        return (None, raw);
    };
    let rest = if let Some(r) = rest.strip_prefix('\n') {
        r
    } else if let Some(r) = rest.strip_prefix("\r\n") {
        r
    } else {
        return (None, raw);
    };

    // Empty frontmatter: the closing fence comes straight away.
    if let Some(after) = rest.strip_prefix("---") {
        if after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n") {
            return (Some(""), trim_body(after));
        }
    }

    let mut offset = 0;
    while let Some(pos) = rest[offset..].find("\n---") {
        let fence = offset + pos;
        let after = &rest[fence + "\n---".len()..];
        if after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n") {
            let yaml = rest[..fence].trim_end_matches('\r');
            return (Some(yaml), trim_body(after));
        }
        offset = fence + 1;
    }
    (None, raw)
}

fn trim_body(after_fence: &str) -> &str {
    after_fence.trim_start_matches(['\r', '\n'])
}

/// Parse the frontmatter of `raw` into `T`. `label` names the source (usually
/// a path) in errors. Missing or malformed frontmatter is an error.
pub fn parse<T: DeserializeOwned>(raw: &str, label: &str) -> Result<(T, String)> {
    let (yaml, body) = split(raw);
    let yaml = yaml.ok_or_else(|| IdeaflowError::Frontmatter {
        path: label.to_string(),
        reason: "missing '---' frontmatter block".to_string(),
    })?;
    let meta = serde_yaml::from_str(yaml).map_err(|e| IdeaflowError::Frontmatter {
        path: label.to_string(),
        reason: e.to_string(),
    })?;
    Ok((meta, body.to_string()))
}

/// Render `meta` as a frontmatter block followed by `body`, ending with a newline.
pub fn render<T: Serialize>(meta: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(meta)?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 16);
    out.push_str("---\n");
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(body.trim_end());
    out.push('\n');
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
