use crate::decision::{json_fence_re, str_field};
use crate::error::{IdeaflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Criteria and ratings
// ---------------------------------------------------------------------------

/// A yardstick technology stacks are rated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `LOW`, `MEDIUM`, `HIGH` or `VERY HIGH`.
    pub importance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub stack: String,
    pub criterion: String,
    pub rating: String,
}

/// Capabilities a stack adds or changes beyond the requested scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackNote {
    pub stack: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackRatings {
    pub ratings: Vec<Rating>,
    pub notes: Vec<StackNote>,
}

const DEFAULT_IMPORTANCE: &str = "MEDIUM";

// ---------------------------------------------------------------------------
// Extraction from model output
// ---------------------------------------------------------------------------

/// First JSON value in a model reply: a fenced ```json block, else from the
/// first `{` or `[`. Trailing prose is ignored.
fn first_json_value(text: &str) -> Result<Value> {
    let json = match json_fence_re().captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => {
            let start = text.find(['{', '[']).ok_or_else(|| {
                IdeaflowError::Json(serde::de::Error::custom("no JSON found in response"))
            })?;
            &text[start..]
        }
    };
    serde_json::Deserializer::from_str(json)
        .into_iter::<Value>()
        .next()
        .unwrap_or_else(|| Err(serde::de::Error::custom("empty JSON payload")))
        .map_err(IdeaflowError::from)
}

/// Items under `key` of an object, or the value itself when it is an array.
fn items(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Parse evaluation criteria. Accepts `{"criteria": [...]}` or a bare
/// array; items may be plain names. Missing names become `Criterion N`,
/// missing importance becomes `MEDIUM`, and repeated names are dropped.
pub fn parse_criteria(text: &str) -> Result<Vec<Criterion>> {
    let mut criteria: Vec<Criterion> = Vec::new();
    for (i, item) in items(first_json_value(text)?, "criteria").iter().enumerate() {
        let criterion = match item {
            Value::String(name) if !name.trim().is_empty() => Criterion {
                name: name.trim().to_string(),
                description: String::new(),
                importance: DEFAULT_IMPORTANCE.to_string(),
            },
            Value::Object(_) => Criterion {
                name: str_field(item, "name").unwrap_or_else(|| format!("Criterion {}", i + 1)),
                description: str_field(item, "description").unwrap_or_default(),
                importance: str_field(item, "importance")
                    .map(|s| s.to_uppercase())
                    .unwrap_or_else(|| DEFAULT_IMPORTANCE.to_string()),
            },
            _ => continue,
        };
        if !criteria.iter().any(|c| c.name.eq_ignore_ascii_case(&criterion.name)) {
            criteria.push(criterion);
        }
    }
    Ok(criteria)
}

/// Parse `{"ratings": [...], "notes": [...]}`. Entries missing a stack,
/// criterion or rating are skipped.
pub fn parse_ratings(text: &str) -> Result<StackRatings> {
    let value = first_json_value(text)?;
    let notes = if value.is_object() {
        items(value.clone(), "notes")
    } else {
        Vec::new()
    };
    let notes = notes
        .iter()
        .filter_map(|n| {
            Some(StackNote {
                stack: str_field(n, "stack")?,
                note: str_field(n, "note")?,
            })
        })
        .collect();
    let ratings = items(value, "ratings")
        .iter()
        .filter_map(|r| {
            Some(Rating {
                stack: str_field(r, "stack")?,
                criterion: str_field(r, "criterion")?,
                rating: str_field(r, "rating")?,
            })
        })
        .collect();
    Ok(StackRatings { ratings, notes })
}

// ---------------------------------------------------------------------------
// EvaluationMatrix
// ---------------------------------------------------------------------------

/// Stack by criterion ratings, rendered as a markdown table followed by the
/// criteria priorities and per-stack notes.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationMatrix {
    pub criteria: Vec<Criterion>,
    /// In order of first appearance in the ratings.
    pub stacks: Vec<String>,
    pub ratings: StackRatings,
}

impl EvaluationMatrix {
    pub fn new(criteria: Vec<Criterion>, ratings: StackRatings) -> Self {
        let mut stacks: Vec<String> = Vec::new();
        for r in &ratings.ratings {
            if !stacks.contains(&r.stack) {
                stacks.push(r.stack.clone());
            }
        }
        Self {
            criteria,
            stacks,
            ratings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty() || self.stacks.is_empty()
    }

    /// Rating of `stack` on `criterion`; criterion names match
    /// case-insensitively.
    pub fn rating(&self, stack: &str, criterion: &str) -> Option<&str> {
        self.ratings
            .ratings
            .iter()
            .find(|r| r.stack == stack && r.criterion.eq_ignore_ascii_case(criterion))
            .map(|r| r.rating.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::from("| Technology Stack |");
        for c in &self.criteria {
            out.push_str(&format!(" {} |", cell(&c.name)));
        }
        out.push_str("\n|---|");
        out.push_str(&"---|".repeat(self.criteria.len()));
        out.push('\n');
        for stack in &self.stacks {
            out.push_str(&format!("| {} |", cell(stack)));
            for c in &self.criteria {
                out.push_str(&format!(" {} |", cell(self.rating(stack, &c.name).unwrap_or("-"))));
            }
            out.push('\n');
        }

        out.push_str("\n**Criteria priority for this project**\n\n");
        for c in &self.criteria {
            out.push_str(&format!("- {}: {}", c.name, c.importance));
            if !c.description.is_empty() {
                out.push_str(&format!(" ({})", c.description));
            }
            out.push('\n');
        }

        if !self.ratings.notes.is_empty() {
            out.push_str("\n**Special considerations**\n\n");
            for n in &self.ratings.notes {
                out.push_str(&format!("- {}: {}\n", n.stack, n.note));
            }
        }
        out
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
