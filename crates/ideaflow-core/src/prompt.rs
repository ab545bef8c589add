/// A prompt with `{name}` placeholders.
///
/// Unknown placeholders are left as written so templates can mention
/// literal braces in examples; `{{` and `}}` always produce a single brace.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate<'a> {
    text: &'a str,
}

impl<'a> PromptTemplate<'a> {
    pub const fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let text = self.text;
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") {
                out.push('{');
                rest = &tail[2..];
            } else if tail.starts_with("}}") {
                out.push('}');
                rest = &tail[2..];
            } else if tail.starts_with('{') {
                match placeholder(tail).and_then(|name| lookup(vars, name).map(|v| (name, v))) {
                    Some((name, value)) => {
                        out.push_str(value);
                        rest = &tail[name.len() + 2..];
                    }
                    None => {
                        out.push('{');
                        rest = &tail[1..];
                    }
                }
            } else {
                out.push('}');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Name inside `{name}` when `tail` starts with a well-formed placeholder.
fn placeholder(tail: &str) -> Option<&str> {
    let close = tail.find('}')?;
    let name = &tail[1..close];
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

fn lookup<'v>(vars: &[(&str, &'v str)], name: &str) -> Option<&'v str> {
    vars.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
}
