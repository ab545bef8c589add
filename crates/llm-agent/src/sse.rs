//! Server-sent-event framing for streamed chat completions.

use serde::Deserialize;

use crate::error::LlmError;
use crate::types::TokenUsage;
use crate::Result;

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// One meaningful SSE line.
#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Delta {
        content: Option<String>,
        finish_reason: Option<String>,
        model: Option<String>,
        usage: Option<TokenUsage>,
    },
    Done,
}

/// Parse one SSE line. Blank lines, comments and non-`data:` fields yield
/// `None`.
pub fn parse_sse_line(line: &str) -> Result<Option<SseEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|source| LlmError::Parse {
        payload: data.to_string(),
        source,
    })?;
    let (content, finish_reason) = match chunk.choices.into_iter().next() {
        Some(choice) => (choice.delta.content, choice.finish_reason),
        None => (None, None),
    };
    Ok(Some(SseEvent::Delta {
        content,
        finish_reason,
        model: chunk.model,
        usage: chunk.usage,
    }))
}

/// Splits a byte stream into lines. Bytes are buffered until a newline so
/// multi-byte characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever remains after the stream ends without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta() {
        let line = r#"data: {"model":"gpt-4o","choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let event = parse_sse_line(line).unwrap().unwrap();
        assert_eq!(
            event,
            SseEvent::Delta {
                content: Some("Hel".into()),
                finish_reason: None,
                model: Some("gpt-4o".into()),
                usage: None,
            }
        );
    }

    #[test]
    fn parses_done_and_skips_noise() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), Some(SseEvent::Done));
        assert_eq!(parse_sse_line("").unwrap(), None);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
        assert_eq!(parse_sse_line("event: ping").unwrap(), None);
    }

    #[test]
    fn finish_reason_without_content() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let Some(SseEvent::Delta {
            content,
            finish_reason,
            ..
        }) = parse_sse_line(line).unwrap()
        else {
            panic!("expected delta")
        };
        assert!(content.is_none());
        assert_eq!(finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_sse_line("data: {not json").unwrap_err();
        assert!(matches!(err, LlmError::Parse { .. }));
    }

    #[test]
    fn line_buffer_joins_split_chunks() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\n\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert!(buf.push(b"NE]").is_empty());
        assert_eq!(buf.finish().as_deref(), Some("data: [DONE]"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn line_buffer_keeps_multibyte_chars() {
        let mut buf = LineBuffer::default();
        let text = "café\n".as_bytes();
        assert!(buf.push(&text[..4]).is_empty());
        assert_eq!(buf.push(&text[4..]), vec!["café".to_string()]);
    }
}
