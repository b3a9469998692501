//! crates/faq_core/src/parser.rs
//!
//! Incremental extraction of question/answer objects from a model's raw,
//! partially-arrived JSON output.
//!
//! Fragments are appended to a running buffer. Each extraction searches the
//! unconsumed buffer for the first complete `{"question": "...", "answer": "..."}`
//! object, removes everything up to and including it, and returns it. Anything
//! that has not matched yet stays buffered for the next fragment.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::QuestionAnswerDraft;

// A JSON string body: anything but a quote or backslash, or an escape pair.
const RECORD_PATTERN: &str = r#"(?s)\{\s*(?:"question"\s*:\s*"(?P<q1>(?:[^"\\]|\\.)*)"\s*,\s*"answer"\s*:\s*"(?P<a1>(?:[^"\\]|\\.)*)"|"answer"\s*:\s*"(?P<a2>(?:[^"\\]|\\.)*)"\s*,\s*"question"\s*:\s*"(?P<q2>(?:[^"\\]|\\.)*)")\s*\}"#;

fn record_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(RECORD_PATTERN).ok())
        .as_ref()
}

/// Buffer-in, record-out parser for one generation attempt.
#[derive(Debug, Default)]
pub struct StreamingParser {
    buffer: String,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment to the unconsumed buffer.
    pub fn push(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    /// Removes and returns the next complete record, if the buffer holds one.
    ///
    /// Objects whose question or answer is blank are consumed and skipped.
    pub fn next_record(&mut self) -> Option<QuestionAnswerDraft> {
        loop {
            let (end, question, answer) = {
                let caps = record_pattern()?.captures(&self.buffer)?;
                let whole = caps.get(0)?;
                let question = caps.name("q1").or_else(|| caps.name("q2"))?;
                let answer = caps.name("a1").or_else(|| caps.name("a2"))?;
                (
                    whole.end(),
                    unescape(question.as_str()),
                    unescape(answer.as_str()),
                )
            };
            self.buffer.drain(..end);

            if question.trim().is_empty() || answer.trim().is_empty() {
                continue;
            }
            return Some(QuestionAnswerDraft::new(question, answer));
        }
    }

    /// Pushes a fragment and drains every record it completed, in stream order.
    pub fn feed(&mut self, fragment: &str) -> Vec<QuestionAnswerDraft> {
        self.push(fragment);
        std::iter::from_fn(|| self.next_record()).collect()
    }

    /// The buffered text that has not formed a record yet.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Ends the attempt, handing back whatever never matched.
    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Decodes JSON string escapes, falling back to the raw text when the body
/// is not strictly valid JSON (e.g. it contains literal newlines).
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| {
        raw.replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\\\", "\\")
    })
}
