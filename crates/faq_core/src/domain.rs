//! crates/faq_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type FaqId = i64;
pub type QuestionAnswerId = i64;

/// Number of content characters considered when deriving a title.
pub const TITLE_MAX_CHARS: usize = 25;

/// Upper bound on a stored question, matching the `varchar(255)` column.
pub const QUESTION_MAX_CHARS: usize = 255;

/// The authenticated caller of a connection or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
}

/// The voice requested for generated questions and answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tone {
    Formal,
    #[default]
    Neutral,
    Casual,
}

impl Tone {
    pub const ALL: [Tone; 3] = [Tone::Formal, Tone::Neutral, Tone::Casual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Formal => "formal",
            Tone::Neutral => "neutral",
            Tone::Casual => "casual",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tone must be one of: formal, neutral, casual (got '{0}')")]
pub struct UnknownTone(pub String);

impl FromStr for Tone {
    type Err = UnknownTone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formal" => Ok(Tone::Formal),
            "neutral" => Ok(Tone::Neutral),
            "casual" => Ok(Tone::Casual),
            other => Err(UnknownTone(other.to_string())),
        }
    }
}

/// A persisted container for one generation request and its results.
#[derive(Debug, Clone)]
pub struct Faq {
    pub id: FaqId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub number_of_faqs: u32,
    pub tone: Tone,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single generated question-and-answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionAnswer {
    pub id: QuestionAnswerId,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A question-and-answer pair that has been parsed but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionAnswerDraft {
    pub question: String,
    pub answer: String,
}

impl QuestionAnswerDraft {
    /// Builds a draft, capping the question at the storable length.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question: String = question.into();
        let question = if question.chars().count() > QUESTION_MAX_CHARS {
            question.chars().take(QUESTION_MAX_CHARS).collect()
        } else {
            question
        };
        Self {
            question,
            answer: answer.into(),
        }
    }
}

/// An FAQ together with its generated records, in generation order.
#[derive(Debug, Clone)]
pub struct FaqDetail {
    pub faq: Faq,
    pub generated_faqs: Vec<QuestionAnswer>,
}

/// The descriptive fields rewritten on every generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqMetadata {
    pub title: String,
    pub content: String,
    pub number_of_faqs: u32,
    pub tone: Tone,
}

impl FaqMetadata {
    pub fn new(content: &str, number_of_faqs: u32, tone: Tone) -> Self {
        Self {
            title: derive_title(content),
            content: content.to_string(),
            number_of_faqs,
            tone,
        }
    }
}

/// The minimal per-FAQ facts needed to compute usage statistics.
#[derive(Debug, Clone)]
pub struct FaqActivity {
    pub faq_id: FaqId,
    pub tone: Option<Tone>,
    pub question_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Derives a display title from the source content.
///
/// Takes the first `TITLE_MAX_CHARS` characters; when the content is longer,
/// the trailing (possibly partial) word is dropped and `...` is appended.
pub fn derive_title(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() <= TITLE_MAX_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(TITLE_MAX_CHARS).collect();
    let head = head.trim_end();
    let cut = match head.rsplit_once(' ') {
        Some((words, _)) if !words.trim().is_empty() => words.trim_end(),
        _ => head,
    };
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_used_verbatim() {
        assert_eq!(derive_title("  Our product ships nightly. "), "Our product ships nightly.");
    }

    #[test]
    fn long_content_is_cut_at_a_word_boundary() {
        let title = derive_title("The quick brown fox jumps over the lazy dog");
        assert_eq!(title, "The quick brown fox...");
    }

    #[test]
    fn long_single_word_is_truncated_hard() {
        let title = derive_title(&"a".repeat(40));
        assert_eq!(title, format!("{}...", "a".repeat(25)));
    }

    #[test]
    fn title_handles_multibyte_characters() {
        let title = derive_title("Ünïcödé tëxt thät ïs wäy löngér thän twënty-fïvé");
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn tone_round_trips_through_its_name() {
        for tone in Tone::ALL {
            assert_eq!(tone.as_str().parse::<Tone>(), Ok(tone));
        }
        assert_eq!(
            "friendly".parse::<Tone>(),
            Err(UnknownTone("friendly".to_string()))
        );
    }

    #[test]
    fn draft_caps_question_length() {
        let draft = QuestionAnswerDraft::new("q".repeat(300), "answer");
        assert_eq!(draft.question.chars().count(), QUESTION_MAX_CHARS);
        assert_eq!(draft.answer, "answer");
    }
}
