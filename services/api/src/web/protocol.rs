//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for streaming FAQ generation.

use chrono::{DateTime, Utc};
use faq_core::domain::{FaqDetail, FaqId, QuestionAnswer};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// A generation request exactly as received. Values are validated by the
/// generation session, not here, so bad values still produce an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub text: String,
    pub num_questions: i64,
    pub tone: String,
    pub faq_id: Option<FaqId>,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            num_questions: 5,
            tone: "neutral".to_string(),
            faq_id: None,
        }
    }
}

/// Represents the structured text messages a client can send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Starts generating FAQs for the given text. Carries no `type` on the wire.
    Generate(GenerateRequest),
    /// Abandons the generation in flight, if any.
    Stop,
}

#[derive(Deserialize)]
struct RawClientFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    num_questions: Option<i64>,
    #[serde(default)]
    tone: Option<String>,
    #[serde(default)]
    faq_id: Option<FaqId>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unrecognized message type '{0}'")]
    UnknownType(String),
}

/// Decodes one inbound text frame.
pub fn decode_client_frame(text: &str) -> Result<ClientMessage, FrameError> {
    let raw: RawClientFrame = serde_json::from_str(text)?;
    match raw.kind.as_deref() {
        Some("stop") => Ok(ClientMessage::Stop),
        None | Some("generate") => {
            let defaults = GenerateRequest::default();
            Ok(ClientMessage::Generate(GenerateRequest {
                text: raw.text.unwrap_or(defaults.text),
                num_questions: raw.num_questions.unwrap_or(defaults.num_questions),
                tone: raw.tone.unwrap_or(defaults.tone),
                // An id of 0 never names a stored FAQ; it asks for a new one.
                faq_id: raw.faq_id.filter(|id| *id != 0),
            }))
        }
        Some(other) => Err(FrameError::UnknownType(other.to_string())),
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Generating,
    Complete,
    Stopped,
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One freshly generated and stored record.
    Faq {
        #[serde(rename = "faqId")]
        faq_id: FaqId,
        id: i64,
        question: String,
        answer: String,
        status: GenerationStatus,
    },

    /// Completion (with the full snapshot) or stop acknowledgement.
    Status {
        status: GenerationStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        faq: Option<FaqPayload>,
    },

    /// Reports a failed attempt or a bad frame. The connection stays open.
    Error { message: String },
}

impl ServerMessage {
    pub fn generated(faq_id: FaqId, qa: &QuestionAnswer) -> Self {
        ServerMessage::Faq {
            faq_id,
            id: qa.id,
            question: qa.question.clone(),
            answer: qa.answer.clone(),
            status: GenerationStatus::Generating,
        }
    }

    pub fn complete(detail: &FaqDetail) -> Self {
        ServerMessage::Status {
            status: GenerationStatus::Complete,
            faq: Some(FaqPayload::from(detail)),
        }
    }

    pub fn stopped() -> Self {
        ServerMessage::Status {
            status: GenerationStatus::Stopped,
            faq: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// True for the frames that end a generation attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerMessage::Error { .. }
                | ServerMessage::Status {
                    status: GenerationStatus::Complete | GenerationStatus::Stopped,
                    ..
                }
        )
    }
}

//=========================================================================================
// Shared Payloads (WebSocket snapshot and REST responses)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct QuestionAnswerPayload {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

impl From<&QuestionAnswer> for QuestionAnswerPayload {
    fn from(qa: &QuestionAnswer) -> Self {
        Self {
            id: qa.id,
            question: qa.question.clone(),
            answer: qa.answer.clone(),
        }
    }
}

/// A full FAQ snapshot with its records in generation order.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct FaqPayload {
    pub id: i64,
    pub user: i64,
    pub title: String,
    pub content: String,
    pub generated_faqs: Vec<QuestionAnswerPayload>,
    pub number_of_faqs: u32,
    pub tone: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&FaqDetail> for FaqPayload {
    fn from(detail: &FaqDetail) -> Self {
        let faq = &detail.faq;
        Self {
            id: faq.id,
            user: faq.user_id,
            title: faq.title.clone(),
            content: faq.content.clone(),
            generated_faqs: detail.generated_faqs.iter().map(QuestionAnswerPayload::from).collect(),
            number_of_faqs: faq.number_of_faqs,
            tone: faq.tone.to_string(),
            category: faq.category.clone(),
            created_at: faq.created_at,
            updated_at: faq.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_frame_without_type_uses_defaults() {
        let msg = decode_client_frame(r#"{"text": "Our product ships nightly."}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Generate(GenerateRequest {
                text: "Our product ships nightly.".to_string(),
                num_questions: 5,
                tone: "neutral".to_string(),
                faq_id: None,
            })
        );
    }

    #[test]
    fn generate_frame_carries_all_fields() {
        let msg = decode_client_frame(
            r#"{"text": "t", "num_questions": 3, "tone": "casual", "faq_id": 12}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Generate(GenerateRequest {
                text: "t".to_string(),
                num_questions: 3,
                tone: "casual".to_string(),
                faq_id: Some(12),
            })
        );
    }

    #[test]
    fn null_faq_id_is_accepted() {
        let msg = decode_client_frame(r#"{"text": "t", "faq_id": null}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Generate(req) if req.faq_id.is_none()));
    }

    #[test]
    fn zero_faq_id_starts_a_new_faq() {
        let msg = decode_client_frame(r#"{"text": "t", "faq_id": 0}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Generate(req) if req.faq_id.is_none()));
    }

    #[test]
    fn stop_frame_is_recognized() {
        assert_eq!(decode_client_frame(r#"{"type": "stop"}"#).unwrap(), ClientMessage::Stop);
    }

    #[test]
    fn unknown_type_and_garbage_are_errors() {
        assert!(matches!(
            decode_client_frame(r#"{"type": "dance"}"#),
            Err(FrameError::UnknownType(t)) if t == "dance"
        ));
        assert!(matches!(decode_client_frame("not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(
            decode_client_frame(r#"{"text": "t", "num_questions": "five"}"#),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn faq_frame_matches_the_wire_format() {
        let msg = ServerMessage::Faq {
            faq_id: 3,
            id: 9,
            question: "Q?".to_string(),
            answer: "A.".to_string(),
            status: GenerationStatus::Generating,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "faq", "faqId": 3, "id": 9, "question": "Q?", "answer": "A.", "status": "generating"})
        );
    }

    #[test]
    fn stopped_and_error_frames_match_the_wire_format() {
        assert_eq!(
            serde_json::to_value(ServerMessage::stopped()).unwrap(),
            json!({"type": "status", "status": "stopped"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("boom")).unwrap(),
            json!({"type": "error", "message": "boom"})
        );
        assert!(ServerMessage::stopped().is_terminal());
        assert!(ServerMessage::error("boom").is_terminal());
    }
}
