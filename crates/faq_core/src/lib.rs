pub mod domain;
pub mod parser;
pub mod ports;
pub mod statistics;

pub use domain::{
    derive_title, Faq, FaqActivity, FaqDetail, FaqId, FaqMetadata, Identity, QuestionAnswer,
    QuestionAnswerDraft, Tone, UserId,
};
pub use parser::StreamingParser;
pub use ports::{
    ApiTokenStore, FaqStore, FragmentStream, IdentityService, PortError, PortResult,
    TextGenerationService,
};
