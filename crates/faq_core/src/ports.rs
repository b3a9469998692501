//! crates/faq_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    Faq, FaqActivity, FaqDetail, FaqId, FaqMetadata, Identity, QuestionAnswer,
    QuestionAnswerDraft, UserId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Raw incremental text emitted by a generation service, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence of FAQs and their generated records.
///
/// Every lookup by id is scoped to the owning user: an FAQ owned by someone
/// else is reported as `NotFound`, exactly like one that never existed.
#[async_trait]
pub trait FaqStore: Send + Sync {
    // --- Generation flow ---
    /// Loads `faq_id` for `user_id`, or creates an empty FAQ when no id is given.
    async fn get_or_create_faq(&self, user_id: UserId, faq_id: Option<FaqId>) -> PortResult<Faq>;

    /// Deletes every record attached to the FAQ. Idempotent.
    async fn clear_generated_faqs(&self, faq_id: FaqId) -> PortResult<()>;

    async fn update_faq_metadata(&self, faq_id: FaqId, metadata: &FaqMetadata) -> PortResult<Faq>;

    /// Stores one record and attaches it to the FAQ in a single unit of work.
    async fn attach_generated_faq(
        &self,
        faq_id: FaqId,
        draft: &QuestionAnswerDraft,
    ) -> PortResult<QuestionAnswer>;

    // --- Reads and deletion ---
    async fn get_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<FaqDetail>;

    /// Lists the user's FAQs, newest first.
    async fn list_faqs(&self, user_id: UserId) -> PortResult<Vec<FaqDetail>>;

    async fn delete_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<()>;

    async fn list_faq_activity(&self, user_id: UserId) -> PortResult<Vec<FaqActivity>>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Starts a streaming completion and yields raw text fragments.
    ///
    /// The stream is finite and not restartable. Failures surface either from
    /// this call or as an `Err` item, as `UpstreamUnavailable` or `Upstream`.
    async fn stream(&self, model: &str, prompt: &str) -> PortResult<FragmentStream>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves a bearer credential to the identity it belongs to.
    async fn resolve(&self, credential: &str) -> PortResult<Option<Identity>>;
}

#[async_trait]
pub trait ApiTokenStore: Send + Sync {
    /// Looks up the owner of an opaque API token.
    async fn user_for_token(&self, key: &str) -> PortResult<Option<UserId>>;
}
