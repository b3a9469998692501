//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-connection generation phase.

use crate::config::Config;
use faq_core::ports::{FaqStore, IdentityService, TextGenerationService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn FaqStore>,
    pub config: Arc<Config>,
    pub generator: Arc<dyn TextGenerationService>,
    pub identity: Arc<dyn IdentityService>,
}

//=========================================================================================
// GenerationPhase (Specific to One WebSocket Connection)
//=========================================================================================

/// Where a connection's generation state machine currently is.
///
/// The terminal phases are passed through on the way back to `Idle`; a
/// connection never rests in one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Validating,
    Generating,
    Completed,
    Stopped,
    Failed,
    TimedOut,
}

impl GenerationPhase {
    /// True while an attempt owns the connection.
    pub fn is_busy(&self) -> bool {
        matches!(self, GenerationPhase::Validating | GenerationPhase::Generating)
    }
}
