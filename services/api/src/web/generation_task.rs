//! services/api/src/web/generation_task.rs
//!
//! The per-connection FAQ generation state machine and the asynchronous
//! "worker" that runs one generation attempt.
//!
//! A `GenerationSession` accepts one request at a time. A valid request is
//! handed to a spawned attempt that resolves the target FAQ, opens the model
//! stream, and persists and reports every record the parser completes. Every
//! attempt ends with exactly one terminal frame: `complete`, `stopped` or `error`.

use crate::{
    config::GenerationSettings,
    web::{
        protocol::{ClientMessage, GenerateRequest, ServerMessage},
        state::GenerationPhase,
    },
};
use faq_core::{
    domain::{FaqDetail, FaqId, FaqMetadata, Identity, Tone},
    parser::StreamingParser,
    ports::{FaqStore, PortError, PortResult, TextGenerationService},
};
use futures::StreamExt;
use std::{future::Future, pin::Pin, sync::Arc};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{sleep_until, Instant, Sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const PROMPT_TEMPLATE: &str = r#"Generate {num_questions} frequently asked questions and answers about the following text.
Use a {tone} tone in both questions and answers.
Format the response as JSON with 'generated_faqs' containing an array of objects with
'question' and 'answer' fields.

Text: {text}"#;

/// Renders the generation prompt for one request.
pub fn build_prompt(text: &str, num_questions: u32, tone: Tone) -> String {
    PROMPT_TEMPLATE
        .replace("{num_questions}", &num_questions.to_string())
        .replace("{tone}", tone.as_str())
        .replace("{text}", text)
}

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

/// Why an attempt failed. The `Display` text is what the client sees.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("FAQ not found.")]
    NotFound,

    #[error("The FAQ generation service is unavailable. Please try again later.")]
    UpstreamUnavailable(String),

    #[error("The FAQ generation service failed: {0}")]
    Upstream(String),

    #[error("Failed to save the generated FAQs.")]
    Persistence(String),

    #[error("FAQ generation took too long and was stopped.")]
    TimedOut,

    #[error("The client disconnected.")]
    Disconnected,
}

impl GenerationError {
    /// Classifies a failure reported by the FAQ store.
    pub fn from_store(e: PortError) -> Self {
        match e {
            PortError::NotFound(_) | PortError::Unauthorized => GenerationError::NotFound,
            other => GenerationError::Persistence(other.to_string()),
        }
    }

    /// Classifies a failure reported by the generation service.
    pub fn from_upstream(e: PortError) -> Self {
        match e {
            PortError::UpstreamUnavailable(detail) => GenerationError::UpstreamUnavailable(detail),
            PortError::Upstream(detail) | PortError::Unexpected(detail) | PortError::NotFound(detail) => {
                GenerationError::Upstream(detail)
            }
            PortError::Unauthorized => GenerationError::Upstream("unauthorized".to_string()),
        }
    }

    fn terminal_phase(&self) -> GenerationPhase {
        match self {
            GenerationError::TimedOut => GenerationPhase::TimedOut,
            _ => GenerationPhase::Failed,
        }
    }
}

#[derive(Debug)]
enum AttemptOutcome {
    Completed(FaqDetail),
    Stopped,
}

/// A generation request whose values have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub content: String,
    pub number_of_faqs: u32,
    pub tone: Tone,
    pub faq_id: Option<FaqId>,
}

pub fn validate_request(
    request: &GenerateRequest,
    max_faqs: u32,
) -> Result<ValidatedRequest, GenerationError> {
    let content = request.text.trim();
    if content.is_empty() {
        return Err(GenerationError::Validation(
            "Input text cannot be empty".to_string(),
        ));
    }

    let number_of_faqs = u32::try_from(request.num_questions)
        .ok()
        .filter(|n| (1..=max_faqs).contains(n))
        .ok_or_else(|| {
            GenerationError::Validation(format!(
                "num_questions must be between 1 and {}",
                max_faqs
            ))
        })?;

    let tone = request
        .tone
        .parse::<Tone>()
        .map_err(|e| GenerationError::Validation(e.to_string()))?;

    Ok(ValidatedRequest {
        content: content.to_string(),
        number_of_faqs,
        tone,
        faq_id: request.faq_id,
    })
}

//=========================================================================================
// GenerationSession (One Per WebSocket Connection)
//=========================================================================================

struct ActiveAttempt {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Everything a spawned attempt needs, detached from the session itself.
#[derive(Clone)]
struct AttemptContext {
    identity: Identity,
    store: Arc<dyn FaqStore>,
    generator: Arc<dyn TextGenerationService>,
    settings: GenerationSettings,
    events: mpsc::UnboundedSender<ServerMessage>,
    phase: Arc<Mutex<GenerationPhase>>,
}

impl AttemptContext {
    fn emit(&self, message: ServerMessage) -> Result<(), GenerationError> {
        self.events
            .send(message)
            .map_err(|_| GenerationError::Disconnected)
    }
}

/// The generation state machine bound to one authenticated connection.
pub struct GenerationSession {
    ctx: AttemptContext,
    active: Option<ActiveAttempt>,
}

impl GenerationSession {
    pub fn new(
        identity: Identity,
        store: Arc<dyn FaqStore>,
        generator: Arc<dyn TextGenerationService>,
        settings: GenerationSettings,
        events: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            ctx: AttemptContext {
                identity,
                store,
                generator,
                settings,
                events,
                phase: Arc::new(Mutex::new(GenerationPhase::Idle)),
            },
            active: None,
        }
    }

    pub async fn phase(&self) -> GenerationPhase {
        *self.ctx.phase.lock().await
    }

    /// Dispatches one decoded client message.
    pub async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Generate(request) => self.start(request).await,
            ClientMessage::Stop => self.stop().await,
        }
    }

    /// Validates a request and, if it is acceptable, spawns its attempt.
    pub async fn start(&mut self, request: GenerateRequest) {
        let validated = {
            let mut phase = self.ctx.phase.lock().await;
            if phase.is_busy() {
                drop(phase);
                warn!(
                    user_id = self.ctx.identity.user_id,
                    "Rejected generation request while another is in progress."
                );
                let _ = self.ctx.emit(ServerMessage::error(
                    "A generation is already in progress. Stop it before starting another.",
                ));
                return;
            }
            *phase = GenerationPhase::Validating;

            match validate_request(&request, self.ctx.settings.max_faqs) {
                Ok(validated) => {
                    *phase = GenerationPhase::Generating;
                    validated
                }
                Err(e) => {
                    info!("Generation request failed validation: {}", e);
                    transition(&mut phase, GenerationPhase::Failed);
                    transition(&mut phase, GenerationPhase::Idle);
                    drop(phase);
                    let _ = self.ctx.emit(ServerMessage::error(e.to_string()));
                    return;
                }
            }
        };

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_attempt(self.ctx.clone(), validated, token.clone()));
        self.active = Some(ActiveAttempt { token, handle });
    }

    /// Requests that the attempt in flight stop. When nothing is in flight
    /// the request is simply acknowledged.
    pub async fn stop(&mut self) {
        let busy = self.ctx.phase.lock().await.is_busy();
        match (&self.active, busy) {
            (Some(active), true) => {
                info!(user_id = self.ctx.identity.user_id, "Stop requested for the generation in flight.");
                active.token.cancel();
            }
            _ => {
                debug!("Stop requested while idle.");
                let _ = self.ctx.emit(ServerMessage::stopped());
            }
        }
    }

    /// Cancels and tears down any attempt in flight. Used when the connection goes away.
    pub async fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            active.handle.abort();
            if let Err(e) = active.handle.await {
                if !e.is_cancelled() {
                    error!("Generation task ended abnormally: {:?}", e);
                }
            }
        }
    }
}

fn transition(phase: &mut GenerationPhase, next: GenerationPhase) {
    debug!("Generation phase {:?} -> {:?}", *phase, next);
    *phase = next;
}

//=========================================================================================
// The Attempt Worker
//=========================================================================================

/// Runs one attempt to its end and reports its single terminal frame.
async fn run_attempt(ctx: AttemptContext, request: ValidatedRequest, token: CancellationToken) {
    info!(
        user_id = ctx.identity.user_id,
        faq_id = ?request.faq_id,
        num_questions = request.number_of_faqs,
        tone = %request.tone,
        "FAQ generation started."
    );

    let outcome = generate(&ctx, &request, &token).await;

    let (terminal, message) = match outcome {
        Ok(AttemptOutcome::Completed(detail)) => {
            info!(
                faq_id = detail.faq.id,
                records = detail.generated_faqs.len(),
                "FAQ generation completed."
            );
            (GenerationPhase::Completed, ServerMessage::complete(&detail))
        }
        Ok(AttemptOutcome::Stopped) => {
            info!("FAQ generation stopped by the client.");
            (GenerationPhase::Stopped, ServerMessage::stopped())
        }
        Err(GenerationError::Disconnected) => {
            warn!("Client went away during FAQ generation.");
            let mut phase = ctx.phase.lock().await;
            transition(&mut phase, GenerationPhase::Failed);
            transition(&mut phase, GenerationPhase::Idle);
            return;
        }
        Err(e) => {
            error!("FAQ generation failed: {:?}", e);
            (e.terminal_phase(), ServerMessage::error(e.to_string()))
        }
    };

    // The terminal frame is queued before the phase lock is released, so a
    // stop or start handled afterwards always lands behind it.
    let mut phase = ctx.phase.lock().await;
    transition(&mut phase, terminal);
    if ctx.emit(message).is_err() {
        warn!("Could not deliver the terminal generation message; client disconnected.");
    }
    transition(&mut phase, GenerationPhase::Idle);
}

async fn generate(
    ctx: &AttemptContext,
    request: &ValidatedRequest,
    token: &CancellationToken,
) -> Result<AttemptOutcome, GenerationError> {
    let deadline = Instant::now() + ctx.settings.timeout;
    let timeout = sleep_until(deadline);
    tokio::pin!(timeout);

    // --- 1. Resolve the target FAQ ---
    let user_id = ctx.identity.user_id;
    let faq = within_budget(
        ctx.store.get_or_create_faq(user_id, request.faq_id),
        timeout.as_mut(),
    )
    .await?;

    if request.faq_id.is_some() {
        within_budget(ctx.store.clear_generated_faqs(faq.id), timeout.as_mut()).await?;
    }

    let metadata = FaqMetadata::new(&request.content, request.number_of_faqs, request.tone);
    let faq = within_budget(
        ctx.store.update_faq_metadata(faq.id, &metadata),
        timeout.as_mut(),
    )
    .await?;

    // --- 2. Open the model stream ---
    let prompt = build_prompt(&request.content, request.number_of_faqs, request.tone);
    let mut fragments = tokio::select! {
        biased;
        _ = token.cancelled() => return Ok(AttemptOutcome::Stopped),
        _ = &mut timeout => return Err(GenerationError::TimedOut),
        opened = ctx.generator.stream(&ctx.settings.model, &prompt) => {
            opened.map_err(GenerationError::from_upstream)?
        }
    };

    // --- 3. Parse, persist and report records as they complete ---
    let mut parser = StreamingParser::new();
    let mut produced = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(AttemptOutcome::Stopped),
            _ = &mut timeout => return Err(GenerationError::TimedOut),
            next = fragments.next() => next,
        };

        let fragment = match next {
            Some(Ok(fragment)) => fragment,
            Some(Err(e)) => return Err(GenerationError::from_upstream(e)),
            None => break,
        };

        for draft in parser.feed(&fragment) {
            let qa = within_budget(
                ctx.store.attach_generated_faq(faq.id, &draft),
                timeout.as_mut(),
            )
            .await?;
            ctx.emit(ServerMessage::generated(faq.id, &qa))?;
            produced += 1;
            debug!(faq_id = faq.id, produced, "Generated FAQ record.");

            if token.is_cancelled() {
                return Ok(AttemptOutcome::Stopped);
            }
        }
    }
    drop(fragments);

    let leftover = parser.finish();
    if !leftover.trim().is_empty() {
        debug!(
            faq_id = faq.id,
            bytes = leftover.len(),
            "Dropping unmatched trailing model output."
        );
    }

    // --- 4. Report the stored snapshot ---
    let detail = within_budget(ctx.store.get_faq(user_id, faq.id), timeout.as_mut()).await?;
    Ok(AttemptOutcome::Completed(detail))
}

/// Awaits one store call inside the attempt's wall-clock budget.
///
/// Only the deadline is raced here. A stop request never interrupts a write
/// that is already under way; it is honoured at the next record boundary.
async fn within_budget<T>(
    call: impl Future<Output = PortResult<T>>,
    timeout: Pin<&mut Sleep>,
) -> Result<T, GenerationError> {
    tokio::select! {
        biased;
        _ = timeout => Err(GenerationError::TimedOut),
        result = call => result.map_err(GenerationError::from_store),
    }
}
