//! In-memory fakes for the core ports, shared by the integration tests.

#![allow(dead_code)]

use api_lib::{config::GenerationSettings, web::protocol::ServerMessage};
use async_trait::async_trait;
use chrono::Utc;
use faq_core::{
    domain::{
        Faq, FaqActivity, FaqDetail, FaqId, FaqMetadata, QuestionAnswer, QuestionAnswerDraft,
        Tone, UserId,
    },
    ports::{FaqStore, FragmentStream, PortError, PortResult, TextGenerationService},
};
use futures::{stream, StreamExt};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc;

//=========================================================================================
// MemoryFaqStore
//=========================================================================================

#[derive(Default)]
struct Tables {
    next_faq_id: FaqId,
    next_record_id: i64,
    faqs: BTreeMap<FaqId, Faq>,
    records: BTreeMap<FaqId, Vec<QuestionAnswer>>,
}

#[derive(Default)]
pub struct MemoryFaqStore {
    tables: Mutex<Tables>,
    fail_attach: AtomicBool,
    hang_attach: AtomicBool,
}

impl MemoryFaqStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `attach_generated_faq` call fail.
    pub fn fail_attach(&self) {
        self.fail_attach.store(true, Ordering::SeqCst);
    }

    /// Makes every later `attach_generated_faq` call wait forever.
    pub fn hang_attach(&self) {
        self.hang_attach.store(true, Ordering::SeqCst);
    }

    /// Inserts an FAQ with existing records directly, bypassing the generation flow.
    pub fn seed(&self, user_id: UserId, questions: &[(&str, &str)]) -> FaqId {
        let mut tables = self.tables.lock().unwrap();
        let faq = new_faq(&mut tables, user_id);
        let faq_id = faq.id;
        tables.faqs.insert(faq_id, faq);
        for (question, answer) in questions {
            let record = new_record(&mut tables, &QuestionAnswerDraft::new(*question, *answer));
            tables.records.entry(faq_id).or_default().push(record);
        }
        faq_id
    }

    pub fn faq_count(&self) -> usize {
        self.tables.lock().unwrap().faqs.len()
    }

    pub fn record_count(&self, faq_id: FaqId) -> usize {
        self.tables
            .lock()
            .unwrap()
            .records
            .get(&faq_id)
            .map_or(0, Vec::len)
    }

    pub fn faq(&self, faq_id: FaqId) -> Option<Faq> {
        self.tables.lock().unwrap().faqs.get(&faq_id).cloned()
    }
}

fn new_faq(tables: &mut Tables, user_id: UserId) -> Faq {
    tables.next_faq_id += 1;
    let now = Utc::now();
    Faq {
        id: tables.next_faq_id,
        user_id,
        title: "Generated FAQ".to_string(),
        content: String::new(),
        number_of_faqs: 5,
        tone: Tone::Neutral,
        category: None,
        created_at: now,
        updated_at: now,
    }
}

fn new_record(tables: &mut Tables, draft: &QuestionAnswerDraft) -> QuestionAnswer {
    tables.next_record_id += 1;
    let now = Utc::now();
    QuestionAnswer {
        id: tables.next_record_id,
        question: draft.question.clone(),
        answer: draft.answer.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn not_found(faq_id: FaqId) -> PortError {
    PortError::NotFound(format!("FAQ {} not found", faq_id))
}

fn detail_of(tables: &Tables, faq: &Faq) -> FaqDetail {
    FaqDetail {
        faq: faq.clone(),
        generated_faqs: tables.records.get(&faq.id).cloned().unwrap_or_default(),
    }
}

#[async_trait]
impl FaqStore for MemoryFaqStore {
    async fn get_or_create_faq(&self, user_id: UserId, faq_id: Option<FaqId>) -> PortResult<Faq> {
        let mut tables = self.tables.lock().unwrap();
        match faq_id {
            Some(faq_id) => tables
                .faqs
                .get(&faq_id)
                .filter(|faq| faq.user_id == user_id)
                .cloned()
                .ok_or_else(|| not_found(faq_id)),
            None => {
                let faq = new_faq(&mut tables, user_id);
                tables.faqs.insert(faq.id, faq.clone());
                Ok(faq)
            }
        }
    }

    async fn clear_generated_faqs(&self, faq_id: FaqId) -> PortResult<()> {
        self.tables.lock().unwrap().records.remove(&faq_id);
        Ok(())
    }

    async fn update_faq_metadata(&self, faq_id: FaqId, metadata: &FaqMetadata) -> PortResult<Faq> {
        let mut tables = self.tables.lock().unwrap();
        let faq = tables.faqs.get_mut(&faq_id).ok_or_else(|| not_found(faq_id))?;
        faq.title = metadata.title.clone();
        faq.content = metadata.content.clone();
        faq.number_of_faqs = metadata.number_of_faqs;
        faq.tone = metadata.tone;
        faq.updated_at = Utc::now();
        Ok(faq.clone())
    }

    async fn attach_generated_faq(
        &self,
        faq_id: FaqId,
        draft: &QuestionAnswerDraft,
    ) -> PortResult<QuestionAnswer> {
        if self.hang_attach.load(Ordering::SeqCst) {
            return futures::future::pending().await;
        }
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("disk full".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.faqs.contains_key(&faq_id) {
            return Err(not_found(faq_id));
        }
        let record = new_record(&mut tables, draft);
        tables.records.entry(faq_id).or_default().push(record.clone());
        Ok(record)
    }

    async fn get_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<FaqDetail> {
        let tables = self.tables.lock().unwrap();
        let faq = tables
            .faqs
            .get(&faq_id)
            .filter(|faq| faq.user_id == user_id)
            .ok_or_else(|| not_found(faq_id))?;
        Ok(detail_of(&tables, faq))
    }

    async fn list_faqs(&self, user_id: UserId) -> PortResult<Vec<FaqDetail>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .faqs
            .values()
            .rev()
            .filter(|faq| faq.user_id == user_id)
            .map(|faq| detail_of(&tables, faq))
            .collect())
    }

    async fn delete_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let owned = tables
            .faqs
            .get(&faq_id)
            .is_some_and(|faq| faq.user_id == user_id);
        if !owned {
            return Err(not_found(faq_id));
        }
        tables.faqs.remove(&faq_id);
        tables.records.remove(&faq_id);
        Ok(())
    }

    async fn list_faq_activity(&self, user_id: UserId) -> PortResult<Vec<FaqActivity>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .faqs
            .values()
            .filter(|faq| faq.user_id == user_id)
            .map(|faq| FaqActivity {
                faq_id: faq.id,
                tone: Some(faq.tone),
                question_count: tables.records.get(&faq.id).map_or(0, |r| r.len() as u64),
                created_at: faq.created_at,
            })
            .collect())
    }
}

//=========================================================================================
// ScriptedGenerator
//=========================================================================================

/// What the fake model does when asked to stream.
#[derive(Clone)]
pub enum Script {
    /// Yields each fragment in order, then ends.
    Fragments(Vec<String>),
    /// Yields the fragments, then never yields again.
    FragmentsThenHang(Vec<String>),
    /// Fails to open the stream.
    Unavailable,
    /// Yields the fragments, then fails mid-stream.
    FragmentsThenFail(Vec<String>),
}

pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(Script::Fragments(
            fragments.iter().map(|f| f.to_string()).collect(),
        ))
    }

    /// Waits until `count` streams have been opened.
    pub async fn wait_for_streams(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.prompts.lock().unwrap().len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("the model stream was never opened");
    }

    /// The `(model, prompt)` pairs the generator has been asked for.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationService for ScriptedGenerator {
    async fn stream(&self, model: &str, prompt: &str) -> PortResult<FragmentStream> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));

        let items = |fragments: &[String]| -> Vec<PortResult<String>> {
            fragments.iter().cloned().map(Ok).collect()
        };

        match &self.script {
            Script::Fragments(fragments) => Ok(Box::pin(stream::iter(items(fragments)))),
            Script::FragmentsThenHang(fragments) => Ok(Box::pin(
                stream::iter(items(fragments)).chain(stream::pending()),
            )),
            Script::Unavailable => Err(PortError::UpstreamUnavailable(
                "connection refused".to_string(),
            )),
            Script::FragmentsThenFail(fragments) => {
                let mut all = items(fragments);
                all.push(Err(PortError::Upstream("model crashed".to_string())));
                Ok(Box::pin(stream::iter(all)))
            }
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

pub fn settings() -> GenerationSettings {
    GenerationSettings {
        model: "test-model".to_string(),
        max_faqs: 20,
        timeout: Duration::from_secs(5),
    }
}

/// Serializes a frame to JSON for easy assertions.
pub fn to_json(message: &ServerMessage) -> serde_json::Value {
    serde_json::to_value(message).unwrap()
}

/// Receives frames until (and including) the next terminal one.
pub async fn collect_until_terminal(
    events: &mut mpsc::UnboundedReceiver<ServerMessage>,
) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("event channel closed");
        let terminal = message.is_terminal();
        frames.push(to_json(&message));
        if terminal {
            return frames;
        }
    }
}
