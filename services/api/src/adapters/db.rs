//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `FaqStore` and `ApiTokenStore` ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use faq_core::domain::{
    Faq, FaqActivity, FaqDetail, FaqId, FaqMetadata, QuestionAnswer, QuestionAnswerDraft, Tone,
    UserId,
};
use faq_core::ports::{ApiTokenStore, FaqStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `FaqStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies any pending migrations from `services/api/migrations`.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn find_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<Faq> {
        let record = sqlx::query_as::<_, FaqRecord>(
            "SELECT id, user_id, title, content, number_of_faqs, tone, category, created_at, updated_at \
             FROM faqs WHERE id = $1 AND user_id = $2",
        )
        .bind(faq_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| faq_not_found(faq_id))?;
        Ok(record.to_domain())
    }

    async fn question_answers_for(&self, faq_ids: &[FaqId]) -> PortResult<HashMap<FaqId, Vec<QuestionAnswer>>> {
        let records = sqlx::query_as::<_, LinkedQuestionAnswerRecord>(
            "SELECT l.faq_id, qa.id, qa.question, qa.answer, qa.created_at, qa.updated_at \
             FROM faq_generated_faqs l \
             JOIN question_answers qa ON qa.id = l.question_answer_id \
             WHERE l.faq_id = ANY($1) \
             ORDER BY qa.id ASC",
        )
        .bind(faq_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<FaqId, Vec<QuestionAnswer>> = HashMap::new();
        for record in records {
            let faq_id = record.faq_id;
            grouped.entry(faq_id).or_default().push(record.to_domain());
        }
        Ok(grouped)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn faq_not_found(faq_id: FaqId) -> PortError {
    PortError::NotFound(format!("FAQ {} not found", faq_id))
}

fn parse_tone(raw: &str) -> Option<Tone> {
    match raw.parse::<Tone>() {
        Ok(tone) => Some(tone),
        Err(e) => {
            warn!("Ignoring unexpected tone in database: {}", e);
            None
        }
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct FaqRecord {
    id: i64,
    user_id: i64,
    title: String,
    content: String,
    number_of_faqs: i32,
    tone: String,
    category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl FaqRecord {
    fn to_domain(self) -> Faq {
        Faq {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            number_of_faqs: self.number_of_faqs.max(1) as u32,
            tone: parse_tone(&self.tone).unwrap_or_default(),
            category: self.category,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionAnswerRecord {
    id: i64,
    question: String,
    answer: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl QuestionAnswerRecord {
    fn to_domain(self) -> QuestionAnswer {
        QuestionAnswer {
            id: self.id,
            question: self.question,
            answer: self.answer,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LinkedQuestionAnswerRecord {
    faq_id: i64,
    #[sqlx(flatten)]
    question_answer: QuestionAnswerRecord,
}
impl LinkedQuestionAnswerRecord {
    fn to_domain(self) -> QuestionAnswer {
        self.question_answer.to_domain()
    }
}

#[derive(FromRow)]
struct FaqActivityRecord {
    id: i64,
    tone: Option<String>,
    question_count: i64,
    created_at: DateTime<Utc>,
}
impl FaqActivityRecord {
    fn to_domain(self) -> FaqActivity {
        FaqActivity {
            faq_id: self.id,
            tone: self.tone.as_deref().and_then(parse_tone),
            question_count: self.question_count.max(0) as u64,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TokenOwnerRecord {
    user_id: i64,
}

//=========================================================================================
// `FaqStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FaqStore for DbAdapter {
    async fn get_or_create_faq(&self, user_id: UserId, faq_id: Option<FaqId>) -> PortResult<Faq> {
        if let Some(faq_id) = faq_id {
            return self.find_faq(user_id, faq_id).await;
        }

        let record = sqlx::query_as::<_, FaqRecord>(
            "INSERT INTO faqs (user_id, title, content) VALUES ($1, $2, '') \
             RETURNING id, user_id, title, content, number_of_faqs, tone, category, created_at, updated_at",
        )
        .bind(user_id)
        .bind("Generated FAQ")
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn clear_generated_faqs(&self, faq_id: FaqId) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM question_answers WHERE id IN \
             (SELECT question_answer_id FROM faq_generated_faqs WHERE faq_id = $1)",
        )
        .bind(faq_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_faq_metadata(&self, faq_id: FaqId, metadata: &FaqMetadata) -> PortResult<Faq> {
        let record = sqlx::query_as::<_, FaqRecord>(
            "UPDATE faqs SET title = $1, content = $2, number_of_faqs = $3, tone = $4, updated_at = NOW() \
             WHERE id = $5 \
             RETURNING id, user_id, title, content, number_of_faqs, tone, category, created_at, updated_at",
        )
        .bind(&metadata.title)
        .bind(&metadata.content)
        .bind(metadata.number_of_faqs as i32)
        .bind(metadata.tone.as_str())
        .bind(faq_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| faq_not_found(faq_id))?;
        Ok(record.to_domain())
    }

    async fn attach_generated_faq(
        &self,
        faq_id: FaqId,
        draft: &QuestionAnswerDraft,
    ) -> PortResult<QuestionAnswer> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, QuestionAnswerRecord>(
            "INSERT INTO question_answers (question, answer) VALUES ($1, $2) \
             RETURNING id, question, answer, created_at, updated_at",
        )
        .bind(&draft.question)
        .bind(&draft.answer)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query("INSERT INTO faq_generated_faqs (faq_id, question_answer_id) VALUES ($1, $2)")
            .bind(faq_id)
            .bind(record.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<FaqDetail> {
        let faq = self.find_faq(user_id, faq_id).await?;
        let mut grouped = self.question_answers_for(&[faq.id]).await?;
        let generated_faqs = grouped.remove(&faq.id).unwrap_or_default();
        Ok(FaqDetail { faq, generated_faqs })
    }

    async fn list_faqs(&self, user_id: UserId) -> PortResult<Vec<FaqDetail>> {
        let records = sqlx::query_as::<_, FaqRecord>(
            "SELECT id, user_id, title, content, number_of_faqs, tone, category, created_at, updated_at \
             FROM faqs WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let faq_ids: Vec<FaqId> = records.iter().map(|r| r.id).collect();
        let mut grouped = self.question_answers_for(&faq_ids).await?;

        let details = records
            .into_iter()
            .map(|r| {
                let faq = r.to_domain();
                let generated_faqs = grouped.remove(&faq.id).unwrap_or_default();
                FaqDetail { faq, generated_faqs }
            })
            .collect();
        Ok(details)
    }

    async fn delete_faq(&self, user_id: UserId, faq_id: FaqId) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "DELETE FROM question_answers WHERE id IN \
             (SELECT l.question_answer_id FROM faq_generated_faqs l \
              JOIN faqs f ON f.id = l.faq_id WHERE f.id = $1 AND f.user_id = $2)",
        )
        .bind(faq_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let deleted = sqlx::query("DELETE FROM faqs WHERE id = $1 AND user_id = $2")
            .bind(faq_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        if deleted.rows_affected() == 0 {
            return Err(faq_not_found(faq_id));
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn list_faq_activity(&self, user_id: UserId) -> PortResult<Vec<FaqActivity>> {
        let records = sqlx::query_as::<_, FaqActivityRecord>(
            "SELECT f.id, f.tone, COUNT(l.question_answer_id) AS question_count, f.created_at \
             FROM faqs f LEFT JOIN faq_generated_faqs l ON l.faq_id = f.id \
             WHERE f.user_id = $1 \
             GROUP BY f.id, f.tone, f.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `ApiTokenStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ApiTokenStore for DbAdapter {
    async fn user_for_token(&self, key: &str) -> PortResult<Option<UserId>> {
        let record = sqlx::query_as::<_, TokenOwnerRecord>(
            "SELECT user_id FROM auth_tokens WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.user_id))
    }
}
