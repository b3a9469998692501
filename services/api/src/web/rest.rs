//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    protocol::{FaqPayload, QuestionAnswerPayload},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use faq_core::{
    domain::{FaqId, Identity},
    ports::PortError,
    statistics::{summarize, FaqStatistics},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_faqs_handler,
        get_faq_handler,
        delete_faq_handler,
        statistics_handler,
    ),
    components(
        schemas(FaqPayload, QuestionAnswerPayload, StatisticsResponse, MonthlyTrend, DailyTrend, ToneShare)
    ),
    tags(
        (name = "FAQ Generator API", description = "Endpoints for browsing and managing generated FAQs.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct MonthlyTrend {
    /// Abbreviated month name, e.g. `Mar`.
    pub month: String,
    pub value: u64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DailyTrend {
    /// Abbreviated weekday name, e.g. `Tue`.
    pub day: String,
    pub value: u64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ToneShare {
    pub tone: String,
    pub value: u64,
}

/// The caller's usage summary.
#[derive(Serialize, Debug, ToSchema)]
pub struct StatisticsResponse {
    pub total_faqs: u64,
    pub total_questions: u64,
    pub avg_questions_per_faq: f64,
    pub last_faq_created: Option<FaqPayload>,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub daily_trends: Vec<DailyTrend>,
    pub tone_distribution: Vec<ToneShare>,
}

impl StatisticsResponse {
    fn new(stats: FaqStatistics, last_faq_created: Option<FaqPayload>) -> Self {
        Self {
            total_faqs: stats.total_faqs,
            total_questions: stats.total_questions,
            avg_questions_per_faq: stats.avg_questions_per_faq,
            last_faq_created,
            monthly_trends: stats
                .monthly_trends
                .iter()
                .map(|t| MonthlyTrend {
                    month: t.bucket.format("%b").to_string(),
                    value: t.count,
                })
                .collect(),
            daily_trends: stats
                .daily_trends
                .iter()
                .map(|t| DailyTrend {
                    day: t.bucket.format("%a").to_string(),
                    value: t.count,
                })
                .collect(),
            tone_distribution: stats
                .tones
                .iter()
                .map(|t| ToneShare {
                    tone: t
                        .tone
                        .map(|tone| tone.to_string())
                        .unwrap_or_else(|| "Uncategorized".to_string()),
                    value: t.count,
                })
                .collect(),
        }
    }
}

fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "FAQ not found".to_string()),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        other => {
            error!("{}: {:?}", context, other);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the caller's FAQs, newest first, each with its generated records.
#[utoipa::path(
    get,
    path = "/faqs",
    responses(
        (status = 200, description = "The caller's FAQs", body = [FaqPayload]),
        (status = 401, description = "Missing or invalid credential"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_faqs_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let faqs = app_state
        .db
        .list_faqs(identity.user_id)
        .await
        .map_err(|e| port_error_response("Failed to list FAQs", e))?;

    let payload: Vec<FaqPayload> = faqs.iter().map(FaqPayload::from).collect();
    Ok(Json(payload))
}

/// Fetch one FAQ with its records in generation order.
#[utoipa::path(
    get,
    path = "/faqs/{id}",
    params(("id" = i64, Path, description = "The FAQ id.")),
    responses(
        (status = 200, description = "The FAQ snapshot", body = FaqPayload),
        (status = 404, description = "No such FAQ for this user"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_faq_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(faq_id): Path<FaqId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let detail = app_state
        .db
        .get_faq(identity.user_id, faq_id)
        .await
        .map_err(|e| port_error_response("Failed to load FAQ", e))?;
    Ok(Json(FaqPayload::from(&detail)))
}

/// Delete an FAQ together with its generated records.
#[utoipa::path(
    delete,
    path = "/faqs/{id}",
    params(("id" = i64, Path, description = "The FAQ id.")),
    responses(
        (status = 204, description = "FAQ deleted"),
        (status = 404, description = "No such FAQ for this user"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_faq_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(faq_id): Path<FaqId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .db
        .delete_faq(identity.user_id, faq_id)
        .await
        .map_err(|e| port_error_response("Failed to delete FAQ", e))?;
    info!(user_id = identity.user_id, faq_id, "FAQ deleted.");
    Ok(StatusCode::NO_CONTENT)
}

/// Usage statistics for the caller.
#[utoipa::path(
    get,
    path = "/faqs/statistics",
    responses(
        (status = 200, description = "Aggregated statistics", body = StatisticsResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn statistics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let activity = app_state
        .db
        .list_faq_activity(identity.user_id)
        .await
        .map_err(|e| port_error_response("Failed to load statistics", e))?;

    let stats = summarize(&activity, Utc::now());

    let last_faq_created = match stats.last_faq_created {
        Some(faq_id) => match app_state.db.get_faq(identity.user_id, faq_id).await {
            Ok(detail) => Some(FaqPayload::from(&detail)),
            // Deleted between the two reads.
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(port_error_response("Failed to load statistics", e)),
        },
        None => None,
    };

    Ok(Json(StatisticsResponse::new(stats, last_faq_created)))
}
