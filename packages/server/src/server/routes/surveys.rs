//! Signed survey links from transaction-survey emails.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::common::EngineError;
use crate::domains::tenders::activities;
use crate::domains::tenders::models::TransactionAnswer;
use crate::server::app::AppState;
use crate::server::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct SurveyQuery {
    pub answer: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SurveyResponse {
    pub recorded: bool,
    pub answer: String,
}

pub async fn author_survey_handler(
    Extension(state): Extension<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<SurveyQuery>,
) -> ApiResult<Json<SurveyResponse>> {
    let answer: TransactionAnswer = query.answer.parse().map_err(EngineError::Validation)?;
    activities::answer_author_survey(&slug, answer, &query.token, Utc::now(), &state.deps).await?;
    Ok(Json(SurveyResponse {
        recorded: true,
        answer: answer.as_str().to_string(),
    }))
}

pub async fn supplier_survey_handler(
    Extension(state): Extension<AppState>,
    Path((slug, siae_slug)): Path<(String, String)>,
    Query(query): Query<SurveyQuery>,
) -> ApiResult<Json<SurveyResponse>> {
    let answer = parse_bool_answer(&query.answer)?;
    activities::answer_supplier_survey(&slug, &siae_slug, answer, &query.token, Utc::now(), &state.deps)
        .await?;
    Ok(Json(SurveyResponse {
        recorded: true,
        answer: answer.to_string(),
    }))
}

/// Links carry `True`/`False`; any case is accepted.
fn parse_bool_answer(raw: &str) -> Result<bool, EngineError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(EngineError::validation(format!("unknown answer: {}", other))),
    }
}
