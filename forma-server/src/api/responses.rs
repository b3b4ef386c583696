//! Response submission and listing

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use forma_common::model::{AnswerMap, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::validation::validate;
use crate::AppState;

/// Submission body
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub answers: AnswerMap,
}

/// Response log listing
#[derive(Debug, Serialize)]
pub struct ResponseList {
    pub items: Vec<Response>,
}

/// POST /api/forms/:id/responses
///
/// Validates against the stored schema, appends, then wakes long-polls
/// parked on the form.
pub async fn submit_response(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<Response>)> {
    let form = db::get_form(&state.db, &form_id).await?;

    let errors = validate(&form.fields, &request.answers);
    if !errors.is_empty() {
        debug!("Rejected response to form {}: {:?}", form_id, errors);
        return Err(ApiError::Validation(errors));
    }

    let response = store_response(&state, &form_id, request.answers).await?;
    info!(
        "Stored response {} for form {} at {}",
        response.id, form_id, response.submitted_at
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// Append validated answers and wake waiters on the form
///
/// Runs on its own task: once started, the append and the wake-up finish
/// even if the submitting request is dropped mid-commit.
pub async fn store_response(
    state: &AppState,
    form_id: &str,
    answers: AnswerMap,
) -> ApiResult<Response> {
    let pool = state.db.clone();
    let hub = Arc::clone(&state.hub);
    let form_id = form_id.to_string();

    let task = tokio::spawn(async move {
        let response = db::append_response(&pool, &form_id, answers).await?;
        hub.publish(&form_id, response.submitted_at);
        Ok::<_, forma_common::Error>(response)
    });

    task.await
        .map_err(|e| ApiError::Internal(format!("append task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// GET /api/forms/:id/responses
pub async fn list_responses(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> ApiResult<Json<ResponseList>> {
    // Distinguish an unknown form from an empty log
    db::count_and_watermark(&state.db, &form_id).await?;
    let items = db::list_since(&state.db, &form_id, i64::MIN).await?;
    Ok(Json(ResponseList { items }))
}

/// Build response routes
pub fn response_routes() -> Router<AppState> {
    Router::new().route(
        "/api/forms/:id/responses",
        post(submit_response).get(list_responses),
    )
}
