//! Form create/read/update

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use forma_common::model::{Form, FormDraft};
use tracing::info;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /api/forms
pub async fn create_form(
    State(state): State<AppState>,
    Json(draft): Json<FormDraft>,
) -> ApiResult<(StatusCode, Json<Form>)> {
    draft.check().map_err(ApiError::from)?;

    let form = db::insert_form(&state.db, &draft).await?;
    info!("Created form {} ({} fields)", form.id, form.fields.len());

    Ok((StatusCode::CREATED, Json(form)))
}

/// GET /api/forms/:id
pub async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Form>> {
    Ok(Json(db::get_form(&state.db, &id).await?))
}

/// PUT /api/forms/:id
///
/// Replaces title and fields. Stored responses are kept; analytics for the
/// form are rebuilt against the new schema on next read.
pub async fn update_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<FormDraft>,
) -> ApiResult<Json<Form>> {
    draft.check().map_err(ApiError::from)?;

    let form = db::update_form(&state.db, &id, &draft).await?;
    state.cache.invalidate(&form.id);
    info!("Updated form {}", form.id);

    Ok(Json(form))
}

/// Build form routes
pub fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/api/forms", post(create_form))
        .route("/api/forms/:id", get(get_form).put(update_form))
}
