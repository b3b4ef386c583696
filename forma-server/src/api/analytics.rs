//! Analytics snapshot and long-poll endpoints
//!
//! Path-style routes live under `/api/forms/:id/`; the query-style
//! `/analytics?formId=` aliases serve the same handlers.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::analytics::FormAnalytics;
use crate::error::{ApiError, ApiResult};
use crate::longpoll::{self, LongPollReply};
use crate::AppState;

/// Query parameters accepted by the analytics endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub form_id: Option<String>,
    pub since_ms: Option<String>,
    /// Older clients send `since`
    pub since: Option<String>,
}

impl AnalyticsQuery {
    /// Client cursor; missing or malformed values mean "from the start"
    pub fn cursor(&self) -> i64 {
        self.since_ms
            .as_deref()
            .or(self.since.as_deref())
            .and_then(parse_cursor)
            .unwrap_or(0)
    }

    fn required_form_id(&self) -> ApiResult<&str> {
        self.form_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("formId required".to_string()))
    }
}

fn parse_cursor(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(|n| n as i64)
    })
}

/// GET /api/forms/:id/analytics
pub async fn get_analytics(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> ApiResult<Json<FormAnalytics>> {
    Ok(Json(longpoll::snapshot(&state, &form_id).await?))
}

/// GET /api/forms/:id/analytics/longpoll?sinceMs=N
pub async fn longpoll_analytics(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<LongPollReply>> {
    Ok(Json(longpoll::poll(&state, &form_id, query.cursor()).await?))
}

/// GET /analytics?formId=X
pub async fn get_analytics_by_query(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<FormAnalytics>> {
    let form_id = query.required_form_id()?;
    Ok(Json(longpoll::snapshot(&state, form_id).await?))
}

/// GET /analytics/longpoll?formId=X&sinceMs=N
pub async fn longpoll_by_query(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<LongPollReply>> {
    let form_id = query.required_form_id()?;
    Ok(Json(longpoll::poll(&state, form_id, query.cursor()).await?))
}

/// Build analytics routes
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/forms/:id/analytics", get(get_analytics))
        .route("/api/forms/:id/analytics/longpoll", get(longpoll_analytics))
        .route("/analytics", get(get_analytics_by_query))
        .route("/analytics/longpoll", get(longpoll_by_query))
}
