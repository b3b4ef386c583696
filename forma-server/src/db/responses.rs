//! Append-only response log
//!
//! Appends are serialized per form by the `UPDATE forms ... RETURNING` that
//! opens each append transaction: SQLite grants one writer at a time, and the
//! returned `last_response_ms` is `max(now, previous + 1)`. Watermarks are
//! therefore unique and strictly increasing per form, which is what lets
//! `list_since` use a plain `>` cursor.

use forma_common::model::{AnswerMap, Response};
use forma_common::{time, Error, Result};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Response count and latest `submittedAt` for a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub count: i64,
    pub last_ms: Option<i64>,
}

impl Watermark {
    /// True when this watermark is strictly newer than the client cursor
    pub fn is_newer_than(&self, cursor_ms: i64) -> bool {
        self.last_ms.is_some_and(|last| last > cursor_ms)
    }
}

type ResponseRow = (String, String, i64, String);

fn response_from_row(row: ResponseRow) -> Result<Response> {
    let (id, form_id, submitted_at, answers_json) = row;
    let answers: AnswerMap = serde_json::from_str(&answers_json)
        .map_err(|e| Error::Internal(format!("corrupt answers for response {}: {}", id, e)))?;
    Ok(Response {
        id,
        form_id,
        submitted_at,
        answers,
    })
}

/// Append a validated answer set; id and timestamp are assigned here
pub async fn append_response(
    pool: &SqlitePool,
    form_id: &str,
    answers: AnswerMap,
) -> Result<Response> {
    let answers_json = serde_json::to_string(&answers)
        .map_err(|e| Error::Internal(format!("failed to encode answers: {}", e)))?;

    let mut tx = pool.begin().await?;

    let submitted_at: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE forms
        SET response_count = response_count + 1,
            last_response_ms = MAX(?, COALESCE(last_response_ms + 1, 0))
        WHERE id = ?
        RETURNING last_response_ms
        "#,
    )
    .bind(time::now_ms())
    .bind(form_id)
    .fetch_optional(&mut *tx)
    .await?;

    // Dropping the transaction rolls back the (empty) update
    let Some(submitted_at) = submitted_at else {
        return Err(Error::NotFound(format!("form {}", form_id)));
    };

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO responses (id, form_id, submitted_at, answers) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(form_id)
    .bind(submitted_at)
    .bind(&answers_json)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    debug!("Appended response {} to form {} at {}", id, form_id, submitted_at);

    Ok(Response {
        id,
        form_id: form_id.to_string(),
        submitted_at,
        answers,
    })
}

/// Responses with `submittedAt > cursor_ms`, oldest first
///
/// Pass `i64::MIN` for the full log.
pub async fn list_since(pool: &SqlitePool, form_id: &str, cursor_ms: i64) -> Result<Vec<Response>> {
    let rows: Vec<ResponseRow> = sqlx::query_as(
        r#"
        SELECT id, form_id, submitted_at, answers
        FROM responses
        WHERE form_id = ? AND submitted_at > ?
        ORDER BY submitted_at ASC
        "#,
    )
    .bind(form_id)
    .bind(cursor_ms)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(response_from_row).collect()
}

/// Current count and watermark without reading the log
pub async fn count_and_watermark(pool: &SqlitePool, form_id: &str) -> Result<Watermark> {
    let row: Option<(i64, Option<i64>)> =
        sqlx::query_as("SELECT response_count, last_response_ms FROM forms WHERE id = ?")
            .bind(form_id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((count, last_ms)) => Ok(Watermark { count, last_ms }),
        None => Err(Error::NotFound(format!("form {}", form_id))),
    }
}
