//! Form persistence
//!
//! Fields are stored as a JSON column; the schema is only ever read and
//! written as a whole.

use forma_common::model::{Form, FormDraft};
use forma_common::{time, Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

type FormRow = (String, String, String, i64, i64, i64, Option<i64>);

const SELECT_FORM: &str = r#"
    SELECT id, title, fields, created_at, updated_at, response_count, last_response_ms
    FROM forms WHERE id = ?
"#;

fn form_from_row(row: FormRow) -> Result<Form> {
    let (id, title, fields_json, created_at, updated_at, response_count, last_response_ms) = row;
    let fields = serde_json::from_str(&fields_json)
        .map_err(|e| Error::Internal(format!("corrupt field schema for form {}: {}", id, e)))?;

    Ok(Form {
        id,
        title,
        fields,
        created_at,
        updated_at,
        response_count,
        last_response_ms,
    })
}

fn fields_json(draft: &FormDraft) -> Result<String> {
    serde_json::to_string(&draft.fields)
        .map_err(|e| Error::Internal(format!("failed to encode fields: {}", e)))
}

/// Store a new form; the draft must already have passed `FormDraft::check`
pub async fn insert_form(pool: &SqlitePool, draft: &FormDraft) -> Result<Form> {
    let id = Uuid::new_v4().to_string();
    let now = time::now_ms();

    sqlx::query(
        r#"
        INSERT INTO forms (id, title, fields, created_at, updated_at, response_count)
        VALUES (?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&id)
    .bind(&draft.title)
    .bind(fields_json(draft)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Form {
        id,
        title: draft.title.clone(),
        fields: draft.fields.clone(),
        created_at: now,
        updated_at: now,
        response_count: 0,
        last_response_ms: None,
    })
}

/// Load a form by id
pub async fn get_form(pool: &SqlitePool, id: &str) -> Result<Form> {
    let row: Option<FormRow> = sqlx::query_as(SELECT_FORM)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => form_from_row(row),
        None => Err(Error::NotFound(format!("form {}", id))),
    }
}

/// Replace title and fields of an existing form
///
/// `updated_at` strictly increases on every update so that cached analytics
/// keyed by it are invalidated even for two updates within one millisecond.
pub async fn update_form(pool: &SqlitePool, id: &str, draft: &FormDraft) -> Result<Form> {
    let result = sqlx::query(
        r#"
        UPDATE forms
        SET title = ?, fields = ?, updated_at = MAX(?, updated_at + 1)
        WHERE id = ?
        "#,
    )
    .bind(&draft.title)
    .bind(fields_json(draft)?)
    .bind(time::now_ms())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("form {}", id)));
    }

    get_form(pool, id).await
}
