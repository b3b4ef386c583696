//! Form documents

use super::Field;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A stored form
///
/// `response_count` and `last_response_ms` are maintained by the response
/// store in the same transaction as each append, so they always agree with
/// the stored response log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: String,
    pub title: String,
    pub fields: Vec<Field>,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds; bumped on every schema change
    pub updated_at: i64,
    pub response_count: i64,
    pub last_response_ms: Option<i64>,
}

/// Title and fields as submitted by the builder for create/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    pub title: String,
    pub fields: Vec<Field>,
}

impl FormDraft {
    /// Check the draft before it is stored
    pub fn check(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("title required".into()));
        }
        if self.fields.is_empty() {
            return Err(Error::InvalidInput("fields required".into()));
        }

        let mut ids = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            field.check()?;
            if !ids.insert(field.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate field id '{}'",
                    field.id
                )));
            }
        }
        Ok(())
    }
}
