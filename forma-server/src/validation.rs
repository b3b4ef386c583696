//! Answer validation
//!
//! Decides whether a candidate answer set may enter the response store.
//! Each field is checked independently; when several checks fail for one
//! field the last one wins, so the order of the checks below decides which
//! message the user sees.

use forma_common::model::{AnswerMap, Field, FieldKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Field id → human-readable message; absent key means the field is fine
pub type ErrorMap = BTreeMap<String, String>;

/// Validate `answers` against the form's fields
///
/// Keys in `answers` that name no field are ignored. Pure function.
pub fn validate(fields: &[Field], answers: &AnswerMap) -> ErrorMap {
    let mut errors = ErrorMap::new();

    for field in fields {
        let value = answers.get(&field.id).filter(|v| !v.is_null());
        if let Some(message) = check_field(field, value) {
            errors.insert(field.id.clone(), message);
        }
    }

    errors
}

fn check_field(field: &Field, value: Option<&Value>) -> Option<String> {
    let mut error = None;

    match &field.kind {
        FieldKind::Text {
            min_length,
            max_length,
            ..
        } => {
            let text = value.and_then(answer_text);
            if field.required && text.as_deref().map_or(true, |s| s.trim().is_empty()) {
                error = Some("Required".to_string());
            }
            if value.is_some() {
                let len = text.as_deref().map_or(0, |s| s.chars().count());
                if let Some(min) = min_length.filter(|&n| n > 0) {
                    if len < min as usize {
                        error = Some(format!("Min {} chars", min));
                    }
                }
                if let Some(max) = max_length.filter(|&n| n > 0) {
                    if len > max as usize {
                        error = Some(format!("Max {} chars", max));
                    }
                }
            }
        }

        FieldKind::MultipleChoice { options } => {
            let choice = value.and_then(Value::as_str);
            let blank = match value {
                None => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if field.required && blank {
                error = Some("Required".to_string());
            }
            if !blank && !choice.is_some_and(|c| options.iter().any(|o| o == c)) {
                error = Some("Invalid option".to_string());
            }
        }

        FieldKind::Checkboxes {
            options,
            min_checked,
            max_checked,
        } => {
            let selected = value.and_then(Value::as_array);
            if field.required && selected.map_or(true, |s| s.is_empty()) {
                error = Some("Required".to_string());
            }
            if let Some(value) = value {
                let selected: &[Value] = match value.as_array() {
                    Some(items) => items.as_slice(),
                    None => {
                        error = Some("Invalid option".to_string());
                        &[]
                    }
                };
                // A selection is a set: unknown or repeated entries are invalid
                let mut chosen = HashSet::with_capacity(selected.len());
                let mut invalid = false;
                for item in selected {
                    match item.as_str().filter(|s| options.iter().any(|o| o == s)) {
                        Some(option) if chosen.insert(option) => {}
                        _ => invalid = true,
                    }
                }
                if invalid {
                    error = Some("Invalid option".to_string());
                }

                let count = chosen.len();
                if let Some(min) = min_checked {
                    if count < *min as usize {
                        error = Some(format!("Select at least {}", min));
                    }
                }
                if let Some(max) = max_checked {
                    if count > *max as usize {
                        error = Some(format!("Select at most {}", max));
                    }
                }
            }
        }

        FieldKind::Rating { scale, min } => {
            let rating = value.and_then(Value::as_f64).filter(|n| !n.is_nan());
            if field.required && rating.is_none() {
                error = Some("Required".to_string());
            }
            match rating {
                Some(n) => {
                    if let Some(min) = min {
                        if n < f64::from(*min) {
                            error = Some(format!("Min {}", min));
                        }
                    }
                    if n > f64::from(*scale) {
                        error = Some(format!("Max {}", scale));
                    }
                }
                None if value.is_some() && error.is_none() => {
                    error = Some("Invalid rating".to_string());
                }
                None => {}
            }
        }
    }

    error
}

/// Text content of an answer
///
/// Strings are taken as-is; numbers and booleans by their JSON spelling.
/// Arrays and objects have no text form.
fn answer_text(value: &Value) -> Option<std::borrow::Cow<'_, str>> {
    match value {
        Value::String(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(std::borrow::Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(std::borrow::Cow::Owned(b.to_string())),
        _ => None,
    }
}
