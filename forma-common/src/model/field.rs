//! Field schema
//!
//! One question of a form. The kind-specific constraints live in
//! [`FieldKind`], serialized with a `type` tag next to the common
//! `id`/`label`/`required` keys:
//!
//! ```json
//! {"id": "q1", "label": "Rate us", "required": true, "type": "rating", "scale": 5}
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest rating scale accepted when a form is saved
pub const MAX_RATING_SCALE: u32 = 10;

fn default_scale() -> u32 {
    5
}

/// One question of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Kind-specific field constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    /// Free text answer
    #[serde(rename_all = "camelCase")]
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },

    /// Exactly one option; the option string is its identity
    #[serde(rename_all = "camelCase")]
    MultipleChoice { options: Vec<String> },

    /// Any subset of the options
    #[serde(rename_all = "camelCase")]
    Checkboxes {
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_checked: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_checked: Option<u32>,
    },

    /// Integer rating on `1..=scale`
    #[serde(rename_all = "camelCase")]
    Rating {
        #[serde(default = "default_scale")]
        scale: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
    },
}

/// Field kind without its payload, as echoed in analytics output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    MultipleChoice,
    Checkboxes,
    Rating,
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Text { .. } => FieldType::Text,
            FieldKind::MultipleChoice { .. } => FieldType::MultipleChoice,
            FieldKind::Checkboxes { .. } => FieldType::Checkboxes,
            FieldKind::Rating { .. } => FieldType::Rating,
        }
    }
}

impl Field {
    /// Check the schema constraints that the type system does not carry.
    ///
    /// Run when a form is created or updated; answers are never checked
    /// against a field that failed here.
    pub fn check(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("field id must not be empty".into()));
        }
        if self.label.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "field '{}' must have a label",
                self.id
            )));
        }

        match &self.kind {
            FieldKind::Text {
                min_length,
                max_length,
                ..
            } => {
                if let (Some(lo), Some(hi)) = (min_length, max_length) {
                    if lo > hi {
                        return Err(self.invalid("minLength cannot exceed maxLength"));
                    }
                }
            }
            FieldKind::MultipleChoice { options } => self.check_options(options)?,
            FieldKind::Checkboxes {
                options,
                min_checked,
                max_checked,
            } => {
                self.check_options(options)?;
                if let (Some(lo), Some(hi)) = (min_checked, max_checked) {
                    if lo > hi {
                        return Err(self.invalid("minChecked cannot exceed maxChecked"));
                    }
                }
            }
            FieldKind::Rating { scale, min } => {
                if *scale < 1 || *scale > MAX_RATING_SCALE {
                    return Err(self.invalid(&format!(
                        "rating scale must be 1..{}",
                        MAX_RATING_SCALE
                    )));
                }
                if let Some(min) = min {
                    if min > scale {
                        return Err(self.invalid("rating min cannot exceed scale"));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_options(&self, options: &[String]) -> Result<()> {
        if options.is_empty() {
            return Err(self.invalid("options required"));
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in options {
            if option.trim().is_empty() {
                return Err(self.invalid("options must not be blank"));
            }
            if !seen.insert(option.as_str()) {
                return Err(self.invalid(&format!("duplicate option '{}'", option)));
            }
        }
        Ok(())
    }

    fn invalid(&self, msg: &str) -> Error {
        Error::InvalidInput(format!("field '{}': {}", self.id, msg))
    }
}
