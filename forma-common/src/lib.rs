//! # Forma Common Library
//!
//! Shared code for the Forma services including:
//! - Form, field and response models
//! - Field schema checks applied when a form is saved
//! - Configuration loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use model::{AnswerMap, Field, FieldKind, FieldType, Form, FormDraft, Response};
