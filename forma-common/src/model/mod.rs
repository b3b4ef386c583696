//! Form, field and response models
//!
//! These are the JSON shapes exchanged with the dashboard and stored in the
//! database. Field kinds form a closed set; the answer validator and the
//! analytics aggregator both match on [`FieldKind`] exhaustively.

mod field;
mod form;
mod response;

pub use field::{Field, FieldKind, FieldType, MAX_RATING_SCALE};
pub use form::{Form, FormDraft};
pub use response::{AnswerMap, Response};
