//! Submitted responses

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field id → answer value
///
/// The value shape depends on the referenced field's kind: a string for
/// text and multiple choice, an array of strings for checkboxes, a number
/// for rating. Values are kept as raw JSON so that the validator can report
/// malformed input and the aggregator can bucket it instead of rejecting the
/// whole response.
pub type AnswerMap = BTreeMap<String, serde_json::Value>;

/// One immutable submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub form_id: String,
    /// Epoch milliseconds, strictly increasing per form
    pub submitted_at: i64,
    pub answers: AnswerMap,
}

impl Response {
    /// Answer for `field_id`, treating JSON `null` as absent
    pub fn answer(&self, field_id: &str) -> Option<&serde_json::Value> {
        self.answers.get(field_id).filter(|v| !v.is_null())
    }
}
