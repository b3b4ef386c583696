//! Live form analytics
//!
//! [`aggregate`] computes a snapshot from a form and its full response log.
//! [`Aggregator`] is the same computation split into absorb/render steps so
//! that [`cache::SnapshotCache`] can fold in only the responses appended
//! since the last read. Both paths render from the same integer counters and
//! produce identical output for the same response set.

pub mod cache;
mod tally;

pub use cache::SnapshotCache;
pub use tally::{display_scale, rating_level, text_bin, OTHER_LABEL, TEXT_LENGTH_BINS};

use forma_common::model::{FieldType, Form, Response};
use serde::{Deserialize, Serialize};
use tally::FieldTally;

/// One bar of a field's chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub value: u64,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Statistics for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalytics {
    pub field_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub summary: String,
    pub bars: Vec<Bar>,
    /// Checkboxes: mean selections per response. Rating: mean level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    /// Rating only: the display scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Responses carrying a non-null value for this field
    pub response_n: u64,
}

/// Snapshot of a form's analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAnalytics {
    pub form_id: String,
    pub response_count: u64,
    /// Watermark: latest `submittedAt`, `None` before the first response
    pub last_response_ms: Option<i64>,
    pub per_field: Vec<FieldAnalytics>,
}

/// Incremental accumulator for one form schema
#[derive(Debug, Clone)]
pub struct Aggregator {
    form_id: String,
    tallies: Vec<FieldTally>,
    response_count: u64,
    last_response_ms: Option<i64>,
}

impl Aggregator {
    pub fn new(form: &Form) -> Self {
        Self {
            form_id: form.id.clone(),
            tallies: form.fields.iter().map(FieldTally::new).collect(),
            response_count: 0,
            last_response_ms: None,
        }
    }

    /// Count one response; answers for unknown field ids are ignored
    pub fn absorb(&mut self, response: &Response) {
        for tally in &mut self.tallies {
            if let Some(value) = response.answer(tally.field_id()) {
                tally.absorb(value);
            }
        }
        self.response_count += 1;
        self.last_response_ms = Some(
            self.last_response_ms
                .map_or(response.submitted_at, |last| last.max(response.submitted_at)),
        );
    }

    pub fn absorb_all<'a>(&mut self, responses: impl IntoIterator<Item = &'a Response>) {
        for response in responses {
            self.absorb(response);
        }
    }

    /// Latest `submittedAt` absorbed so far
    pub fn watermark(&self) -> Option<i64> {
        self.last_response_ms
    }

    pub fn snapshot(&self) -> FormAnalytics {
        FormAnalytics {
            form_id: self.form_id.clone(),
            response_count: self.response_count,
            last_response_ms: self.last_response_ms,
            per_field: self.tallies.iter().map(FieldTally::render).collect(),
        }
    }
}

/// Full recomputation over a response log
pub fn aggregate(form: &Form, responses: &[Response]) -> FormAnalytics {
    let mut aggregator = Aggregator::new(form);
    aggregator.absorb_all(responses);
    aggregator.snapshot()
}
