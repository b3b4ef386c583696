//! Per-field accumulators
//!
//! A tally absorbs answers one at a time and renders the field's analytics
//! on demand. Only integer counters are kept; averages are divided at render
//! time, so absorbing the same responses in any grouping produces identical
//! output.

use super::{Bar, FieldAnalytics};
use forma_common::model::{Field, FieldKind, FieldType, MAX_RATING_SCALE};
use serde_json::Value;
use std::collections::HashMap;

const TEXT_BIN_COUNT: usize = 5;

/// Character-length bins for text answers: (label, inclusive upper bound)
pub const TEXT_LENGTH_BINS: [(&str, Option<usize>); TEXT_BIN_COUNT] = [
    ("0–20", Some(20)),
    ("21–50", Some(50)),
    ("51–100", Some(100)),
    ("101–200", Some(200)),
    ("200+", None),
];

/// Label of the bucket collecting multiple-choice answers outside the options
pub const OTHER_LABEL: &str = "Other";

#[derive(Debug, Clone)]
enum Counts {
    Choice {
        counts: Vec<u64>,
        other: u64,
    },
    Checkboxes {
        counts: Vec<u64>,
        selected_total: u64,
    },
    Rating {
        scale: u32,
        buckets: Vec<u64>,
        sum: u64,
        rated: u64,
    },
    Text {
        bins: [u64; TEXT_BIN_COUNT],
    },
}

#[derive(Debug, Clone)]
pub(super) struct FieldTally {
    field_id: String,
    label: String,
    field_type: FieldType,
    options: Vec<String>,
    option_index: HashMap<String, usize>,
    response_n: u64,
    counts: Counts,
}

impl FieldTally {
    pub(super) fn new(field: &Field) -> Self {
        let options: Vec<String> = match &field.kind {
            FieldKind::MultipleChoice { options } | FieldKind::Checkboxes { options, .. } => {
                options.clone()
            }
            FieldKind::Text { .. } | FieldKind::Rating { .. } => Vec::new(),
        };
        let option_index = options
            .iter()
            .enumerate()
            .map(|(i, o)| (o.clone(), i))
            .collect();

        let counts = match &field.kind {
            FieldKind::MultipleChoice { options } => Counts::Choice {
                counts: vec![0; options.len()],
                other: 0,
            },
            FieldKind::Checkboxes { options, .. } => Counts::Checkboxes {
                counts: vec![0; options.len()],
                selected_total: 0,
            },
            FieldKind::Rating { scale, .. } => {
                let scale = display_scale(*scale);
                Counts::Rating {
                    scale,
                    buckets: vec![0; scale as usize],
                    sum: 0,
                    rated: 0,
                }
            }
            FieldKind::Text { .. } => Counts::Text {
                bins: [0; TEXT_BIN_COUNT],
            },
        };

        Self {
            field_id: field.id.clone(),
            label: field.label.clone(),
            field_type: field.kind.field_type(),
            options,
            option_index,
            response_n: 0,
            counts,
        }
    }

    pub(super) fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Count one response's (non-null) answer for this field
    pub(super) fn absorb(&mut self, value: &Value) {
        self.response_n += 1;

        match &mut self.counts {
            Counts::Choice { counts, other } => {
                match value.as_str().and_then(|s| self.option_index.get(s)) {
                    Some(&i) => counts[i] += 1,
                    None => *other += 1,
                }
            }

            Counts::Checkboxes {
                counts,
                selected_total,
            } => {
                // A non-array answer is present but selects nothing. Repeats
                // and undeclared entries are ignored: each option counts once.
                let mut chosen = vec![false; counts.len()];
                for item in value.as_array().into_iter().flatten() {
                    if let Some(&i) = item.as_str().and_then(|s| self.option_index.get(s)) {
                        chosen[i] = true;
                    }
                }
                for (count, hit) in counts.iter_mut().zip(chosen) {
                    if hit {
                        *count += 1;
                        *selected_total += 1;
                    }
                }
            }

            Counts::Rating {
                scale,
                buckets,
                sum,
                rated,
            } => {
                if let Some(level) = rating_level(value, *scale) {
                    buckets[(level - 1) as usize] += 1;
                    *sum += u64::from(level);
                    *rated += 1;
                }
            }

            Counts::Text { bins } => {
                // Non-string answers have no text and land in the first bin
                let len = value.as_str().map_or(0, |s| s.chars().count());
                bins[text_bin(len)] += 1;
            }
        }
    }

    pub(super) fn render(&self) -> FieldAnalytics {
        let n = self.response_n;
        let mut average = None;
        let mut scale_out = None;

        let (bars, summary) = match &self.counts {
            Counts::Choice { counts, other } => {
                let mut bars = self.option_bars(counts);
                if *other > 0 {
                    bars.push(Bar::new(OTHER_LABEL, *other));
                }
                (bars, format!("Multiple choice · {} {}", n, plural(n)))
            }

            Counts::Checkboxes {
                counts,
                selected_total,
            } => {
                let avg = if n > 0 {
                    *selected_total as f64 / n as f64
                } else {
                    0.0
                };
                average = Some(avg);
                (
                    self.option_bars(counts),
                    format!("Checkboxes · avg selected: {:.2}", avg),
                )
            }

            Counts::Rating {
                scale,
                buckets,
                sum,
                rated,
            } => {
                let bars = buckets
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| Bar::new((i + 1).to_string(), c))
                    .collect();
                scale_out = Some(*scale);
                let summary = if *rated > 0 {
                    let avg = *sum as f64 / *rated as f64;
                    average = Some(avg);
                    format!("Rating · avg {:.2} / {}", avg, scale)
                } else {
                    format!("Rating · no ratings / {}", scale)
                };
                (bars, summary)
            }

            Counts::Text { bins } => {
                let bars = TEXT_LENGTH_BINS
                    .iter()
                    .zip(bins.iter())
                    .map(|((label, _), &c)| Bar::new(*label, c))
                    .collect();
                (bars, format!("Text · {} {}", n, plural(n)))
            }
        };

        FieldAnalytics {
            field_id: self.field_id.clone(),
            label: self.label.clone(),
            field_type: self.field_type,
            summary,
            bars,
            average,
            scale: scale_out,
            response_n: n,
        }
    }

    fn option_bars(&self, counts: &[u64]) -> Vec<Bar> {
        self.options
            .iter()
            .zip(counts)
            .map(|(o, &c)| Bar::new(o.as_str(), c))
            .collect()
    }
}

/// Bucket count used for display; the declared scale clamped to `1..=10`
pub fn display_scale(declared: u32) -> u32 {
    declared.clamp(1, MAX_RATING_SCALE)
}

/// Rating level in `1..=scale`, or `None` for non-numeric answers
///
/// Numbers are rounded to the nearest level, then clamped into range;
/// out-of-range ratings are kept, not dropped.
pub fn rating_level(value: &Value, scale: u32) -> Option<u32> {
    let n = value.as_f64().filter(|n| n.is_finite())?;
    Some(n.round().clamp(1.0, f64::from(scale)) as u32)
}

/// Index into `TEXT_LENGTH_BINS` for a text of `len` characters
pub fn text_bin(len: usize) -> usize {
    TEXT_LENGTH_BINS
        .iter()
        .position(|(_, upper)| upper.map_or(true, |hi| len <= hi))
        .unwrap_or(TEXT_BIN_COUNT - 1)
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        "response"
    } else {
        "responses"
    }
}
