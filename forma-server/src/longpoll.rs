//! Long-poll delivery of analytics snapshots
//!
//! A poll carries the client's cursor (`sinceMs`, the last watermark it has
//! seen). If the form already has newer responses the snapshot is returned
//! at once; otherwise the request parks on the realtime hub until a newer
//! watermark is published or the hold time runs out.
//!
//! The subscription is taken before the stored watermark is read. An append
//! that commits after the read therefore always publishes into a channel
//! this poll is already listening on.

use crate::analytics::FormAnalytics;
use crate::db;
use crate::error::ApiResult;
use crate::AppState;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body returned when the hold time elapses without new responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSentinel {
    pub timeout: bool,
    pub last_response_ms: Option<i64>,
}

/// Outcome of one long-poll request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LongPollReply {
    Timeout(TimeoutSentinel),
    Snapshot(FormAnalytics),
}

impl LongPollReply {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LongPollReply::Timeout(_))
    }
}

/// Wait for analytics newer than `since_ms`
///
/// Unknown forms fail with not-found before any waiting. Dropping the
/// returned future releases the hub subscription.
pub async fn poll(state: &AppState, form_id: &str, since_ms: i64) -> ApiResult<LongPollReply> {
    let mut subscription = state.hub.subscribe(form_id);

    let mark = db::count_and_watermark(&state.db, form_id).await?;
    if mark.is_newer_than(since_ms) {
        debug!(
            "Long-poll for form {} answered immediately ({:?} > {})",
            form_id, mark.last_ms, since_ms
        );
        return snapshot(state, form_id).await.map(LongPollReply::Snapshot);
    }

    match tokio::time::timeout(state.longpoll_timeout, subscription.advanced_past(since_ms)).await
    {
        Ok(Some(watermark)) => {
            debug!("Long-poll for form {} woke at {}", form_id, watermark);
            drop(subscription);
            snapshot(state, form_id).await.map(LongPollReply::Snapshot)
        }
        Ok(None) | Err(_) => {
            debug!("Long-poll for form {} timed out", form_id);
            Ok(LongPollReply::Timeout(TimeoutSentinel {
                timeout: true,
                last_response_ms: mark.last_ms,
            }))
        }
    }
}

/// Current analytics for a form through the snapshot cache
pub async fn snapshot(state: &AppState, form_id: &str) -> ApiResult<FormAnalytics> {
    let form = db::get_form(&state.db, form_id).await?;
    Ok(state.cache.snapshot(&state.db, &form).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forma_common::model::{AnswerMap, Field, FieldKind, FormDraft};
    use serde_json::json;
    use std::time::Duration;

    async fn state_with_form(timeout: Duration) -> (AppState, String) {
        let pool = db::init_memory_database().await.unwrap();
        let form = db::insert_form(
            &pool,
            &FormDraft {
                title: "Rate".into(),
                fields: vec![Field {
                    id: "stars".into(),
                    label: "Stars".into(),
                    required: true,
                    kind: FieldKind::Rating { scale: 5, min: None },
                }],
            },
        )
        .await
        .unwrap();
        (AppState::new(pool, timeout), form.id)
    }

    fn stars(n: u32) -> AnswerMap {
        let mut map = AnswerMap::new();
        map.insert("stars".into(), json!(n));
        map
    }

    #[tokio::test]
    async fn test_immediate_when_behind() {
        let (state, form_id) = state_with_form(Duration::from_secs(5)).await;
        let stored = db::append_response(&state.db, &form_id, stars(4)).await.unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(1), poll(&state, &form_id, 0))
            .await
            .expect("poll should not wait")
            .unwrap();

        match reply {
            LongPollReply::Snapshot(snap) => {
                assert_eq!(snap.response_count, 1);
                assert_eq!(snap.last_response_ms, Some(stored.submitted_at));
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        assert_eq!(state.hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_sentinel() {
        let (state, form_id) = state_with_form(Duration::from_millis(100)).await;
        let stored = db::append_response(&state.db, &form_id, stars(2)).await.unwrap();

        let reply = poll(&state, &form_id, stored.submitted_at).await.unwrap();
        assert_eq!(
            reply,
            LongPollReply::Timeout(TimeoutSentinel {
                timeout: true,
                last_response_ms: Some(stored.submitted_at),
            })
        );
        assert_eq!(state.hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_wakes_on_publish() {
        let (state, form_id) = state_with_form(Duration::from_secs(5)).await;

        let writer = state.clone();
        let writer_form = form_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let r = db::append_response(&writer.db, &writer_form, stars(5)).await.unwrap();
            writer.hub.publish(&writer_form, r.submitted_at);
        });

        let reply = tokio::time::timeout(Duration::from_secs(2), poll(&state, &form_id, 0))
            .await
            .expect("poll should wake before its own timeout")
            .unwrap();
        assert!(!reply.is_timeout());
    }

    #[tokio::test]
    async fn test_unknown_form() {
        let (state, _) = state_with_form(Duration::from_secs(5)).await;
        let err = poll(&state, "missing", 0).await.unwrap_err();
        assert!(matches!(err, crate::error::ApiError::NotFound(_)));
        assert_eq!(state.hub.channel_count(), 0);
    }

    #[test]
    fn test_reply_json_shapes() {
        let sentinel = LongPollReply::Timeout(TimeoutSentinel {
            timeout: true,
            last_response_ms: None,
        });
        assert_eq!(
            serde_json::to_value(&sentinel).unwrap(),
            json!({"timeout": true, "lastResponseMs": null})
        );

        let parsed: LongPollReply = serde_json::from_value(json!({
            "formId": "f1",
            "responseCount": 0,
            "lastResponseMs": null,
            "perField": []
        }))
        .unwrap();
        assert!(!parsed.is_timeout());
    }
}
