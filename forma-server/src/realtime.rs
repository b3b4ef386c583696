//! Realtime wake-ups for long-poll waiters
//!
//! One `tokio::sync::watch` channel per form carries the latest published
//! watermark. Channels exist only while someone is waiting: the first
//! subscriber creates one, the last [`Subscription`] to drop removes it.
//! Publishing to a form nobody watches is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::trace;

type Channels = HashMap<String, watch::Sender<Option<i64>>>;

/// Per-form watermark broadcast
#[derive(Debug, Default)]
pub struct Hub {
    channels: Mutex<Channels>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `form_id`
    ///
    /// Subscribe before reading the stored watermark; any append committed
    /// after that read is then guaranteed to wake the subscription.
    pub fn subscribe(self: &Arc<Self>, form_id: &str) -> Subscription {
        let mut channels = self.lock();
        let rx = channels
            .entry(form_id.to_string())
            .or_insert_with(|| {
                trace!("Opening wake channel for form {}", form_id);
                watch::channel(None).0
            })
            .subscribe();

        Subscription {
            hub: Arc::clone(self),
            form_id: form_id.to_string(),
            rx: Some(rx),
        }
    }

    /// Announce a committed watermark; lower values never replace higher ones
    pub fn publish(&self, form_id: &str, watermark: i64) {
        let channels = self.lock();
        if let Some(tx) = channels.get(form_id) {
            tx.send_if_modified(|current| {
                if current.map_or(true, |c| watermark > c) {
                    *current = Some(watermark);
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Number of forms with at least one waiter
    pub fn channel_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        // The map holds no invariant a panicking holder could break
        match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A registered waiter for one form
#[derive(Debug)]
pub struct Subscription {
    hub: Arc<Hub>,
    form_id: String,
    rx: Option<watch::Receiver<Option<i64>>>,
}

impl Subscription {
    /// Resolve once a watermark greater than `cursor_ms` is published
    ///
    /// Cancel-safe: dropping the future leaves the subscription usable.
    pub async fn advanced_past(&mut self, cursor_ms: i64) -> Option<i64> {
        let rx = self.rx.as_mut()?;
        let seen = rx
            .wait_for(|wm| wm.is_some_and(|w| w > cursor_ms))
            .await
            .ok()?;
        *seen
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut channels = self.hub.lock();
        // Release the receiver under the lock so a concurrent subscribe
        // cannot observe the channel between the count check and removal
        drop(self.rx.take());
        let idle = channels
            .get(&self.form_id)
            .is_some_and(|tx| tx.receiver_count() == 0);
        if idle {
            channels.remove(&self.form_id);
            trace!("Closed wake channel for form {}", self.form_id);
        }
    }
}
