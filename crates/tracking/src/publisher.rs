//! # Position Sync Publisher
//!
//! Best-effort forwarding of live positions to the backend. Each trip has at
//! most one publish in flight and one pending sample; a newer sample replaces
//! the pending one. Failures are logged and never retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use backend::{LocationUpdate, location};
use dashmap::DashMap;
use platform::Position;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{Provider, within};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Slot {
    in_flight: bool,
    pending: Option<Position>,
    last_sent: Option<Instant>,
}

pub struct Publisher<P> {
    provider: Arc<P>,
    slots: Arc<DashMap<String, Slot>>,
    token: CancellationToken,
    interval: Duration,
    timeout: Duration,
}

impl<P> Clone for Publisher<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            slots: Arc::clone(&self.slots),
            token: self.token.clone(),
            interval: self.interval,
            timeout: self.timeout,
        }
    }
}

impl<P: Provider + 'static> Publisher<P> {
    /// Create a publisher whose in-flight work ends when `parent` is
    /// cancelled.
    pub fn new(provider: Arc<P>, parent: &CancellationToken, interval: Duration, timeout: Duration) -> Self {
        Self { provider, slots: Arc::new(DashMap::new()), token: parent.child_token(), interval, timeout }
    }

    /// Queue `position` for upload and return immediately.
    pub fn publish(&self, trip_id: &str, position: Position) {
        if self.token.is_cancelled() {
            return;
        }

        let mut slot = self.slots.entry(trip_id.to_string()).or_default();
        if slot.pending.replace(position).is_some() {
            debug!(monotonic_counter.publish_merged = 1, trip_id = %trip_id, "pending sample replaced");
        }
        if slot.in_flight {
            return;
        }
        slot.in_flight = true;
        drop(slot);

        let publisher = self.clone();
        let trip_id = trip_id.to_string();
        tokio::spawn(async move { publisher.drain(trip_id).await });
    }

    /// Stop publishing; in-flight requests are abandoned.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    async fn drain(self, trip_id: String) {
        loop {
            let wait = self
                .slots
                .get(&trip_id)
                .and_then(|slot| slot.last_sent)
                .map_or(Duration::ZERO, |sent| self.interval.saturating_sub(sent.elapsed()));

            if !wait.is_zero() {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }
            }

            let position = {
                let Some(mut slot) = self.slots.get_mut(&trip_id) else {
                    return;
                };
                let Some(position) = slot.pending.take() else {
                    slot.in_flight = false;
                    return;
                };
                slot.last_sent = Some(Instant::now());
                position
            };

            tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                sent = self.send(&trip_id, &position) => {
                    if let Err(e) = sent {
                        warn!(monotonic_counter.publish_failed = 1, trip_id = %trip_id, error = %e, "location publish failed");
                    } else {
                        debug!(monotonic_counter.publish_sent = 1, trip_id = %trip_id, "location published");
                    }
                }
            }
        }

        if let Some(mut slot) = self.slots.get_mut(&trip_id) {
            slot.in_flight = false;
            slot.pending = None;
        }
        debug!(trip_id = %trip_id, "publisher cancelled");
    }

    async fn send(&self, trip_id: &str, position: &Position) -> Result<()> {
        let update = LocationUpdate::from(position);
        within(self.timeout, location::publish_location(trip_id, &update, self.provider.as_ref()))
            .await
            .context("publishing location")
            .map_err(|e| Error::publish_failed(&e))
    }
}
