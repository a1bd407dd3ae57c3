//! # Position Sampler
//!
//! Wraps the device location sensor. A started sampler publishes the latest
//! admitted [`Position`] on a `watch` channel; slow consumers only ever see
//! the most recent value.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use platform::{Geolocation, Permission, Position, WatchOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub struct Sampler<G> {
    geolocation: Arc<G>,
    options: WatchOptions,
}

impl<G: Geolocation> Sampler<G> {
    pub const fn new(geolocation: Arc<G>, options: WatchOptions) -> Self {
        Self { geolocation, options }
    }

    /// Acquire permission, take one fix and open the continuous watch.
    ///
    /// The watch is torn down when the returned guard is stopped or dropped,
    /// or when `parent` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] when the device owner refuses
    /// location access and [`Error::LocationUnavailable`] when the sensor
    /// cannot produce a fix.
    pub async fn start(&self, parent: &CancellationToken) -> Result<SamplerGuard> {
        match self.geolocation.request_permission().await {
            Ok(Permission::Granted) => {}
            Ok(Permission::Denied) => {
                warn!(monotonic_counter.permission_denied = 1, "location permission denied");
                return Err(Error::PermissionDenied("foreground location access was refused".to_string()));
            }
            Err(e) => {
                warn!(error = %e, "location permission request failed");
                return Err(Error::LocationUnavailable(format!("requesting permission: {e}")));
            }
        }

        let first = self
            .geolocation
            .current_position()
            .await
            .map_err(|e| Error::LocationUnavailable(format!("taking first fix: {e}")))?;
        let stream = self
            .geolocation
            .watch_position(self.options)
            .await
            .map_err(|e| Error::LocationUnavailable(format!("opening location watch: {e}")))?;

        let (sender, positions) = watch::channel(first);
        let token = parent.child_token();
        let task = tokio::spawn(watch_loop(stream, sender, self.options, token.clone()));

        info!(
            latitude = first.latitude,
            longitude = first.longitude,
            interval = ?self.options.min_interval,
            distance_m = self.options.min_distance_m,
            "location watch started"
        );

        Ok(SamplerGuard { token, positions, task: Some(task) })
    }
}

/// Scope guard for a running sampler.
///
/// Dropping the guard stops the watch.
pub struct SamplerGuard {
    token: CancellationToken,
    positions: watch::Receiver<Position>,
    task: Option<JoinHandle<()>>,
}

impl SamplerGuard {
    /// A receiver that starts at the latest admitted position.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Position> {
        self.positions.clone()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop sampling. Calling this more than once has no further effect.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!("stopping location watch");
        }
        self.token.cancel();
    }

    /// Stop sampling and wait until the sensor subscription is released.
    pub async fn stopped(&mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "location watch task failed");
        }
    }
}

impl Drop for SamplerGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn watch_loop(
    mut stream: BoxStream<'static, Position>, sender: watch::Sender<Position>, options: WatchOptions,
    token: CancellationToken,
) {
    let mut last = *sender.borrow();

    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break,

            next = stream.next() => {
                let Some(position) = next else {
                    warn!("location watch ended by device");
                    break;
                };
                if admits(&last, &position, &options) {
                    debug!(monotonic_counter.sample_admitted = 1, "sample admitted");
                    sender.send_replace(position);
                    last = position;
                } else {
                    debug!(monotonic_counter.sample_dropped = 1, "sample below thresholds");
                }
            }
        }
    }

    // releases the device subscription
    drop(stream);
    token.cancel();
    info!("location watch closed");
}

/// A sample is due once either the time or the distance threshold is met.
fn admits(last: &Position, next: &Position, options: &WatchOptions) -> bool {
    let elapsed = (next.timestamp - last.timestamp).to_std().unwrap_or_default();
    let moved = last.coordinate().distance_to(&next.coordinate());
    elapsed >= options.min_interval || moved >= options.min_distance_m
}
