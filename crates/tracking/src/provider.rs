//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use std::time::Duration;

use anyhow::anyhow;
use backend::TripRecord;
pub use platform::{Geolocation, HttpRequest, Identity, Permission, WatchOptions};

use crate::lifecycle::{Gate, GateCapture};

/// Provider entry point implemented by the host application.
pub trait Provider: HttpRequest + platform::Config + Identity + Geolocation {}

/// The presentation-side flows that unlock gated transitions.
pub trait SubFlow: Send + Sync {
    /// Run the capture screen for `gate`, returning `None` when the user
    /// backs out.
    fn capture(
        &self, gate: Gate, trip: &TripRecord,
    ) -> impl Future<Output = Option<GateCapture>> + Send;
}

/// Bound a collaborator call so a hung request cannot stall the session.
pub(crate) async fn within<T>(
    limit: Duration, call: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(elapsed) => Err(anyhow!("{elapsed} after {limit:?}")),
    }
}
