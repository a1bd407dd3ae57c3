//! # Trip Context
//!
//! Resolves which trip a session concerns and loads its detail record.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use backend::{TrailPoint, TransportType, TripRecord, location};
use tracing::{info, warn};

use crate::provider::{Provider, within};
use crate::trip_type::TripType;
use crate::{Error, Result};

/// The `(id, transport type)` pair a session is opened for.
///
/// For ground trips the id is the delivery booking id; for air and maritime
/// trips it is the booking id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripIdentity {
    pub id: String,
    pub transport_type: TransportType,
}

impl TripIdentity {
    pub fn new(id: impl Into<String>, transport_type: TransportType) -> Self {
        Self { id: id.into(), transport_type }
    }
}

/// A loaded trip and everything derived from its transport type.
#[derive(Debug, Clone)]
pub struct TripContext {
    pub identity: TripIdentity,
    pub trip_type: TripType,
    pub record: TripRecord,

    /// Recorded order positions, oldest first. Empty for ground trips.
    pub trail: Vec<TrailPoint>,
}

pub struct ContextLoader<P> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P: Provider> ContextLoader<P> {
    pub const fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Fetch the trip record for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoadFailed`] when the detail record cannot be
    /// fetched. A missing order trail is not an error.
    pub async fn load(&self, identity: &TripIdentity) -> Result<TripContext> {
        let trip_type = TripType::from(identity.transport_type);

        let record = within(self.timeout, trip_type.load_detail(&identity.id, self.provider.as_ref()))
            .await
            .with_context(|| format!("loading {} trip {}", identity.transport_type, identity.id))
            .map_err(|e| {
                warn!(monotonic_counter.load_failed = 1, id = %identity.id, error = %e, "trip load failed");
                Error::load_failed(&e)
            })?;

        let trail = if trip_type.has_trail() { self.trail(&record).await } else { Vec::new() };

        info!(
            trip_id = %record.trip_id,
            transport = %identity.transport_type,
            status = record.status.map_or("unset", |status| status.as_str()),
            trail = trail.len(),
            "trip context loaded"
        );

        Ok(TripContext { identity: identity.clone(), trip_type, record, trail })
    }

    /// Reload an already open context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoadFailed`] when the record cannot be fetched.
    pub async fn refresh(&self, context: &TripContext) -> Result<TripContext> {
        self.load(&context.identity).await
    }

    async fn trail(&self, record: &TripRecord) -> Vec<TrailPoint> {
        match within(self.timeout, location::order_locations(&record.booking_id, self.provider.as_ref())).await
        {
            Ok(trail) => trail,
            Err(e) => {
                warn!(booking_id = %record.booking_id, error = %e, "order trail unavailable");
                Vec::new()
            }
        }
    }
}
