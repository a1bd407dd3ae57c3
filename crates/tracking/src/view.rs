//! Read-only projection of a tracking session for the presentation layer.

use backend::{Place, TrailPoint, TripStatus};
use platform::Position;

use crate::error::Error;
use crate::route::Route;
use crate::trip_type::{SummaryField, TripType};

/// State of the live position feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveTracking {
    /// Waiting for permission or the first fix.
    Pending,
    Active,

    /// Permission refused; only static markers are shown.
    Denied,

    /// The sensor failed or was released.
    Unavailable,
}

/// Snapshot rendered by the trip tracking screen.
#[derive(Debug, Clone)]
pub struct TrackingView {
    pub trip_id: String,
    pub booking_id: String,
    pub trip_type: TripType,
    pub status: Option<TripStatus>,

    /// Position of `status` in the lifecycle, `-1` when unset.
    pub status_index: i32,
    pub next_status: Option<TripStatus>,
    pub advancing: bool,

    pub pickup: Place,
    pub dropoff: Place,
    pub summary: Vec<SummaryField>,
    pub trail: Vec<TrailPoint>,

    pub position: Option<Position>,
    pub route: Option<Route>,
    pub live_tracking: LiveTracking,

    /// Non-blocking notice, e.g. for a refused location permission.
    pub notice: Option<Error>,
}
