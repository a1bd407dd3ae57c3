//! Live location publishing and the order trail.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use platform::{Config, Coordinate, HttpRequest, Identity, Position, bad_request};
use serde::{Deserialize, Serialize};

use crate::client;

/// Forwards the driver's current position for a trip.
///
/// # Errors
///
/// Returns an error when the publish request fails.
pub async fn publish_location<P>(trip_id: &str, update: &LocationUpdate, provider: &P) -> Result<()>
where
    P: Config + HttpRequest + Identity,
{
    let CurrentLocation { lat, lng, .. } = update.current_location;
    if !lat.is_finite() || !lng.is_finite() {
        return Err(bad_request!("position ({}, {}) is not a valid coordinate", lat, lng).into());
    }

    let path = format!("/trips/{}/location", urlencoding::encode(trip_id));
    client::patch(&path, Some(update), provider)
        .await
        .with_context(|| format!("publishing location for trip {trip_id}"))
}

/// Retrieves the recorded positions of an Air or Maritime order, oldest first.
///
/// # Errors
///
/// Returns an error when the request fails or the response cannot be
/// deserialized.
pub async fn order_locations<P>(booking_id: &str, provider: &P) -> Result<Vec<TrailPoint>>
where
    P: Config + HttpRequest + Identity,
{
    let path = format!("/bookings/{}/order-locations", urlencoding::encode(booking_id));
    let records: Vec<OrderLocation> = client::get(&path, provider)
        .await
        .with_context(|| format!("fetching order locations for {booking_id}"))?;

    let mut trail = records.into_iter().map(TrailPoint::from).collect::<Vec<_>>();
    trail.sort_by_key(|point| point.recorded_at);
    Ok(trail)
}

/// Body of the `publish-location` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub current_location: CurrentLocation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentLocation {
    pub lat: f64,
    pub lng: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<&Position> for LocationUpdate {
    fn from(position: &Position) -> Self {
        Self {
            current_location: CurrentLocation {
                lat: position.latitude,
                lng: position.longitude,
                address: None,
            },
            speed: position.speed,
            heading: position.heading,
        }
    }
}

/// One point of an order's recorded trail.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailPoint {
    pub coordinate: Coordinate,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLocation {
    coords: OrderCoords,
    heading: Option<f64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct OrderCoords {
    /// GeoJSON order: `[lon, lat]`.
    coordinates: [f64; 2],
}

impl From<OrderLocation> for TrailPoint {
    fn from(location: OrderLocation) -> Self {
        Self {
            coordinate: Coordinate::from_lon_lat(location.coords.coordinates),
            heading: location.heading,
            recorded_at: location.created_at,
        }
    }
}
