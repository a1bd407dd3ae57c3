//! Trip records and the booking endpoints that load them.

use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::{Context, Result};
use platform::{Config, Coordinate, HttpRequest, Identity};
use serde::{Deserialize, Deserializer, Serialize};

use crate::client;

/// Retrieves an Air or Maritime booking by booking id.
///
/// # Errors
///
/// Returns an error when the booking API request fails or the response cannot
/// be deserialized. A missing booking surfaces as [`platform::Error::NotFound`].
pub async fn booking_detail<P>(booking_id: &str, provider: &P) -> Result<TripRecord>
where
    P: Config + HttpRequest + Identity,
{
    let path = format!("/bookings/{}", urlencoding::encode(booking_id));
    let detail: BookingDetail = client::get(&path, provider)
        .await
        .with_context(|| format!("fetching booking detail {booking_id}"))?;
    Ok(detail.into())
}

/// Retrieves a Ground delivery booking by id.
///
/// # Errors
///
/// Returns an error when the delivery API request fails or the response
/// cannot be deserialized.
pub async fn delivery_booking<P>(booking_id: &str, provider: &P) -> Result<TripRecord>
where
    P: Config + HttpRequest + Identity,
{
    let path = format!("/delivery-bookings/{}", urlencoding::encode(booking_id));
    let booking: DeliveryBooking = client::get(&path, provider)
        .await
        .with_context(|| format!("fetching delivery booking {booking_id}"))?;
    Ok(booking.into())
}

/// Trip status in its fixed lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    InProgress,
    GoingToPickup,
    PickedUp,
    InTransit,
    ArrivedDestination,
    Delivered,
    TollBillPending,
    Completed,
}

impl TripStatus {
    /// Every status, in lifecycle order.
    pub const SEQUENCE: [Self; 8] = [
        Self::InProgress,
        Self::GoingToPickup,
        Self::PickedUp,
        Self::InTransit,
        Self::ArrivedDestination,
        Self::Delivered,
        Self::TollBillPending,
        Self::Completed,
    ];

    /// Position in [`TripStatus::SEQUENCE`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::SEQUENCE.get(index).copied()
    }

    /// The only status that may follow this one.
    #[must_use]
    pub fn successor(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::GoingToPickup => "GOING_TO_PICKUP",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::ArrivedDestination => "ARRIVED_DESTINATION",
            Self::Delivered => "DELIVERED",
            Self::TollBillPending => "TOLL_BILL_PENDING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown trip status: {s}"))
    }
}

// Statuses outside the lifecycle (e.g. `CANCELLED`) load as unset.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<TripStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::warn!(status = %value, "{e}");
            None
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Ground,
    Air,
    Maritime,
}

impl Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ground => "Ground",
            Self::Air => "Air",
            Self::Maritime => "Maritime",
        };
        f.write_str(name)
    }
}

impl FromStr for TransportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ground" => Ok(Self::Ground),
            "air" => Ok(Self::Air),
            "maritime" | "sea" => Ok(Self::Maritime),
            _ => Err(format!("unknown transport type: {s}")),
        }
    }
}

/// Aggregate for one in-progress trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub trip_id: String,
    pub booking_id: String,
    pub transport_type: TransportType,

    /// `None` until a lifecycle status is known.
    pub status: Option<TripStatus>,
    pub pickup: Place,
    pub dropoff: Place,
    pub cargo: Cargo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub address: String,
    pub coordinates: Coordinate,
}

/// Transport-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Cargo {
    Packages(Vec<Package>),
    Parcel(Parcel),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Package {
    pub description: String,
    pub quantity: u32,
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parcel {
    pub description: String,
    pub weight_kg: Option<f64>,

    /// Airline or shipping line.
    pub carrier: Option<String>,

    /// Flight number or voyage reference.
    pub reference: Option<String>,
}

// --- wire types ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoPoint {
    /// GeoJSON order: `[lon, lat]`.
    coordinates: [f64; 2],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLocation {
    #[serde(default)]
    address: String,
    coords: GeoPoint,
}

impl From<WireLocation> for Place {
    fn from(location: WireLocation) -> Self {
        Self {
            address: location.address,
            coordinates: Coordinate::from_lon_lat(location.coords.coordinates),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryBooking {
    #[serde(rename = "_id")]
    id: String,
    trip_id: String,
    #[serde(default, deserialize_with = "lenient_status")]
    status: Option<TripStatus>,
    pickup_location: WireLocation,
    dropoff_location: WireLocation,
    #[serde(default)]
    packages: Vec<Package>,
}

impl From<DeliveryBooking> for TripRecord {
    fn from(booking: DeliveryBooking) -> Self {
        Self {
            trip_id: booking.trip_id,
            booking_id: booking.id,
            transport_type: TransportType::Ground,
            status: booking.status,
            pickup: booking.pickup_location.into(),
            dropoff: booking.dropoff_location.into(),
            cargo: Cargo::Packages(booking.packages),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingDetail {
    #[serde(rename = "_id")]
    id: String,
    trip_id: String,
    #[serde(rename = "type")]
    transport_type: TransportType,
    #[serde(default, deserialize_with = "lenient_status")]
    status: Option<TripStatus>,
    origin: WireLocation,
    destination: WireLocation,
    #[serde(default)]
    parcel: Parcel,
}

impl From<BookingDetail> for TripRecord {
    fn from(detail: BookingDetail) -> Self {
        Self {
            trip_id: detail.trip_id,
            booking_id: detail.id,
            transport_type: detail.transport_type,
            status: detail.status,
            pickup: detail.origin.into(),
            dropoff: detail.destination.into(),
            cargo: Cargo::Parcel(detail.parcel),
        }
    }
}
