//! Transport-specific behaviour, resolved once when the trip context loads.

use anyhow::Result;
use backend::{Cargo, Place, TransportType, TripRecord, TripStatus, trip};
use platform::{Config, HttpRequest, Identity};

/// Which end of the trip the driver is heading towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Pickup,
    Dropoff,
}

/// Route destination for each status, indexed by [`TripStatus::index`].
const DESTINATION: [Leg; 8] = [
    Leg::Pickup,  // IN_PROGRESS
    Leg::Pickup,  // GOING_TO_PICKUP
    Leg::Dropoff, // PICKED_UP
    Leg::Dropoff, // IN_TRANSIT
    Leg::Dropoff, // ARRIVED_DESTINATION
    Leg::Dropoff, // DELIVERED
    Leg::Dropoff, // TOLL_BILL_PENDING
    Leg::Dropoff, // COMPLETED
];

/// Capability set for one kind of trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripType {
    Ground,
    Air,
    Maritime,
}

/// A label/value pair for the trip summary card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryField {
    pub label: &'static str,
    pub value: String,
}

impl SummaryField {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self { label, value: value.into() }
    }
}

impl From<TransportType> for TripType {
    fn from(transport: TransportType) -> Self {
        match transport {
            TransportType::Ground => Self::Ground,
            TransportType::Air => Self::Air,
            TransportType::Maritime => Self::Maritime,
        }
    }
}

impl TripType {
    /// Fetch the detail record from the endpoint serving this kind of trip.
    pub(crate) async fn load_detail<P>(self, id: &str, provider: &P) -> Result<TripRecord>
    where
        P: Config + HttpRequest + Identity,
    {
        match self {
            Self::Ground => trip::delivery_booking(id, provider).await,
            Self::Air | Self::Maritime => trip::booking_detail(id, provider).await,
        }
    }

    /// Where the live route should lead for the given status.
    ///
    /// Before the status is known the driver is assumed to be heading to
    /// pickup.
    #[must_use]
    pub fn destination_anchor<'a>(self, status: Option<TripStatus>, pickup: &'a Place, dropoff: &'a Place) -> &'a Place {
        let leg = status.map_or(Leg::Pickup, |status| DESTINATION[status.index()]);
        match leg {
            Leg::Pickup => pickup,
            Leg::Dropoff => dropoff,
        }
    }

    /// Whether the backend records an order trail for this kind of trip.
    #[must_use]
    pub const fn has_trail(self) -> bool {
        matches!(self, Self::Air | Self::Maritime)
    }

    #[must_use]
    pub fn summary_fields(self, record: &TripRecord) -> Vec<SummaryField> {
        let mut fields = vec![
            SummaryField::new("Booking", record.booking_id.as_str()),
            SummaryField::new("From", record.pickup.address.as_str()),
            SummaryField::new("To", record.dropoff.address.as_str()),
        ];

        match (&record.cargo, self) {
            (Cargo::Packages(packages), _) => {
                let count: u32 = packages.iter().map(|package| package.quantity.max(1)).sum();
                fields.push(SummaryField::new("Packages", count.to_string()));

                let weight: f64 = packages
                    .iter()
                    .filter_map(|package| package.weight_kg.map(|w| w * f64::from(package.quantity.max(1))))
                    .sum();
                if weight > 0.0 {
                    fields.push(SummaryField::new("Weight", format!("{weight:.1} kg")));
                }
            }
            (Cargo::Parcel(parcel), kind) => {
                if !parcel.description.is_empty() {
                    fields.push(SummaryField::new("Parcel", parcel.description.as_str()));
                }
                if let Some(weight) = parcel.weight_kg {
                    fields.push(SummaryField::new("Weight", format!("{weight:.1} kg")));
                }
                let (carrier_label, reference_label) = match kind {
                    Self::Maritime => ("Shipping line", "Voyage"),
                    Self::Air | Self::Ground => ("Airline", "Flight"),
                };
                if let Some(carrier) = &parcel.carrier {
                    fields.push(SummaryField::new(carrier_label, carrier.as_str()));
                }
                if let Some(reference) = &parcel.reference {
                    fields.push(SummaryField::new(reference_label, reference.as_str()));
                }
            }
        }

        fields
    }
}
