//! # Trip Backend
//!
//! Wire contracts for the delivery backend and the external directions
//! provider, one `async fn` per consumed operation.

mod client;

pub mod directions;
pub mod location;
pub mod status;
pub mod trip;

pub use self::location::{CurrentLocation, LocationUpdate, TrailPoint};
pub use self::status::{Expense, StatusUpdate};
pub use self::trip::{Cargo, Package, Parcel, Place, TransportType, TripRecord, TripStatus};
