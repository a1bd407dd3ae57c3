//! # Trip Tracking
//!
//! Advances a trip through its lifecycle while a live position feed drives
//! route recomputation and best-effort backend synchronisation.

mod error;
mod publisher;
mod route;
mod sampler;
mod trip_type;
mod view;

pub mod config;
pub mod context;
pub mod lifecycle;
pub mod provider;
pub mod session;

pub use backend::{Expense, Place, TrailPoint, TransportType, TripRecord, TripStatus};
pub use platform::{Coordinate, Position};

pub use self::config::Config;
pub use self::context::{ContextLoader, TripContext, TripIdentity};
pub use self::error::{Error, Exposure};
pub use self::lifecycle::{Gate, GateCapture, Lifecycle, Transition, TripTrackingState};
pub use self::provider::{Provider, SubFlow};
pub use self::publisher::Publisher;
pub use self::route::{Anchors, Route, RouteOutcome, RoutePlanner};
pub use self::sampler::{Sampler, SamplerGuard};
pub use self::session::Session;
pub use self::trip_type::{SummaryField, TripType};
pub use self::view::{LiveTracking, TrackingView};

/// Result type for tracking operations.
pub type Result<T> = anyhow::Result<T, Error>;
