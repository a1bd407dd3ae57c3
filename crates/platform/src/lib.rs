//! # Platform Core
//!
//! Host-facing abstractions shared by the trip tracking crates.

mod error;
mod geo;
mod provider;

pub use crate::error::*;
pub use crate::geo::*;
pub use crate::provider::*;
