//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use std::any::Any;
use std::error::Error;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use futures::stream::BoxStream;
use http::{Request, Response};
use http_body::Body;

use crate::geo::Position;

/// The `HttpRequest` trait defines the behavior for fetching data from a source.
pub trait HttpRequest: Send + Sync {
    /// Make outbound HTTP request.
    fn fetch<T>(&self, request: Request<T>) -> impl Future<Output = Result<Response<Bytes>>> + Send
    where
        T: Body + Any + Send,
        T::Data: Into<Vec<u8>> + Send,
        T::Error: Into<Box<dyn Error + Send + Sync + 'static>>;
}

/// The `Config` trait is used by implementers to provide configuration from
/// the host to dependent crates.
pub trait Config: Send + Sync {
    /// Request configuration setting.
    fn get(&self, key: &str) -> impl Future<Output = Result<String>> + Send;
}

pub trait Identity: Send + Sync {
    /// Bearer token for the signed-in driver.
    fn access_token(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Foreground location permission as granted by the device owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Thresholds handed to the device when opening a continuous watch.
///
/// A new sample is due once *either* threshold is satisfied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Minimum time between two samples.
    pub min_interval: Duration,

    /// Minimum distance, in metres, between two samples.
    pub min_distance_m: f64,
}

/// The `Geolocation` trait wraps the device location sensor.
///
/// Dropping the stream returned by [`Geolocation::watch_position`] must
/// release the underlying sensor subscription.
pub trait Geolocation: Send + Sync {
    /// Ask the device owner for foreground location access.
    fn request_permission(&self) -> impl Future<Output = Result<Permission>> + Send;

    /// Take a single fix.
    fn current_position(&self) -> impl Future<Output = Result<Position>> + Send;

    /// Open a continuous watch.
    fn watch_position(
        &self, options: WatchOptions,
    ) -> impl Future<Output = Result<BoxStream<'static, Position>>> + Send;
}
