//! # Triptrack
//!
//! Host bindings for the trip tracking crates: a `reqwest`-backed provider,
//! tracing initialisation and a single entry point for the tracking screen.

mod provider;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracking::{Config, Session, SubFlow, TripIdentity};

pub use self::provider::HostProvider;

/// Install the process-wide subscriber.
///
/// Filtering follows `RUST_LOG`, falling back to `info`.
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

/// Open a tracking session for `identity` using environment configuration.
///
/// # Errors
///
/// Returns [`tracking::Error::LoadFailed`] when the trip cannot be loaded.
pub async fn start<G, S>(
    identity: TripIdentity, provider: HostProvider<G>, sub_flow: S,
) -> tracking::Result<Session<HostProvider<G>, S>>
where
    G: platform::Geolocation + 'static,
    S: SubFlow + 'static,
{
    let config = Config::from_env();
    tracing::info!(trip = %identity.id, transport = ?identity.transport_type, "opening tracking session");

    Session::open(identity, Arc::new(provider), Arc::new(sub_flow), &config).await
}
