//! External directions provider.
//!
//! Requests are keyed by `start=lat,lon&end=lat,lon`; the response geometry
//! is GeoJSON and therefore ordered `[lon, lat]`.

use anyhow::{Context, Result};
use bytes::Bytes;
use http::Method;
use http::header::ACCEPT;
use http_body_util::Empty;
use platform::{Config, Coordinate, HttpRequest, bad_gateway};
use serde::Deserialize;

use crate::client;

/// Fetches a road-following path between two points, in `(lat, lon)` order.
///
/// # Errors
///
/// Returns an error when the provider is not configured, the request fails,
/// or the response carries no geometry.
pub async fn route<P>(origin: Coordinate, destination: Coordinate, provider: &P) -> Result<Vec<Coordinate>>
where
    P: Config + HttpRequest,
{
    let base = Config::get(provider, "DIRECTIONS_URL").await.context("getting `DIRECTIONS_URL`")?;
    let api_key =
        Config::get(provider, "DIRECTIONS_API_KEY").await.context("getting `DIRECTIONS_API_KEY`")?;

    let url = format!(
        "{base}?api_key={}&start={},{}&end={},{}",
        urlencoding::encode(&api_key),
        origin.latitude,
        origin.longitude,
        destination.latitude,
        destination.longitude
    );

    let request = http::Request::builder()
        .method(Method::GET)
        .uri(&url)
        .header(ACCEPT, "application/json, application/geo+json")
        .body(Empty::<Bytes>::new())
        .context("building directions request")?;

    let response = HttpRequest::fetch(provider, request).await.context("directions request failed")?;
    let body = client::checked(response)?;

    let collection: FeatureCollection =
        serde_json::from_slice(&body).context("deserializing directions response")?;
    decode_path(collection)
}

fn decode_path(collection: FeatureCollection) -> Result<Vec<Coordinate>> {
    let feature = collection
        .features
        .into_iter()
        .next()
        .ok_or_else(|| bad_gateway!("directions response has no features"))?;

    let path = feature.geometry.coordinates.into_iter().map(Coordinate::from_lon_lat).collect::<Vec<_>>();
    if path.len() < 2 {
        return Err(bad_gateway!("directions geometry has {} points", path.len()).into());
    }
    Ok(path)
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<[f64; 2]>,
}
