//! Host provider backed by `reqwest` and the process environment.

use std::any::Any;
use std::env;
use std::error::Error;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use futures::stream::BoxStream;
use http::{Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use platform::{Geolocation, HttpRequest, Identity, Permission, Position, WatchOptions};

/// Concrete [`tracking::Provider`] for a signed-in driver.
///
/// HTTP goes out through a shared `reqwest` client, settings come from
/// environment variables and location is delegated to the device sensor `G`.
#[derive(Debug, Clone)]
pub struct HostProvider<G> {
    client: reqwest::Client,
    access_token: String,
    sensor: G,
}

impl<G: Geolocation> HostProvider<G> {
    pub fn new(access_token: impl Into<String>, sensor: G) -> Self {
        Self { client: reqwest::Client::new(), access_token: access_token.into(), sensor }
    }
}

impl<G: Geolocation> tracking::Provider for HostProvider<G> {}

impl<G: Geolocation> HttpRequest for HostProvider<G> {
    async fn fetch<T>(&self, request: Request<T>) -> Result<Response<Bytes>>
    where
        T: Body + Any + Send,
        T::Data: Into<Vec<u8>> + Send,
        T::Error: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        let (parts, body) = request.into_parts();
        let body = body.collect().await.map_err(|e| {
            let e: Box<dyn Error + Send + Sync> = e.into();
            anyhow!(e)
        })?;

        tracing::debug!(method = %parts.method, uri = %parts.uri, "outbound request");

        let response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body.to_bytes())
            .send()
            .await
            .with_context(|| format!("sending request to {}", parts.uri))?;

        let mut builder = Response::builder().status(response.status());
        for (name, value) in response.headers() {
            builder = builder.header(name, value);
        }
        let bytes = response.bytes().await.context("reading response body")?;

        builder.body(bytes).context("building response")
    }
}

impl<G: Geolocation> platform::Config for HostProvider<G> {
    async fn get(&self, key: &str) -> Result<String> {
        env::var(key).with_context(|| format!("{key} is not set"))
    }
}

impl<G: Geolocation> Identity for HostProvider<G> {
    async fn access_token(&self) -> Result<String> {
        if self.access_token.is_empty() {
            return Err(anyhow!("driver is not signed in"));
        }
        Ok(self.access_token.clone())
    }
}

impl<G: Geolocation> Geolocation for HostProvider<G> {
    async fn request_permission(&self) -> Result<Permission> {
        self.sensor.request_permission().await
    }

    async fn current_position(&self) -> Result<Position> {
        self.sensor.current_position().await
    }

    async fn watch_position(&self, options: WatchOptions) -> Result<BoxStream<'static, Position>> {
        self.sensor.watch_position(options).await
    }
}
