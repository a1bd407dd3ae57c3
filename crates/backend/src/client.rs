use anyhow::{Context, Result};
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Response};
use http_body_util::{Empty, Full};
use platform::{Config, HttpRequest, Identity, not_found};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Envelope wrapping every backend response body.
#[derive(serde::Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// GET a backend resource and decode its `data` payload.
pub async fn get<P, T>(path: &str, provider: &P) -> Result<T>
where
    P: Config + HttpRequest + Identity,
    T: DeserializeOwned,
{
    let url = endpoint(path, provider).await?;
    let token = Identity::access_token(provider).await?;

    let request = http::Request::builder()
        .method(Method::GET)
        .uri(&url)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(ACCEPT, "application/json")
        .body(Empty::<Bytes>::new())
        .with_context(|| format!("building GET {path} request"))?;

    let response = HttpRequest::fetch(provider, request)
        .await
        .with_context(|| format!("GET {path} request failed"))?;
    let body = checked(response)?;

    let envelope: Envelope<T> = serde_json::from_slice(&body)
        .with_context(|| format!("deserializing GET {path} response"))?;
    envelope.data.ok_or_else(|| not_found!("GET {} returned no data", path).into())
}

/// PATCH a backend resource, discarding the acknowledgement body.
pub async fn patch<P, B>(path: &str, body: Option<&B>, provider: &P) -> Result<()>
where
    P: Config + HttpRequest + Identity,
    B: Serialize + Sync,
{
    let url = endpoint(path, provider).await?;
    let token = Identity::access_token(provider).await?;

    let payload = match body {
        Some(body) => serde_json::to_vec(body)
            .with_context(|| format!("serializing PATCH {path} payload"))?,
        None => Vec::new(),
    };

    let request = http::Request::builder()
        .method(Method::PATCH)
        .uri(&url)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))
        .with_context(|| format!("building PATCH {path} request"))?;

    let response = HttpRequest::fetch(provider, request)
        .await
        .with_context(|| format!("PATCH {path} request failed"))?;
    checked(response)?;

    Ok(())
}

async fn endpoint(path: &str, provider: &impl Config) -> Result<String> {
    let base = Config::get(provider, "BACKEND_URL").await.context("getting `BACKEND_URL`")?;
    Ok(format!("{}{path}", base.trim_end_matches('/')))
}

/// Fail on non-success responses, preserving the upstream classification.
pub fn checked(response: Response<Bytes>) -> Result<Bytes> {
    let status = response.status();
    let body = response.into_body();

    if !status.is_success() {
        tracing::debug!(%status, "backend returned non-success status");
        return Err(platform::Error::from_status(status, &body).into());
    }
    Ok(body)
}
