// Hand-crafted async HTTP client for the signage content API.
//
// All content is fetched by IRI relative to a configured base endpoint.
// Auth is handled upstream (player keys are baked into the endpoint URL
// by the management server when it issues the configuration document).

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;
use crate::types::{Collection, ErrorResponse};

/// Async client for the signage content API.
///
/// Fetches JSON documents by path relative to the configured endpoint.
/// Paths starting with `/` resolve against the endpoint origin (the API
/// hands out absolute-path IRIs like `/v2/slides/{id}`).
#[derive(Clone)]
pub struct PullClient {
    http: reqwest::Client,
    base_url: Url,
}

impl PullClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a base endpoint and transport config.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages transport).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self { http, base_url })
    }

    /// The configured base endpoint.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Resolve a path or IRI against the base endpoint.
    ///
    /// Absolute URLs pass through untouched; absolute-path IRIs (`/v2/…`)
    /// keep the endpoint origin and replace the path.
    fn url(&self, path: &str) -> Result<Url, Error> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(self.base_url.join(path)?)
    }

    // ── Fetching ─────────────────────────────────────────────────────

    /// Fetch an arbitrary path, returning the raw JSON document.
    pub async fn get_path(&self, path: &str) -> Result<serde_json::Value, Error> {
        self.get(path).await
    }

    /// Fetch a path and deserialize into a typed document.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        handle_response(resp).await
    }

    /// Fetch a JSON-LD collection and unwrap its `hydra:member` items.
    pub async fn get_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, Error> {
        let page: Collection<T> = self.get(path).await?;
        Ok(page.member)
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(error_from_body(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// Map a non-2xx response to an [`Error::Api`], preferring the server's
/// own error description when the body parses as an error envelope.
fn error_from_body(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.description.or(e.message))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());

    Error::Api {
        message,
        status: status.as_u16(),
    }
}
