//! Remote fetch client for the two per-record lookups.
//!
//! Each lookup is one `POST {base_url}/{endpoint}` with body
//! `{"newsId": <id>, "lang": <lang>}`. The remote wraps results as
//! `{"success": bool, "data": ...}`. [`RemoteClient`] never surfaces
//! failures to the scheduler: transport errors, non-2xx statuses and
//! `success: false` responses are logged and become an absent payload.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, REFERER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use harvest_core::config::RemoteConfig;
use harvest_core::RecordId;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote rejected lookup: {0}")]
    Rejected(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

/// The two lookups made for every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Version,
    Full,
}

impl LookupKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            LookupKind::Version => "getVersions",
            LookupKind::Full => "getFull",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKind::Version => write!(f, "version"),
            LookupKind::Full => write!(f, "full"),
        }
    }
}

/// Fetches the payloads of one record.
///
/// `Ok(None)` means the payload is absent. Implementations may return
/// `Err` instead; the scheduler treats that as a per-item failure.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch_version(&self, id: RecordId) -> Result<Option<Value>, FetchError>;

    async fn fetch_full(&self, id: RecordId) -> Result<Option<Value>, FetchError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    news_id: RecordId,
    lang: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the remote record API.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
    lang: String,
}

impl RemoteClient {
    /// Build a client with the auth and content headers applied to every
    /// request and the configured per-request timeout.
    pub fn new(config: &RemoteConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| FetchError::Config(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| FetchError::Config(format!("invalid referer: {e}")))?;
            headers.insert(REFERER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lang: config.lang.clone(),
        })
    }

    /// Perform one lookup, surfacing every failure as an error.
    pub async fn lookup(&self, kind: LookupKind, id: RecordId) -> Result<Option<Value>, FetchError> {
        let url = format!("{}/{}", self.base_url, kind.endpoint());
        let response = self
            .client
            .post(&url)
            .json(&LookupRequest {
                news_id: id,
                lang: &self.lang,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let parsed: LookupResponse = response.json().await?;
        if !parsed.success {
            return Err(FetchError::Rejected(
                parsed
                    .message
                    .unwrap_or_else(|| "success flag not set".to_string()),
            ));
        }

        debug!(id, kind = %kind, "lookup succeeded");
        Ok(parsed.data.filter(|v| !v.is_null()))
    }

    async fn lookup_or_absent(&self, kind: LookupKind, id: RecordId) -> Option<Value> {
        match self.lookup(kind, id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(id, kind = %kind, error = %e, "lookup failed, storing absent payload");
                None
            }
        }
    }
}

#[async_trait]
impl RecordFetcher for RemoteClient {
    async fn fetch_version(&self, id: RecordId) -> Result<Option<Value>, FetchError> {
        Ok(self.lookup_or_absent(LookupKind::Version, id).await)
    }

    async fn fetch_full(&self, id: RecordId) -> Result<Option<Value>, FetchError> {
        Ok(self.lookup_or_absent(LookupKind::Full, id).await)
    }
}
