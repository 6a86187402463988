// crates/settings-audit-hub/src/http.rs
// ============================================================================
// Module: HTTP Hub Client
// Description: Blocking HTTP client for the hub record/collection API.
// Purpose: Implement the hub and certificate interfaces with strict limits.
// Dependencies: settings-audit-core, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`HttpHubClient`] issues bounded, retried requests against the hub API:
//! - `GET /` for the server self-description,
//! - `GET /buckets/{bid}/collections/{cid}` for collection metadata,
//! - `GET .../records` for records, following `Next-Page` links,
//! - `HEAD .../records` for the record-set timestamp (`ETag`),
//! - `PATCH /buckets/{bid}/collections/{cid}` to request a re-signature.
//!
//! Only HTTPS is accepted unless cleartext is explicitly allowed, URLs may
//! not embed credentials, redirects are not followed, response bodies are
//! size-limited, and pagination links must stay on the hub origin.
//! Certificate downloads go through the same client without credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::ETAG;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use settings_audit_core::CertificateSource;
use settings_audit_core::CollectionMetadata;
use settings_audit_core::CollectionStatus;
use settings_audit_core::FetchError;
use settings_audit_core::HubClient;
use settings_audit_core::Record;
use settings_audit_core::RecordQuery;
use settings_audit_core::ServerInfo;
use thiserror::Error;
use tracing::debug;

use crate::auth::HubAuth;
use crate::retry::RetryPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Production hub used when no server is configured.
pub const DEFAULT_SERVER_URL: &str = "https://firefox.settings.services.mozilla.com/v1";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;
/// Default response body limit.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
/// Upper bound on followed `Next-Page` links per listing.
pub const MAX_PAGES: usize = 1_000;
/// Pagination header returned by the hub.
const NEXT_PAGE_HEADER: &str = "Next-Page";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP hub client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHubConfig {
    /// Hub root URL, including the API version prefix.
    pub server_url: String,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// Credentials sent to the hub (never to certificate hosts).
    pub auth: Option<HubAuth>,
}

impl Default for HttpHubConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            allow_http: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: concat!("settings-audit/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
            auth: None,
        }
    }
}

/// Errors raised while constructing the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubClientError {
    /// The server URL could not be parsed.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    /// The URL scheme is not allowed.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    /// The URL embeds credentials.
    #[error("url must not embed credentials")]
    CredentialsInUrl,
    /// The HTTP client could not be built.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Response envelope used by the hub API.
#[derive(Deserialize)]
struct DataEnvelope<T> {
    /// Payload.
    data: T,
}

/// Blocking hub client.
pub struct HttpHubClient {
    /// Client configuration.
    config: HttpHubConfig,
    /// Parsed hub root.
    base: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpHubClient {
    /// Creates a client for the configured hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubClientError`] when the server URL is invalid or the HTTP
    /// client cannot be created.
    pub fn new(config: HttpHubConfig) -> Result<Self, HubClientError> {
        let base = Url::parse(&config.server_url)
            .map_err(|err| HubClientError::InvalidUrl(err.to_string()))?;
        validate_url(&base, config.allow_http)?;
        if base.cannot_be_a_base() {
            return Err(HubClientError::InvalidUrl(config.server_url.clone()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| HubClientError::ClientBuild(err.to_string()))?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpHubConfig {
        &self.config
    }

    /// Builds a hub URL from path segments below the root.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL of a collection document.
    fn collection_url(&self, bucket: &str, collection: &str) -> Url {
        self.url(&["buckets", bucket, "collections", collection])
    }

    /// URL of a collection record listing.
    fn records_url(&self, bucket: &str, collection: &str) -> Url {
        self.url(&["buckets", bucket, "collections", collection, "records"])
    }

    /// Attaches hub credentials, if configured.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            Some(HubAuth::Basic {
                user,
                password,
            }) => request.basic_auth(user, Some(password)),
            Some(HubAuth::Bearer(token)) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request with retries and returns the successful response.
    fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        authenticated: bool,
    ) -> Result<Response, FetchError> {
        self.config.retry.run(url.as_str(), || {
            let mut request = self.client.request(method.clone(), url.clone());
            if authenticated {
                request = self.authorize(request);
            }
            if let Some(body) = body {
                request = request.header(CONTENT_TYPE, "application/json").body(body.to_vec());
            }
            let response = request.send().map_err(|err| map_transport_error(url, &err))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response)
        })
    }

    /// Fetches a JSON document, returning it with the response headers.
    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<(T, HeaderMap), FetchError> {
        debug!(url = %url, "GET");
        let mut response = self.send(&Method::GET, url, None, true)?;
        let headers = response.headers().clone();
        let body = read_response_limited(&mut response, self.config.max_response_bytes, url)?;
        let value = serde_json::from_slice(&body).map_err(|err| FetchError::InvalidResponse {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Ok((value, headers))
    }

    /// Resolves a `Next-Page` link, refusing links off the hub origin.
    fn next_page(&self, current: &Url, headers: &HeaderMap) -> Result<Option<Url>, FetchError> {
        let Some(value) = headers.get(NEXT_PAGE_HEADER) else {
            return Ok(None);
        };
        let invalid = |message: &str| FetchError::InvalidResponse {
            url: current.to_string(),
            message: message.to_string(),
        };
        let link = value.to_str().map_err(|_| invalid("next page header is not ascii"))?;
        let next = Url::parse(link).map_err(|_| invalid("next page link is not a url"))?;
        if next.origin() != self.base.origin() {
            return Err(invalid("next page link leaves the hub origin"));
        }
        Ok(Some(next))
    }
}

impl HubClient for HttpHubClient {
    fn collection_endpoint(&self, bucket: &str, collection: &str) -> String {
        self.collection_url(bucket, collection).to_string()
    }

    fn server_info(&self) -> Result<ServerInfo, FetchError> {
        let (info, _) = self.get_json(&self.url(&[""]))?;
        Ok(info)
    }

    fn get_collection_metadata(
        &self,
        bucket: &str,
        collection: &str,
        expected: Option<u64>,
    ) -> Result<CollectionMetadata, FetchError> {
        let mut url = self.collection_url(bucket, collection);
        if let Some(expected) = expected {
            url.query_pairs_mut().append_pair("_expected", &expected.to_string());
        }
        let (envelope, _): (DataEnvelope<CollectionMetadata>, _) = self.get_json(&url)?;
        Ok(envelope.data)
    }

    fn get_records(
        &self,
        bucket: &str,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Record>, FetchError> {
        let mut url = self.records_url(bucket, collection);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(sort) = &query.sort {
            params.push(("_sort", sort.clone()));
        }
        if let Some(expected) = query.expected {
            params.push(("_expected", expected.to_string()));
        }
        if let Some(since) = query.since {
            params.push(("_since", since.to_string()));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        let mut records = Vec::new();
        let mut next = Some(url);
        let mut pages = 0_usize;
        while let Some(page) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(FetchError::InvalidResponse {
                    url: page.to_string(),
                    message: format!("listing exceeds {MAX_PAGES} pages"),
                });
            }
            let (envelope, headers): (DataEnvelope<Vec<Record>>, _) = self.get_json(&page)?;
            records.extend(envelope.data);
            next = self.next_page(&page, &headers)?;
        }
        Ok(records)
    }

    fn get_record_set_timestamp(
        &self,
        bucket: &str,
        collection: &str,
        expected: Option<u64>,
    ) -> Result<u64, FetchError> {
        let mut url = self.records_url(bucket, collection);
        if let Some(expected) = expected {
            url.query_pairs_mut().append_pair("_expected", &expected.to_string());
        }
        debug!(url = %url, "HEAD");
        let response = self.send(&Method::HEAD, &url, None, true)?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| FetchError::InvalidResponse {
                url: url.to_string(),
                message: "missing ETag header".to_string(),
            })?;
        parse_etag(etag).ok_or_else(|| FetchError::InvalidResponse {
            url: url.to_string(),
            message: format!("invalid ETag header {etag}"),
        })
    }

    fn patch_collection_status(
        &self,
        bucket: &str,
        collection: &str,
        status: CollectionStatus,
    ) -> Result<CollectionMetadata, FetchError> {
        let url = self.collection_url(bucket, collection);
        let body = serde_json::to_vec(&json!({"data": {"status": status.as_str()}}))
            .map_err(|err| FetchError::Request(err.to_string()))?;
        debug!(url = %url, status = %status, "PATCH");
        let mut response = self.send(&Method::PATCH, &url, Some(&body), true)?;
        let body = read_response_limited(&mut response, self.config.max_response_bytes, &url)?;
        let envelope: DataEnvelope<CollectionMetadata> =
            serde_json::from_slice(&body).map_err(|err| FetchError::InvalidResponse {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        Ok(envelope.data)
    }
}

impl CertificateSource for HttpHubClient {
    fn fetch_certificate(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|err| FetchError::Request(format!("{url}: {err}")))?;
        validate_url(&parsed, self.config.allow_http)
            .map_err(|err| FetchError::Request(format!("{url}: {err}")))?;
        debug!(url = %parsed, "GET certificate");
        let mut response = self.send(&Method::GET, &parsed, None, false)?;
        read_response_limited(&mut response, self.config.max_response_bytes, &parsed)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates URL scheme and rejects embedded credentials.
fn validate_url(url: &Url, allow_http: bool) -> Result<(), HubClientError> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        other => return Err(HubClientError::UnsupportedScheme(other.to_string())),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(HubClientError::CredentialsInUrl);
    }
    Ok(())
}

/// Parses a quoted (optionally weak) `ETag` holding a timestamp.
fn parse_etag(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value.trim_matches('"').parse().ok()
}

/// Classifies a transport failure as timeout, connection, or request error.
fn map_transport_error(url: &Url, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        FetchError::Connection {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        FetchError::Request(format!("{url}: {err}"))
    }
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
    url: &Url,
) -> Result<Vec<u8>, FetchError> {
    let invalid = |message: &str| FetchError::InvalidResponse {
        url: url.to_string(),
        message: message.to_string(),
    };
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| invalid("response size limit exceeds u64"))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(invalid("response exceeds size limit"));
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::TimedOut {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            invalid("failed to read response")
        }
    })?;
    if buf.len() > max_bytes {
        return Err(invalid("response exceeds size limit"));
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected).map_err(|_| invalid("invalid response length"))?;
        if buf.len() < expected {
            return Err(invalid("response truncated"));
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use super::*;

    fn client(server_url: &str) -> HttpHubClient {
        HttpHubClient::new(HttpHubConfig {
            server_url: server_url.to_string(),
            ..HttpHubConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoints_are_built_below_the_root() {
        let hub = client("https://hub.example/v1");
        assert_eq!(
            hub.collection_endpoint("main", "cfr"),
            "https://hub.example/v1/buckets/main/collections/cfr"
        );
        let hub = client("https://hub.example/v1/");
        assert_eq!(hub.records_url("main", "cfr").path(), "/v1/buckets/main/collections/cfr/records");
        assert_eq!(hub.url(&[""]).as_str(), "https://hub.example/v1/");
    }

    #[test]
    fn path_segments_are_escaped() {
        let hub = client("https://hub.example/v1");
        assert_eq!(
            hub.collection_endpoint("main", "a/b"),
            "https://hub.example/v1/buckets/main/collections/a%2Fb"
        );
    }

    #[test]
    fn cleartext_and_credentials_are_rejected() {
        let http = HttpHubClient::new(HttpHubConfig {
            server_url: "http://hub.example/v1".to_string(),
            ..HttpHubConfig::default()
        });
        assert!(matches!(http, Err(HubClientError::UnsupportedScheme(_))));
        let creds = HttpHubClient::new(HttpHubConfig {
            server_url: "https://user:pw@hub.example/v1".to_string(),
            ..HttpHubConfig::default()
        });
        assert!(matches!(creds, Err(HubClientError::CredentialsInUrl)));
        let allowed = HttpHubClient::new(HttpHubConfig {
            server_url: "http://127.0.0.1:8888/v1".to_string(),
            allow_http: true,
            ..HttpHubConfig::default()
        });
        assert!(allowed.is_ok());
    }

    #[test]
    fn etags_are_unquoted() {
        assert_eq!(parse_etag("\"1589366400999\""), Some(1_589_366_400_999));
        assert_eq!(parse_etag("W/\"42\""), Some(42));
        assert_eq!(parse_etag("42"), Some(42));
        assert_eq!(parse_etag("\"abc\""), None);
    }
}
