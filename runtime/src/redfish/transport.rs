//! Raw transport to a Redfish service.
//!
//! [`Transport`] is the protocol-agnostic surface the rest of the crate
//! consumes: a blocking GET returning a status code, a parsed-or-raw
//! body, and a header subset. Application-level failure (4xx/5xx) is
//! carried in [`TransportResponse::code`]; an `Err` means the exchange
//! itself failed. Retries live here and nowhere else.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Default service root for a Redfish tree.
pub const SERVICE_ROOT: &str = "/redfish/v1";

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP exchange failed (connect, timeout, redirect loop, read).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered, but not with a usable resource.
    #[error("unexpected status {code} fetching {uri}")]
    Status { code: u16, uri: String },

    /// The resource body was not JSON.
    #[error("non-json body at {uri}")]
    NotJson { uri: String },

    /// The transport has no backend to talk to.
    #[error("transport has no backend")]
    NoBackend,

    /// The blocking facade could not be set up.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Body of a transport response.
///
/// Redfish resources are JSON; anything else (octet streams, log dumps)
/// is kept raw.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(Vec<u8>),
}

impl ResponseBody {
    /// The parsed JSON body, if this response carried one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Raw(_) => None,
        }
    }
}

/// A successful REST exchange with the service.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub code: u16,
    /// Parsed JSON body, or the raw bytes for non-JSON payloads.
    pub body: ResponseBody,
    /// Response headers (selected subset).
    pub headers: HashMap<String, String>,
}

impl TransportResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Blocking GET access to a Redfish service.
///
/// Implementations decide where responses come from (wire, cache,
/// in-memory mock); callers cannot tell the difference.
pub trait Transport: Send + Sync {
    /// URI of the service root, e.g. `/redfish/v1`.
    fn root_uri(&self) -> &str {
        SERVICE_ROOT
    }

    /// Fetch the resource at `path` (service-relative URI).
    fn get(&self, path: &str) -> Result<TransportResponse, TransportError>;
}

/// A placeholder transport that gracefully fails every request.
#[derive(Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn get(&self, _path: &str) -> Result<TransportResponse, TransportError> {
        Err(TransportError::NoBackend)
    }
}

/// HTTP transport over reqwest.
///
/// The query core is synchronous, so the async client is wrapped in a
/// blocking facade: a small current-thread tokio runtime owned by the
/// transport. Handles retry on 5xx and `Retry-After`-aware backoff on
/// 429.
pub struct HttpTransport {
    /// Base URL of the service, without a trailing slash.
    base: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    /// Create a transport for the service at `base_url`.
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            client,
            runtime,
        })
    }

    async fn get_async(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let mut retries = 0u32;
        let max_retries = 2;

        loop {
            let resp = self.client.get(url).send().await;

            match resp {
                Ok(r) => {
                    let code = r.status().as_u16();

                    // Retry on 5xx with exponential backoff.
                    if code >= 500 && retries < max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    // Honor Retry-After on 429, capped at 10s.
                    if code == 429 && retries < max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let headers: HashMap<String, String> = r
                        .headers()
                        .iter()
                        .filter(|(k, _)| {
                            matches!(
                                k.as_str(),
                                "content-type" | "etag" | "cache-control" | "allow"
                            )
                        })
                        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                        .collect();

                    let is_json = headers
                        .get("content-type")
                        .is_some_and(|ct| ct.contains("json"));

                    let bytes = r.bytes().await?;
                    let body = if is_json {
                        match serde_json::from_slice::<Value>(&bytes) {
                            Ok(v) => ResponseBody::Json(v),
                            Err(_) => ResponseBody::Raw(bytes.to_vec()),
                        }
                    } else {
                        ResponseBody::Raw(bytes.to_vec())
                    };

                    return Ok(TransportResponse {
                        code,
                        body,
                        headers,
                    });
                }
                Err(e) => {
                    if retries < max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<TransportResponse, TransportError> {
        let url = format!("{}{}", self.base, path);
        self.runtime.block_on(self.get_async(&url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_transport_fails() {
        let t = NullTransport;
        assert!(matches!(
            t.get("/redfish/v1"),
            Err(TransportError::NoBackend)
        ));
    }

    #[test]
    fn test_response_success_range() {
        let resp = TransportResponse {
            code: 204,
            body: ResponseBody::Raw(Vec::new()),
            headers: HashMap::new(),
        };
        assert!(resp.is_success());

        let resp = TransportResponse {
            code: 404,
            body: ResponseBody::Json(Value::Null),
            headers: HashMap::new(),
        };
        assert!(!resp.is_success());
    }

    #[test]
    fn test_http_transport_strips_trailing_slash() {
        let t = HttpTransport::new("http://localhost:8000/", 1000).unwrap();
        assert_eq!(t.base, "http://localhost:8000");
    }

    #[test]
    fn test_body_as_json() {
        let body = ResponseBody::Json(serde_json::json!({"Name": "chassis"}));
        assert!(body.as_json().is_some());
        assert!(ResponseBody::Raw(vec![1, 2]).as_json().is_none());
    }
}
